use std::fmt;
use std::str::FromStr;

use pallas_addresses::Address;
use pallas_crypto::hash::Hash;
use pallas_traverse::OutputRef;

use crate::error::EncodingError;

pub type TxHash = Hash<32>;

/// Hash of the key allowed to act on a locked output.
pub type PubKeyHash = Hash<32>;

pub type PolicyId = Hash<28>;

pub fn hash32(field: &'static str, bytes: &[u8]) -> Result<Hash<32>, EncodingError> {
    let arr: [u8; 32] = bytes.try_into().map_err(|_| EncodingError::HashLength {
        field,
        expected: 32,
        got: bytes.len(),
    })?;
    Ok(Hash::new(arr))
}

pub fn display_output_ref(r: &OutputRef) -> String {
    format!("{}#{}", r.hash(), r.index())
}

pub fn display_address(address: &Address) -> String {
    address.to_bech32().unwrap_or_else(|_| address.to_hex())
}

/// Parses `<tx hash hex>#<output index>`.
pub fn parse_output_ref(s: &str) -> Result<OutputRef, EncodingError> {
    let (hash, index) = s
        .split_once('#')
        .ok_or_else(|| EncodingError::Malformed(format!("{s}: expected <tx hash>#<index>")))?;
    let bytes = hex::decode(hash).map_err(|e| EncodingError::Malformed(format!("{hash}: {e}")))?;
    let hash = hash32("transaction_id", &bytes)?;
    let index = index
        .parse::<u64>()
        .map_err(|e| EncodingError::Malformed(format!("output index {index}: {e}")))?;
    Ok(OutputRef::new(hash, index))
}

/// Contract-defined pool family tag. Only compared against what the validator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolType(pub u64);

impl PoolType {
    pub const SPECTRUM: PoolType = PoolType(0);
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReference {
    pub output_ref: OutputRef,
    pub pool_type: PoolType,
}

impl PoolReference {
    pub fn new(output_ref: OutputRef, pool_type: PoolType) -> Self {
        Self {
            output_ref,
            pool_type,
        }
    }
}

impl fmt::Display for PoolReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", display_output_ref(&self.output_ref), self.pool_type)
    }
}

impl FromStr for PoolReference {
    type Err = EncodingError;

    /// `<tx hash>#<index>:<pool type>`; the type defaults to 0 when omitted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (output_ref, pool_type) = match s.rsplit_once(':') {
            Some((r, t)) => {
                let t = t
                    .parse::<u64>()
                    .map_err(|e| EncodingError::Malformed(format!("pool type {t}: {e}")))?;
                (r, PoolType(t))
            }
            None => (s, PoolType::SPECTRUM),
        };
        Ok(PoolReference::new(parse_output_ref(output_ref)?, pool_type))
    }
}

/// Commitment stored inline with a locked output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedDatum {
    pub owner: PubKeyHash,
    pub target: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redeemer {
    Unlock { pool_references: Vec<PoolReference> },
    Cancel,
}

impl Redeemer {
    pub fn pool_references(&self) -> &[PoolReference] {
        match self {
            Redeemer::Unlock { pool_references } => pool_references,
            Redeemer::Cancel => &[],
        }
    }
}

/// A native asset identified by policy id and asset name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetUnit {
    pub policy: PolicyId,
    pub name: Vec<u8>,
}

impl fmt::Display for AssetUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.policy, hex::encode(&self.name))
    }
}

impl FromStr for AssetUnit {
    type Err = EncodingError;

    /// Hex policy id immediately followed by the hex asset name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| EncodingError::Malformed(format!("{s}: {e}")))?;
        if bytes.len() < 28 || bytes.len() > 28 + 32 {
            return Err(EncodingError::Malformed(format!(
                "asset unit must be 28..=60 bytes, got {}",
                bytes.len()
            )));
        }
        let (policy, name) = bytes.split_at(28);
        let policy: [u8; 28] = policy
            .try_into()
            .map_err(|_| EncodingError::Malformed(format!("{s}: bad policy id")))?;
        Ok(AssetUnit {
            policy: Hash::new(policy),
            name: name.to_vec(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utxo {
    pub output_ref: OutputRef,
    pub address: Address,
    pub lovelace: u64,
    pub assets: Vec<(AssetUnit, u64)>,
    /// CBOR of the inline datum, if any.
    pub inline_datum: Option<Vec<u8>>,
}

impl Utxo {
    pub fn holds(&self, unit: &AssetUnit) -> bool {
        self.assets.iter().any(|(u, qty)| u == unit && *qty > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TX: &str = "c997a5e56e104202fa209c6a852dd90660a20b2d9c352423edce25857fcd3704";

    #[test]
    fn parses_pool_reference_with_type() {
        let r: PoolReference = format!("{TX}#3:7").parse().unwrap();
        assert_eq!(r.output_ref.index(), 3);
        assert_eq!(r.pool_type, PoolType(7));
        assert_eq!(r.to_string(), format!("{TX}#3:7"));
    }

    #[test]
    fn pool_type_defaults_to_zero() {
        let r: PoolReference = format!("{TX}#0").parse().unwrap();
        assert_eq!(r.pool_type, PoolType::SPECTRUM);
    }

    #[test]
    fn short_tx_hash_is_rejected() {
        let err = parse_output_ref("abcd#0").unwrap_err();
        assert!(matches!(err, EncodingError::HashLength { got: 2, .. }));
    }

    #[test]
    fn asset_unit_round_trips_through_hex() {
        let s = "4e5571315812e93aa829ab30f8ca83d63efce53853c5bf58c78cb5b1695553445f4144415f4e4654";
        let unit: AssetUnit = s.parse().unwrap();
        assert_eq!(unit.name, b"iUSD_ADA_NFT".to_vec());
        assert_eq!(unit.to_string(), s);
    }
}
