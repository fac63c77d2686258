//! Liquidity pools the validator reads as reference inputs.
//!
//! A pool is found by the NFT it holds at its LP address. Whatever UTxO carries the
//! NFT right now is the pool's live state, so references must be resolved shortly
//! before an unlock is built.

use futures::future::try_join_all;
use pallas_addresses::Address;
use tracing::{debug, warn};

use crate::error::{EncodingError, Error, ResolutionError, ScriptError};
use crate::ledger::LedgerClient;
use crate::types::{AssetUnit, PoolReference, PoolType, display_address, display_output_ref};

pub const SPECTRUM_LP_ADDRESS: &str = "addr1x94ec3t25egvhqy2n265xfhq882jxhkknurfe9ny4rl9k6dj764lvrxdayh2ux30fl0ktuh27csgmpevdu89jlxppvrst84slu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownPool {
    pub name: &'static str,
    pub address: &'static str,
    pub nft: &'static str,
    pub pool_type: PoolType,
}

pub const SPECTRUM_ADA_IUSD: KnownPool = KnownPool {
    name: "spectrum-ada-iusd",
    address: SPECTRUM_LP_ADDRESS,
    nft: "4e5571315812e93aa829ab30f8ca83d63efce53853c5bf58c78cb5b1695553445f4144415f4e4654",
    pool_type: PoolType::SPECTRUM,
};

pub const SPECTRUM_ADA_USDC: KnownPool = KnownPool {
    name: "spectrum-ada-usdc",
    address: SPECTRUM_LP_ADDRESS,
    nft: "6833492a271a21abcecb971f915150d9c2283d0d747b88be9cdf0b75555344435f4144415f4e4654",
    pool_type: PoolType::SPECTRUM,
};

/// Pools in the order the deployed validator expects them.
pub const KNOWN_POOLS: [KnownPool; 2] = [SPECTRUM_ADA_IUSD, SPECTRUM_ADA_USDC];

pub const MINSWAP_LP_ADDRESS: &str = "addr1z8snz7c4974vzdpxu65ruphl3zjdvtxw8strf2c2tmqnxzdqcjdumqxjmc7cx0sg275pq4kkqx9wc99ffjc65eq9qn8q5vtgde";

/// A pool the validator has no type tag for yet. It can be listed and located but not
/// referenced from a redeemer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UntypedPool {
    pub name: &'static str,
    pub address: &'static str,
    pub nft: &'static str,
}

pub const MINSWAP_ADA_IUSD: UntypedPool = UntypedPool {
    name: "minswap-ada-iusd",
    address: MINSWAP_LP_ADDRESS,
    nft: "0be55d262b29f564998ff81efe21bdc0022621c12f15af08d0f2ddb18fde43a3f0b9f0e6f63bec7335e0b855c6b62a4dc51f1b762ccb6dfbbafcfe47",
};

pub const UNTYPED_POOLS: [UntypedPool; 1] = [MINSWAP_ADA_IUSD];

fn parse_lp_address(address: &str) -> Result<Address, ScriptError> {
    Address::from_bech32(address).map_err(|e| ScriptError::Address(e.to_string()))
}

impl KnownPool {
    pub fn by_name(name: &str) -> Option<KnownPool> {
        KNOWN_POOLS.iter().copied().find(|p| p.name == name)
    }

    pub fn lp_address(&self) -> Result<Address, ScriptError> {
        parse_lp_address(self.address)
    }

    pub fn unit(&self) -> Result<AssetUnit, EncodingError> {
        self.nft.parse()
    }
}

impl UntypedPool {
    pub fn lp_address(&self) -> Result<Address, ScriptError> {
        parse_lp_address(self.address)
    }

    pub fn unit(&self) -> Result<AssetUnit, EncodingError> {
        self.nft.parse()
    }
}

/// Locates the UTxO currently holding `unit` at `address`.
pub async fn resolve_pool<L: LedgerClient + ?Sized>(
    ledger: &L,
    address: &Address,
    unit: &AssetUnit,
    pool_type: PoolType,
) -> Result<PoolReference, ResolutionError> {
    let mut utxos = ledger.utxos_at_with_unit(address, unit).await?;
    if utxos.len() > 1 {
        warn!(%unit, count = utxos.len(), "pool token held by several utxos, using the first");
    }
    if utxos.is_empty() {
        return Err(ResolutionError::PoolToken {
            address: display_address(address),
            unit: unit.clone(),
        });
    }
    let utxo = utxos.swap_remove(0);
    debug!(%unit, output_ref = %display_output_ref(&utxo.output_ref), "resolved pool");
    Ok(PoolReference::new(utxo.output_ref, pool_type))
}

/// Resolves every pool, keeping the caller's order.
pub async fn resolve_known_pools<L: LedgerClient + ?Sized>(
    ledger: &L,
    pools: &[KnownPool],
) -> Result<Vec<PoolReference>, Error> {
    let targets = pools
        .iter()
        .map(|p| Ok((p.lp_address()?, p.unit()?, p.pool_type)))
        .collect::<Result<Vec<_>, Error>>()?;
    let refs = try_join_all(
        targets
            .iter()
            .map(|(address, unit, pool_type)| resolve_pool(ledger, address, unit, *pool_type)),
    )
    .await?;
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use pallas_crypto::hash::Hash;
    use pallas_traverse::OutputRef;

    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::types::Utxo;

    fn pool_utxo(pool: &KnownPool, byte: u8) -> Utxo {
        Utxo {
            output_ref: OutputRef::new(Hash::new([byte; 32]), 1),
            address: pool.lp_address().unwrap(),
            lovelace: 10_000_000,
            assets: vec![(pool.unit().unwrap(), 1)],
            inline_datum: None,
        }
    }

    #[test]
    fn catalogue_entries_parse() {
        for pool in KNOWN_POOLS {
            assert!(pool.lp_address().is_ok(), "{}", pool.name);
            assert!(pool.unit().is_ok(), "{}", pool.name);
        }
        assert_eq!(KnownPool::by_name("spectrum-ada-usdc"), Some(SPECTRUM_ADA_USDC));
        assert_eq!(KnownPool::by_name("nope"), None);
    }

    #[test]
    fn untyped_pools_parse_but_are_not_known() {
        for pool in UNTYPED_POOLS {
            assert!(pool.lp_address().is_ok(), "{}", pool.name);
            let unit = pool.unit().unwrap();
            assert_eq!(unit.name.len(), 32);
            assert_eq!(KnownPool::by_name(pool.name), None);
        }
    }

    #[tokio::test]
    async fn resolves_in_requested_order() {
        let ledger = MemoryLedger::with_utxos(
            pallas_addresses::Network::Mainnet,
            [
                pool_utxo(&SPECTRUM_ADA_USDC, 2),
                pool_utxo(&SPECTRUM_ADA_IUSD, 1),
            ],
        );
        let refs = resolve_known_pools(&ledger, &KNOWN_POOLS).await.unwrap();
        assert_eq!(refs[0].output_ref.hash(), &Hash::new([1; 32]));
        assert_eq!(refs[1].output_ref.hash(), &Hash::new([2; 32]));
    }

    #[tokio::test]
    async fn missing_pool_token_is_a_resolution_error() {
        let ledger = MemoryLedger::with_utxos(
            pallas_addresses::Network::Mainnet,
            [pool_utxo(&SPECTRUM_ADA_IUSD, 1)],
        );
        let err = resolve_known_pools(&ledger, &KNOWN_POOLS).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolution(ResolutionError::PoolToken { .. })
        ));
    }
}
