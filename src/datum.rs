use tracing::debug;

use crate::codec::encode_datum;
use crate::error::EncodingError;
use crate::types::{LockedDatum, PubKeyHash, hash32};

/// A datum together with the inline CBOR that goes on the locked output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDatum {
    pub datum: LockedDatum,
    pub cbor: Vec<u8>,
}

impl LockedDatum {
    /// Checks the owner hash is exactly 32 bytes.
    pub fn new(owner: &[u8], target: u64) -> Result<Self, EncodingError> {
        Ok(LockedDatum {
            owner: hash32("owner", owner)?,
            target,
        })
    }
}

pub fn build_datum(owner: PubKeyHash, target: u64) -> Result<BuiltDatum, EncodingError> {
    let datum = LockedDatum { owner, target };
    let cbor = encode_datum(&datum)?;
    debug!(owner = %datum.owner, target, cbor = %hex::encode(&cbor), "built locked datum");
    Ok(BuiltDatum { datum, cbor })
}

/// Same as [`build_datum`] for an owner hash that has not been length-checked yet.
pub fn build_datum_from_slice(owner: &[u8], target: u64) -> Result<BuiltDatum, EncodingError> {
    let datum = LockedDatum::new(owner, target)?;
    build_datum(datum.owner, datum.target)
}

#[cfg(test)]
mod tests {
    use pallas_crypto::hash::Hash;

    use super::*;
    use crate::codec::decode_datum;

    #[test]
    fn builds_owner_and_target() {
        let h = Hash::new([0x42; 32]);
        let built = build_datum(h, 100).unwrap();
        assert_eq!(
            built.datum,
            LockedDatum {
                owner: h,
                target: 100
            }
        );
        assert_eq!(decode_datum(&built.cbor).unwrap(), built.datum);
    }

    #[test]
    fn wrong_owner_length_fails() {
        for len in [0, 28, 31, 33] {
            let err = build_datum_from_slice(&vec![1; len], 100).unwrap_err();
            assert_eq!(
                err,
                EncodingError::HashLength {
                    field: "owner",
                    expected: 32,
                    got: len
                }
            );
        }
    }
}
