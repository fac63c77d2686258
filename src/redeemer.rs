use tracing::debug;

use crate::codec::encode_redeemer;
use crate::error::EncodingError;
use crate::types::{PoolReference, Redeemer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltRedeemer {
    pub redeemer: Redeemer,
    pub cbor: Vec<u8>,
}

impl BuiltRedeemer {
    fn encode(redeemer: Redeemer) -> Result<Self, EncodingError> {
        let cbor = encode_redeemer(&redeemer)?;
        debug!(?redeemer, cbor = %hex::encode(&cbor), "built redeemer");
        Ok(Self { redeemer, cbor })
    }
}

/// Collects pool references for an unlock. The validator checks them against its
/// own pool list by position, so they are kept in insertion order.
#[derive(Debug, Default, Clone)]
pub struct RedeemerBuilder {
    pools: Vec<PoolReference>,
}

impl RedeemerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(mut self, reference: PoolReference) -> Self {
        self.pools.push(reference);
        self
    }

    pub fn pools(mut self, references: impl IntoIterator<Item = PoolReference>) -> Self {
        self.pools.extend(references);
        self
    }

    pub fn unlock(self) -> Result<BuiltRedeemer, EncodingError> {
        if self.pools.is_empty() {
            return Err(EncodingError::EmptyPoolReferences);
        }
        BuiltRedeemer::encode(Redeemer::Unlock {
            pool_references: self.pools,
        })
    }

    pub fn cancel() -> Result<BuiltRedeemer, EncodingError> {
        BuiltRedeemer::encode(Redeemer::Cancel)
    }
}
