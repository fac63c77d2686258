//! Contracts for the ledger access and signing collaborators.
//!
//! Nothing in the crate talks to a network directly. The assembler is handed a
//! [`LedgerClient`] and a [`KeyStore`] and only ever reaches the chain through them.

pub mod memory;

use async_trait::async_trait;
use pallas_addresses::{Address, Network};
use pallas_traverse::OutputRef;

use crate::error::{ResolutionError, SubmitError};
use crate::tx::{SignedTx, UnsignedTx};
use crate::types::{AssetUnit, PubKeyHash, TxHash, Utxo};

pub use memory::{MemoryKeyStore, MemoryLedger};

#[async_trait]
pub trait LedgerClient: Send + Sync {
    fn network(&self) -> Network;

    async fn utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, ResolutionError>;

    async fn utxos_at_with_unit(
        &self,
        address: &Address,
        unit: &AssetUnit,
    ) -> Result<Vec<Utxo>, ResolutionError>;

    /// `Ok(None)` when the output does not exist or has already been spent.
    async fn utxo_by_ref(&self, output_ref: &OutputRef) -> Result<Option<Utxo>, ResolutionError>;

    async fn submit(&self, tx: SignedTx) -> Result<TxHash, SubmitError>;

    async fn await_tx(&self, tx_hash: &TxHash) -> Result<(), SubmitError>;
}

pub trait KeyStore: Send + Sync {
    fn pub_key_hash(&self) -> PubKeyHash;

    fn address(&self) -> Address;

    fn sign(&self, tx: UnsignedTx) -> Result<SignedTx, SubmitError>;
}

#[async_trait]
impl<L: LedgerClient + ?Sized> LedgerClient for std::sync::Arc<L> {
    fn network(&self) -> Network {
        (**self).network()
    }

    async fn utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, ResolutionError> {
        (**self).utxos_at(address).await
    }

    async fn utxos_at_with_unit(
        &self,
        address: &Address,
        unit: &AssetUnit,
    ) -> Result<Vec<Utxo>, ResolutionError> {
        (**self).utxos_at_with_unit(address, unit).await
    }

    async fn utxo_by_ref(&self, output_ref: &OutputRef) -> Result<Option<Utxo>, ResolutionError> {
        (**self).utxo_by_ref(output_ref).await
    }

    async fn submit(&self, tx: SignedTx) -> Result<TxHash, SubmitError> {
        (**self).submit(tx).await
    }

    async fn await_tx(&self, tx_hash: &TxHash) -> Result<(), SubmitError> {
        (**self).await_tx(tx_hash).await
    }
}
