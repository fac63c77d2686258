//! In-process ledger and key store used to drive the workflows without a node.
//!
//! The ledger enforces the parts of the UTxO model the protocol depends on: every
//! output is spent at most once, reference inputs must be live, script inputs need
//! the matching validator attached and required signers must have signed. Fees and
//! coin selection are not modelled; the change address receives the value of the
//! script inputs.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use pallas_addresses::{Address, Network, ShelleyPaymentPart};
use pallas_crypto::hash::Hasher;
use pallas_traverse::OutputRef;
use tracing::debug;

use super::{KeyStore, LedgerClient};
use crate::codec::unwrap_script;
use crate::error::{ResolutionError, SubmitError};
use crate::script::Validator;
use crate::tx::{SignedTx, UnsignedTx, VKeyWitness};
use crate::types::{AssetUnit, PubKeyHash, TxHash, Utxo, display_output_ref};

#[derive(Default)]
struct State {
    utxos: Vec<Utxo>,
    confirmed: HashSet<TxHash>,
    submitted: u64,
}

pub struct MemoryLedger {
    network: Network,
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_utxos(network: Network, utxos: impl IntoIterator<Item = Utxo>) -> Self {
        let ledger = Self::new(network);
        if let Ok(mut state) = ledger.state.lock() {
            state.utxos.extend(utxos);
        }
        ledger
    }

    pub fn insert(&self, utxo: Utxo) -> Result<(), ResolutionError> {
        self.lock_state()?.utxos.push(utxo);
        Ok(())
    }

    /// Spends an output outside of any transaction, as another party would.
    pub fn consume(&self, output_ref: &OutputRef) -> Result<Option<Utxo>, ResolutionError> {
        let mut state = self.lock_state()?;
        let pos = state.utxos.iter().position(|u| &u.output_ref == output_ref);
        Ok(pos.map(|i| state.utxos.remove(i)))
    }

    pub fn is_confirmed(&self, tx_hash: &TxHash) -> bool {
        self.state
            .lock()
            .map(|s| s.confirmed.contains(tx_hash))
            .unwrap_or(false)
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, State>, ResolutionError> {
        self.state
            .lock()
            .map_err(|_| ResolutionError::Provider("ledger state poisoned".into()))
    }

    fn check(state: &State, signed: &SignedTx) -> Result<(), SubmitError> {
        let tx = &signed.tx;
        let live = |r: &OutputRef| state.utxos.iter().any(|u| &u.output_ref == r);

        for spend in &tx.spends {
            let r = &spend.utxo.output_ref;
            if !live(r) {
                return Err(SubmitError::Rejected(format!(
                    "input {} already spent",
                    display_output_ref(r)
                )));
            }
            let Address::Shelley(addr) = &spend.utxo.address else {
                return Err(SubmitError::Rejected("script input at non-shelley address".into()));
            };
            let ShelleyPaymentPart::Script(script_hash) = addr.payment() else {
                return Err(SubmitError::Rejected(format!(
                    "input {} is not guarded by a script",
                    display_output_ref(r)
                )));
            };
            let attached = tx.scripts.iter().any(|s| {
                unwrap_script(&s.cbor)
                    .map(|code| {
                        let validator = Validator {
                            version: s.version,
                            compiled_code: code,
                        };
                        validator.script_hash() == *script_hash
                    })
                    .unwrap_or(false)
            });
            if !attached {
                return Err(SubmitError::Rejected(format!(
                    "missing script witness for {script_hash}"
                )));
            }
        }

        for r in &tx.reference_inputs {
            if !live(r) {
                return Err(SubmitError::Rejected(format!(
                    "reference input {} is not live",
                    display_output_ref(r)
                )));
            }
        }

        let signed_by: HashSet<_> = signed.witnesses.iter().map(|w| w.key_hash).collect();
        if let Some(missing) = tx.required_signers.iter().find(|k| !signed_by.contains(*k)) {
            return Err(SubmitError::Rejected(format!("missing signature from {missing}")));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn utxos_at(&self, address: &Address) -> Result<Vec<Utxo>, ResolutionError> {
        let state = self.lock_state()?;
        Ok(state
            .utxos
            .iter()
            .filter(|u| &u.address == address)
            .cloned()
            .collect())
    }

    async fn utxos_at_with_unit(
        &self,
        address: &Address,
        unit: &AssetUnit,
    ) -> Result<Vec<Utxo>, ResolutionError> {
        let state = self.lock_state()?;
        Ok(state
            .utxos
            .iter()
            .filter(|u| &u.address == address && u.holds(unit))
            .cloned()
            .collect())
    }

    async fn utxo_by_ref(&self, output_ref: &OutputRef) -> Result<Option<Utxo>, ResolutionError> {
        let state = self.lock_state()?;
        Ok(state
            .utxos
            .iter()
            .find(|u| &u.output_ref == output_ref)
            .cloned())
    }

    async fn submit(&self, signed: SignedTx) -> Result<TxHash, SubmitError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| SubmitError::Transport("ledger state poisoned".into()))?;
        Self::check(&state, &signed)?;

        state.submitted += 1;
        let tx_hash = Hasher::<256>::hash(&state.submitted.to_be_bytes());
        let tx = signed.tx;

        let spent: HashSet<_> = tx.spends.iter().map(|s| s.utxo.output_ref.clone()).collect();
        state.utxos.retain(|u| !spent.contains(&u.output_ref));

        let mut index = 0;
        for output in tx.outputs {
            state.utxos.push(Utxo {
                output_ref: OutputRef::new(tx_hash, index),
                address: output.address,
                lovelace: output.lovelace,
                assets: vec![],
                inline_datum: output.inline_datum,
            });
            index += 1;
        }
        let released: u64 = tx.spends.iter().map(|s| s.utxo.lovelace).sum();
        if released > 0 {
            state.utxos.push(Utxo {
                output_ref: OutputRef::new(tx_hash, index),
                address: tx.change_address,
                lovelace: released,
                assets: vec![],
                inline_datum: None,
            });
        }

        state.confirmed.insert(tx_hash);
        debug!(%tx_hash, spent = spent.len(), "memory ledger accepted transaction");
        Ok(tx_hash)
    }

    async fn await_tx(&self, tx_hash: &TxHash) -> Result<(), SubmitError> {
        if self.is_confirmed(tx_hash) {
            Ok(())
        } else {
            Err(SubmitError::Transport(format!("unknown transaction {tx_hash}")))
        }
    }
}

/// Key store that "signs" by attaching its key hash. Only meaningful against
/// [`MemoryLedger`].
pub struct MemoryKeyStore {
    key_hash: PubKeyHash,
    address: Address,
}

impl MemoryKeyStore {
    pub fn new(key_hash: PubKeyHash, address: Address) -> Self {
        Self { key_hash, address }
    }
}

impl KeyStore for MemoryKeyStore {
    fn pub_key_hash(&self) -> PubKeyHash {
        self.key_hash
    }

    fn address(&self) -> Address {
        self.address.clone()
    }

    fn sign(&self, tx: UnsignedTx) -> Result<SignedTx, SubmitError> {
        let signature = Hasher::<256>::hash(&self.key_hash[..]).to_vec();
        Ok(SignedTx {
            tx,
            witnesses: vec![VKeyWitness {
                key_hash: self.key_hash,
                signature,
            }],
        })
    }
}
