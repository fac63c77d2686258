//! Lock and unlock transaction assembly.
//!
//! The assembler produces an [`UnsignedTx`] describing what the transaction must
//! contain. Balancing, fee calculation and wallet coin selection belong to the
//! submission client, which signs and posts it.

use futures::future::try_join_all;
use pallas_addresses::{Address, Network};
use pallas_traverse::OutputRef;
use tracing::{debug, info, warn};

use crate::codec::decode_datum;
use crate::datum::BuiltDatum;
use crate::error::{ResolutionError, Result, TransitionError};
use crate::ledger::{KeyStore, LedgerClient};
use crate::redeemer::BuiltRedeemer;
use crate::script::{PlutusVersion, Validator};
use crate::types::{
    LockedDatum, PubKeyHash, Redeemer, TxHash, Utxo, display_address,
    display_output_ref,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TxOutput {
    pub address: Address,
    pub lovelace: u64,
    pub inline_datum: Option<Vec<u8>>,
}

/// A script-locked input and the redeemer presented for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptSpend {
    pub utxo: Utxo,
    pub redeemer: BuiltRedeemer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedScript {
    pub version: PlutusVersion,
    pub cbor: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsignedTx {
    pub spends: Vec<ScriptSpend>,
    /// Read during validation, never consumed.
    pub reference_inputs: Vec<OutputRef>,
    pub outputs: Vec<TxOutput>,
    pub required_signers: Vec<PubKeyHash>,
    pub scripts: Vec<AttachedScript>,
    /// Receives change and the value released from script inputs.
    pub change_address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VKeyWitness {
    pub key_hash: PubKeyHash,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedTx {
    pub tx: UnsignedTx,
    pub witnesses: Vec<VKeyWitness>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Created,
    SpentUnlocked,
    SpentCancelled,
}

/// An output held by the validator, tracked through its single spend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedOutput {
    pub output_ref: OutputRef,
    pub lovelace: u64,
    pub datum: LockedDatum,
    pub state: LockState,
}

impl LockedOutput {
    pub fn created(output_ref: OutputRef, lovelace: u64, datum: LockedDatum) -> Self {
        Self {
            output_ref,
            lovelace,
            datum,
            state: LockState::Created,
        }
    }

    pub fn from_utxo(utxo: &Utxo) -> Result<Self> {
        let cbor = utxo
            .inline_datum
            .as_deref()
            .ok_or_else(|| ResolutionError::MissingDatum(utxo.output_ref.clone()))?;
        Ok(Self::created(
            utxo.output_ref.clone(),
            utxo.lovelace,
            decode_datum(cbor)?,
        ))
    }

    pub fn transition(self, redeemer: &Redeemer) -> Result<Self, TransitionError> {
        if self.state != LockState::Created {
            return Err(TransitionError(self.output_ref));
        }
        let state = match redeemer {
            Redeemer::Unlock { .. } => LockState::SpentUnlocked,
            Redeemer::Cancel => LockState::SpentCancelled,
        };
        Ok(Self { state, ..self })
    }
}

pub fn assemble_lock(
    validator: &Validator,
    network: Network,
    datum: &BuiltDatum,
    lovelace: u64,
    change_address: Address,
) -> UnsignedTx {
    UnsignedTx {
        spends: vec![],
        reference_inputs: vec![],
        outputs: vec![TxOutput {
            address: validator.address(network),
            lovelace,
            inline_datum: Some(datum.cbor.clone()),
        }],
        required_signers: vec![],
        scripts: vec![],
        change_address,
    }
}

/// `pool_utxos` must hold the live outputs for every pool named by the redeemer.
pub fn assemble_unlock(
    validator: &Validator,
    network: Network,
    locked: &Utxo,
    redeemer: BuiltRedeemer,
    pool_utxos: &[Utxo],
    signer: PubKeyHash,
    change_address: Address,
) -> Result<UnsignedTx> {
    if locked.address != validator.address(network) {
        return Err(ResolutionError::NotAtScript(locked.output_ref.clone()).into());
    }
    if locked.inline_datum.is_none() {
        return Err(ResolutionError::MissingDatum(locked.output_ref.clone()).into());
    }

    // the ledger reads each reference input once, however often the redeemer names it
    let mut reference_inputs: Vec<OutputRef> = Vec::new();
    for p in redeemer.redeemer.pool_references() {
        let utxo = pool_utxos
            .iter()
            .find(|u| u.output_ref == p.output_ref)
            .ok_or_else(|| ResolutionError::ReferenceInput(p.output_ref.clone()))?;
        if !reference_inputs.contains(&utxo.output_ref) {
            reference_inputs.push(utxo.output_ref.clone());
        }
    }

    Ok(UnsignedTx {
        spends: vec![ScriptSpend {
            utxo: locked.clone(),
            redeemer,
        }],
        reference_inputs,
        outputs: vec![],
        required_signers: vec![signer],
        scripts: vec![AttachedScript {
            version: validator.version,
            cbor: validator.attachment()?,
        }],
        change_address,
    })
}

#[derive(Debug, Clone)]
pub struct LockReceipt {
    pub tx_hash: TxHash,
    pub locked: LockedOutput,
}

#[derive(Debug, Clone)]
pub struct UnlockReceipt {
    pub tx_hash: TxHash,
    pub spent: LockedOutput,
}

/// Runs the lock and unlock workflows against injected collaborators.
pub struct Assembler<L, K> {
    ledger: L,
    keys: K,
    validator: Validator,
}

impl<L: LedgerClient, K: KeyStore> Assembler<L, K> {
    pub fn new(ledger: L, keys: K, validator: Validator) -> Self {
        Self {
            ledger,
            keys,
            validator,
        }
    }

    pub fn keys(&self) -> &K {
        &self.keys
    }

    pub fn script_address(&self) -> Address {
        self.validator.address(self.ledger.network())
    }

    pub fn build_lock(&self, datum: &BuiltDatum, lovelace: u64) -> UnsignedTx {
        assemble_lock(
            &self.validator,
            self.ledger.network(),
            datum,
            lovelace,
            self.keys.address(),
        )
    }

    /// Resolves the locked output and every pool it references. Any miss aborts
    /// before anything is signed.
    pub async fn build_unlock(
        &self,
        locked_ref: &OutputRef,
        redeemer: BuiltRedeemer,
    ) -> Result<(UnsignedTx, LockedOutput)> {
        let locked_utxo = self
            .ledger
            .utxo_by_ref(locked_ref)
            .await?
            .ok_or_else(|| ResolutionError::LockedOutput(locked_ref.clone()))?;
        let pool_utxos = try_join_all(
            redeemer
                .redeemer
                .pool_references()
                .iter()
                .map(|p| async move {
                    self.ledger
                        .utxo_by_ref(&p.output_ref)
                        .await?
                        .ok_or_else(|| ResolutionError::ReferenceInput(p.output_ref.clone()))
                }),
        )
        .await?;

        let signer = self.keys.pub_key_hash();
        let tx = assemble_unlock(
            &self.validator,
            self.ledger.network(),
            &locked_utxo,
            redeemer,
            &pool_utxos,
            signer,
            self.keys.address(),
        )?;
        let locked = LockedOutput::from_utxo(&locked_utxo)?;
        if signer != locked.datum.owner {
            warn!(
                %signer,
                owner = %locked.datum.owner,
                "signer is not the datum owner, validator may reject"
            );
        }
        debug!(
            locked = %display_output_ref(locked_ref),
            reference_inputs = tx.reference_inputs.len(),
            "assembled unlock transaction"
        );
        Ok((tx, locked))
    }

    async fn sign_and_submit(&self, tx: UnsignedTx) -> Result<TxHash> {
        let signed = self.keys.sign(tx)?;
        let tx_hash = self.ledger.submit(signed).await?;
        info!(%tx_hash, "submitted, awaiting confirmation");
        self.ledger.await_tx(&tx_hash).await?;
        Ok(tx_hash)
    }

    pub async fn lock(&self, datum: BuiltDatum, lovelace: u64) -> Result<LockReceipt> {
        let tx = self.build_lock(&datum, lovelace);
        info!(
            lovelace,
            target = datum.datum.target,
            address = %display_address(&self.script_address()),
            "locking funds"
        );
        let tx_hash = self.sign_and_submit(tx).await?;
        Ok(LockReceipt {
            tx_hash,
            locked: LockedOutput::created(OutputRef::new(tx_hash, 0), lovelace, datum.datum),
        })
    }

    pub async fn unlock(
        &self,
        locked_ref: &OutputRef,
        redeemer: BuiltRedeemer,
    ) -> Result<UnlockReceipt> {
        let spending = redeemer.redeemer.clone();
        let (tx, locked) = self.build_unlock(locked_ref, redeemer).await?;
        info!(
            locked = %display_output_ref(locked_ref),
            redeemer = ?spending,
            "spending locked output"
        );
        let tx_hash = self.sign_and_submit(tx).await?;
        Ok(UnlockReceipt {
            tx_hash,
            spent: locked.transition(&spending)?,
        })
    }
}
