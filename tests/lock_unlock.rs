//! Lock and unlock workflows driven end to end over the in-memory ledger.

use std::sync::Arc;

use pallas_addresses::{
    Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart,
};
use pallas_crypto::hash::Hash;
use pallas_traverse::OutputRef;
use pool_lock::{
    Error, LockState, LockedDatum, LockedOutput, PoolReference, PoolType, Redeemer, RedeemerBuilder,
    ResolutionError, SubmitError, Validator, build_datum,
    codec::{decode_datum, decode_redeemer},
    ledger::{KeyStore, LedgerClient, MemoryKeyStore, MemoryLedger},
    tx::Assembler,
    types::{AssetUnit, Utxo},
};

const OWNER: [u8; 32] = [0x42; 32];

type TestAssembler = Assembler<Arc<MemoryLedger>, MemoryKeyStore>;

fn wallet() -> Address {
    Address::Shelley(ShelleyAddress::new(
        Network::Testnet,
        ShelleyPaymentPart::Key(Hash::new([0x42; 28])),
        ShelleyDelegationPart::Null,
    ))
}

fn validator() -> Validator {
    Validator::new(hex::decode("4e4d01000033222220051200120011").unwrap())
}

fn pool_nft(name: &str) -> AssetUnit {
    AssetUnit {
        policy: Hash::new([0xee; 28]),
        name: name.as_bytes().to_vec(),
    }
}

fn pool_utxo(byte: u8, name: &str) -> Utxo {
    Utxo {
        output_ref: OutputRef::new(Hash::new([byte; 32]), 2),
        address: wallet(),
        lovelace: 40_000_000,
        assets: vec![(pool_nft(name), 1)],
        inline_datum: None,
    }
}

fn setup() -> (Arc<MemoryLedger>, TestAssembler, PoolReference, PoolReference) {
    let p1 = pool_utxo(0xa1, "ADA_IUSD");
    let p2 = pool_utxo(0xa2, "ADA_USDC");
    let refs = (
        PoolReference::new(p1.output_ref.clone(), PoolType(0)),
        PoolReference::new(p2.output_ref.clone(), PoolType(0)),
    );
    let ledger = Arc::new(MemoryLedger::with_utxos(Network::Testnet, [p1, p2]));
    let assembler = Assembler::new(
        ledger.clone(),
        MemoryKeyStore::new(Hash::new(OWNER), wallet()),
        validator(),
    );
    (ledger, assembler, refs.0, refs.1)
}

async fn lock_default(assembler: &TestAssembler) -> OutputRef {
    let datum = build_datum(Hash::new(OWNER), 100).unwrap();
    assembler
        .lock(datum, 5_000_000)
        .await
        .unwrap()
        .locked
        .output_ref
}

#[test]
fn lock_pays_one_output_to_the_script() {
    let (_, assembler, _, _) = setup();
    let datum = build_datum(Hash::new(OWNER), 100).unwrap();
    assert_eq!(
        datum.datum,
        LockedDatum {
            owner: Hash::new(OWNER),
            target: 100
        }
    );

    let tx = assembler.build_lock(&datum, 5_000_000);
    assert_eq!(tx.outputs.len(), 1);
    let out = &tx.outputs[0];
    assert_eq!(out.address, assembler.script_address());
    assert_eq!(out.lovelace, 5_000_000);
    let inline = out.inline_datum.as_deref().unwrap();
    assert_eq!(decode_datum(inline).unwrap(), datum.datum);
    assert!(tx.spends.is_empty());
    assert!(tx.reference_inputs.is_empty());
}

#[tokio::test]
async fn lock_creates_exactly_one_locked_output() {
    let (ledger, assembler, _, _) = setup();
    let datum = build_datum(Hash::new(OWNER), 100).unwrap();
    let receipt = assembler.lock(datum, 5_000_000).await.unwrap();

    assert_eq!(receipt.locked.state, LockState::Created);
    assert_eq!(receipt.locked.output_ref, OutputRef::new(receipt.tx_hash, 0));

    let at_script = ledger.utxos_at(&assembler.script_address()).await.unwrap();
    assert_eq!(at_script.len(), 1);
    assert_eq!(at_script[0].output_ref, receipt.locked.output_ref);
    assert_eq!(at_script[0].lovelace, 5_000_000);
}

#[tokio::test]
async fn unlock_reads_pools_without_spending_them() {
    let (ledger, assembler, p1, p2) = setup();
    let locked_ref = lock_default(&assembler).await;

    let redeemer = RedeemerBuilder::new()
        .pool(p1.clone())
        .pool(p2.clone())
        .unlock()
        .unwrap();
    assert_eq!(
        redeemer.redeemer,
        Redeemer::Unlock {
            pool_references: vec![p1.clone(), p2.clone()]
        }
    );

    let (tx, locked) = assembler
        .build_unlock(&locked_ref, redeemer.clone())
        .await
        .unwrap();
    assert_eq!(locked.state, LockState::Created);
    assert_eq!(tx.spends.len(), 1);
    assert_eq!(tx.spends[0].utxo.output_ref, locked_ref);
    assert_eq!(
        decode_redeemer(&tx.spends[0].redeemer.cbor).unwrap(),
        redeemer.redeemer
    );
    assert_eq!(
        tx.reference_inputs,
        vec![p1.output_ref.clone(), p2.output_ref.clone()]
    );
    assert_eq!(tx.required_signers, vec![assembler.keys().pub_key_hash()]);
    assert_eq!(tx.scripts.len(), 1);
    assert_eq!(tx.scripts[0].cbor, validator().attachment().unwrap());

    let receipt = assembler.unlock(&locked_ref, redeemer).await.unwrap();
    assert_eq!(receipt.spent.state, LockState::SpentUnlocked);
    assert!(ledger.utxo_by_ref(&locked_ref).await.unwrap().is_none());
    assert!(ledger.utxo_by_ref(&p1.output_ref).await.unwrap().is_some());
    assert!(ledger.utxo_by_ref(&p2.output_ref).await.unwrap().is_some());
    assert!(
        ledger
            .utxos_at(&assembler.script_address())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn repeated_pool_is_one_reference_input() {
    let (ledger, assembler, p1, p2) = setup();
    let locked_ref = lock_default(&assembler).await;
    let redeemer = RedeemerBuilder::new()
        .pool(p1.clone())
        .pool(p2.clone())
        .pool(p1.clone())
        .unlock()
        .unwrap();

    let (tx, _) = assembler
        .build_unlock(&locked_ref, redeemer.clone())
        .await
        .unwrap();
    assert_eq!(
        tx.reference_inputs,
        vec![p1.output_ref.clone(), p2.output_ref.clone()]
    );
    // the redeemer still carries all three entries
    let sent = decode_redeemer(&tx.spends[0].redeemer.cbor).unwrap();
    assert_eq!(sent.pool_references(), &[p1.clone(), p2, p1.clone()]);

    assembler.unlock(&locked_ref, redeemer).await.unwrap();
    assert!(ledger.utxo_by_ref(&p1.output_ref).await.unwrap().is_some());
}

#[tokio::test]
async fn cancel_spends_without_reference_inputs() {
    let (_, assembler, _, _) = setup();
    let locked_ref = lock_default(&assembler).await;

    let cancel = RedeemerBuilder::cancel().unwrap();
    let (tx, _) = assembler
        .build_unlock(&locked_ref, cancel.clone())
        .await
        .unwrap();
    assert!(tx.reference_inputs.is_empty());
    assert_eq!(tx.spends[0].utxo.output_ref, locked_ref);

    let receipt = assembler.unlock(&locked_ref, cancel).await.unwrap();
    assert_eq!(receipt.spent.state, LockState::SpentCancelled);
}

#[tokio::test]
async fn spent_lock_cannot_be_unlocked_again() {
    let (_, assembler, p1, _) = setup();
    let locked_ref = lock_default(&assembler).await;
    let redeemer = RedeemerBuilder::new().pool(p1).unlock().unwrap();

    assembler
        .unlock(&locked_ref, redeemer.clone())
        .await
        .unwrap();
    let err = assembler.unlock(&locked_ref, redeemer).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution(ResolutionError::LockedOutput(r)) if r == locked_ref
    ));
}

#[tokio::test]
async fn missing_pool_aborts_before_submission() {
    let (ledger, assembler, _, p2) = setup();
    let locked_ref = lock_default(&assembler).await;
    let ghost = PoolReference::new(OutputRef::new(Hash::new([0xdd; 32]), 0), PoolType(0));

    let redeemer = RedeemerBuilder::new()
        .pool(ghost.clone())
        .pool(p2)
        .unlock()
        .unwrap();
    let err = assembler.unlock(&locked_ref, redeemer).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution(ResolutionError::ReferenceInput(r)) if r == ghost.output_ref
    ));
    assert!(ledger.utxo_by_ref(&locked_ref).await.unwrap().is_some());
}

#[tokio::test]
async fn stale_pool_reference_is_rejected_by_the_ledger() {
    let (ledger, assembler, p1, _) = setup();
    let locked_ref = lock_default(&assembler).await;
    let redeemer = RedeemerBuilder::new().pool(p1.clone()).unlock().unwrap();

    let (tx, _) = assembler.build_unlock(&locked_ref, redeemer).await.unwrap();
    // the pool moves on before the transaction lands
    ledger.consume(&p1.output_ref).unwrap();

    let signed = assembler.keys().sign(tx).unwrap();
    let err = ledger.submit(signed).await.unwrap_err();
    assert!(matches!(err, SubmitError::Rejected(msg) if msg.contains("reference input")));
    assert!(ledger.utxo_by_ref(&locked_ref).await.unwrap().is_some());
}

#[tokio::test]
async fn output_outside_the_script_is_not_unlockable() {
    let (ledger, assembler, p1, _) = setup();
    let datum = build_datum(Hash::new(OWNER), 1).unwrap();
    let stray = Utxo {
        output_ref: OutputRef::new(Hash::new([0x55; 32]), 0),
        address: wallet(),
        lovelace: 1_000_000,
        assets: vec![],
        inline_datum: Some(datum.cbor),
    };
    ledger.insert(stray.clone()).unwrap();

    let redeemer = RedeemerBuilder::new().pool(p1).unlock().unwrap();
    let err = assembler
        .build_unlock(&stray.output_ref, redeemer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Resolution(ResolutionError::NotAtScript(_))
    ));
}

#[tokio::test]
async fn unsigned_unlock_is_rejected() {
    let (ledger, assembler, p1, _) = setup();
    let locked_ref = lock_default(&assembler).await;
    let redeemer = RedeemerBuilder::new().pool(p1).unlock().unwrap();
    let (tx, _) = assembler.build_unlock(&locked_ref, redeemer).await.unwrap();

    let other = MemoryKeyStore::new(Hash::new([0x01; 32]), wallet());
    let err = ledger.submit(other.sign(tx).unwrap()).await.unwrap_err();
    assert!(matches!(err, SubmitError::Rejected(msg) if msg.contains("missing signature")));
}

#[test]
fn locked_output_moves_once() {
    let created = LockedOutput::created(
        OutputRef::new(Hash::new([1; 32]), 0),
        5_000_000,
        LockedDatum {
            owner: Hash::new(OWNER),
            target: 100,
        },
    );
    let cancelled = created.clone().transition(&Redeemer::Cancel).unwrap();
    assert_eq!(cancelled.state, LockState::SpentCancelled);
    assert!(cancelled.transition(&Redeemer::Cancel).is_err());

    let unlocked = created
        .transition(&Redeemer::Unlock {
            pool_references: vec![],
        })
        .unwrap();
    assert_eq!(unlocked.state, LockState::SpentUnlocked);
}
