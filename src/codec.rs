//! On-chain encodings for the lock validator.
//!
//! Datum and redeemer values travel as Plutus data in CBOR. The wire structs here
//! mirror the validator's schema exactly; the domain types in [`crate::types`] are
//! validated on the way in and out.

use pallas_codec::minicbor::{self, data::Int as CborInt};
use pallas_codec::utils::Int;
use pallas_primitives::{BigInt, PlutusData};
use pallas_traverse::OutputRef;
use plutus_parser::AsPlutus;

use crate::error::EncodingError;
use crate::types::{LockedDatum, PoolReference, PoolType, Redeemer, hash32};

#[derive(AsPlutus, Clone)]
struct DatumData {
    owner: Vec<u8>,
    target: BigInt,
}

#[derive(AsPlutus, Clone)]
enum RedeemerData {
    Unlock(Vec<PoolReferenceData>),
    Cancel,
}

#[derive(AsPlutus, Clone)]
struct PoolReferenceData {
    output_ref: OutputRefData,
    pool_type: BigInt,
}

#[derive(AsPlutus, Clone)]
struct OutputRefData {
    transaction_id: TransactionIdData,
    output_index: BigInt,
}

#[derive(AsPlutus, Clone)]
struct TransactionIdData {
    hash: Vec<u8>,
}

fn to_int(v: u64) -> BigInt {
    BigInt::Int(Int(CborInt::from(v)))
}

fn from_int(field: &'static str, v: BigInt) -> Result<u64, EncodingError> {
    match v {
        BigInt::Int(Int(i)) => {
            let i = i128::from(i);
            if i < 0 {
                return Err(EncodingError::NegativeInteger { field, value: i });
            }
            u64::try_from(i).map_err(|_| EncodingError::IntegerOutOfRange {
                field,
                value: i.to_string(),
            })
        }
        BigInt::BigUInt(b) => {
            bignum_magnitude(b.as_slice()).ok_or_else(|| EncodingError::IntegerOutOfRange {
                field,
                value: format!("0x{}", hex::encode(b.as_slice())),
            })
        }
        // tag 3 holds n for the value -1 - n
        BigInt::BigNInt(b) => match bignum_magnitude(b.as_slice()) {
            Some(n) => Err(EncodingError::NegativeInteger {
                field,
                value: -1 - i128::from(n),
            }),
            None => Err(EncodingError::IntegerOutOfRange {
                field,
                value: format!("-0x{}", hex::encode(b.as_slice())),
            }),
        },
    }
}

/// Big-endian bignum bytes as a u64. Leading zero bytes are allowed.
fn bignum_magnitude(bytes: &[u8]) -> Option<u64> {
    let zeros = bytes.iter().take_while(|b| **b == 0).count();
    let digits = &bytes[zeros..];
    if digits.len() > 8 {
        return None;
    }
    Some(digits.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn to_cbor(data: &PlutusData) -> Result<Vec<u8>, EncodingError> {
    minicbor::to_vec(data).map_err(|e| EncodingError::Cbor(e.to_string()))
}

fn from_cbor(bytes: &[u8]) -> Result<PlutusData, EncodingError> {
    let mut d = minicbor::Decoder::new(bytes);
    let data: PlutusData = d.decode().map_err(|e| EncodingError::Cbor(e.to_string()))?;
    if d.position() != bytes.len() {
        return Err(EncodingError::Cbor(format!(
            "{} trailing bytes",
            bytes.len() - d.position()
        )));
    }
    Ok(data)
}

fn parse<T: AsPlutus>(data: PlutusData) -> Result<T, EncodingError> {
    T::from_plutus(data).map_err(|e| EncodingError::Malformed(format!("{e:?}")))
}

pub fn datum_to_plutus(datum: &LockedDatum) -> PlutusData {
    DatumData {
        owner: datum.owner.to_vec(),
        target: to_int(datum.target),
    }
    .to_plutus()
}

pub fn datum_from_plutus(data: PlutusData) -> Result<LockedDatum, EncodingError> {
    let DatumData { owner, target } = parse(data)?;
    Ok(LockedDatum {
        owner: hash32("owner", &owner)?,
        target: from_int("target", target)?,
    })
}

/// CBOR of the datum as attached inline to the locked output.
pub fn encode_datum(datum: &LockedDatum) -> Result<Vec<u8>, EncodingError> {
    to_cbor(&datum_to_plutus(datum))
}

pub fn decode_datum(bytes: &[u8]) -> Result<LockedDatum, EncodingError> {
    datum_from_plutus(from_cbor(bytes)?)
}

pub fn redeemer_to_plutus(redeemer: &Redeemer) -> Result<PlutusData, EncodingError> {
    let data = match redeemer {
        Redeemer::Unlock { pool_references } => {
            if pool_references.is_empty() {
                return Err(EncodingError::EmptyPoolReferences);
            }
            RedeemerData::Unlock(
                pool_references
                    .iter()
                    .map(|r| PoolReferenceData {
                        output_ref: OutputRefData {
                            transaction_id: TransactionIdData {
                                hash: r.output_ref.hash().to_vec(),
                            },
                            output_index: to_int(r.output_ref.index()),
                        },
                        pool_type: to_int(r.pool_type.0),
                    })
                    .collect(),
            )
        }
        Redeemer::Cancel => RedeemerData::Cancel,
    };
    Ok(data.to_plutus())
}

pub fn redeemer_from_plutus(data: PlutusData) -> Result<Redeemer, EncodingError> {
    match parse(data)? {
        RedeemerData::Unlock(refs) => {
            if refs.is_empty() {
                return Err(EncodingError::EmptyPoolReferences);
            }
            let pool_references = refs
                .into_iter()
                .map(|r| {
                    let hash = hash32("transaction_id", &r.output_ref.transaction_id.hash)?;
                    let index = from_int("output_index", r.output_ref.output_index)?;
                    Ok(PoolReference::new(
                        OutputRef::new(hash, index),
                        PoolType(from_int("pool_type", r.pool_type)?),
                    ))
                })
                .collect::<Result<Vec<_>, EncodingError>>()?;
            Ok(Redeemer::Unlock { pool_references })
        }
        RedeemerData::Cancel => Ok(Redeemer::Cancel),
    }
}

pub fn encode_redeemer(redeemer: &Redeemer) -> Result<Vec<u8>, EncodingError> {
    to_cbor(&redeemer_to_plutus(redeemer)?)
}

pub fn decode_redeemer(bytes: &[u8]) -> Result<Redeemer, EncodingError> {
    redeemer_from_plutus(from_cbor(bytes)?)
}

/// Wraps compiled validator code as a CBOR byte string, the form the ledger
/// expects inside a transaction witness set.
pub fn wrap_script(raw: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let mut e = minicbor::Encoder::new(Vec::with_capacity(raw.len() + 9));
    e.bytes(raw).map_err(|e| EncodingError::Cbor(e.to_string()))?;
    Ok(e.into_writer())
}

pub fn unwrap_script(wrapped: &[u8]) -> Result<Vec<u8>, EncodingError> {
    let mut d = minicbor::Decoder::new(wrapped);
    let raw = d.bytes().map_err(|e| EncodingError::Cbor(e.to_string()))?;
    if d.position() != wrapped.len() {
        return Err(EncodingError::Cbor("trailing bytes after script".into()));
    }
    Ok(raw.to_vec())
}
