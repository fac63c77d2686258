use pallas_traverse::OutputRef;
use thiserror::Error;

use crate::types::{AssetUnit, display_output_ref};

/// A value could not be mapped to or from its on-chain encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("{field}: expected {expected} bytes, got {got}")]
    HashLength {
        field: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{field}: negative integer {value}")]
    NegativeInteger { field: &'static str, value: i128 },

    #[error("{field}: integer {value} out of range")]
    IntegerOutOfRange { field: &'static str, value: String },

    #[error("unlock redeemer needs at least one pool reference")]
    EmptyPoolReferences,

    #[error("malformed plutus data: {0}")]
    Malformed(String),

    #[error("cbor: {0}")]
    Cbor(String),
}

/// A UTxO the workflow depends on is not live on the ledger.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("locked output {} not found", display_output_ref(.0))]
    LockedOutput(OutputRef),

    #[error("locked output {} is not held by the validator address", display_output_ref(.0))]
    NotAtScript(OutputRef),

    #[error("locked output {} carries no inline datum", display_output_ref(.0))]
    MissingDatum(OutputRef),

    #[error("reference input {} not found", display_output_ref(.0))]
    ReferenceInput(OutputRef),

    #[error("no utxo at {address} holds pool token {unit}")]
    PoolToken { address: String, unit: AssetUnit },

    #[error("provider: {0}")]
    Provider(String),
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("reading blueprint: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing blueprint: {0}")]
    Json(#[from] serde_json::Error),

    #[error("blueprint declares no validators")]
    NoValidators,

    #[error("unsupported plutus version {0:?}, expected v2")]
    UnsupportedVersion(String),

    #[error("compiled code is not hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("script hash mismatch: blueprint says {declared}, computed {computed}")]
    HashMismatch { declared: String, computed: String },

    #[error("address: {0}")]
    Address(String),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Failure reported by the submission client, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The ledger evaluated the transaction and refused it. Resubmitting the same
    /// transaction fails the same way.
    #[error("rejected by ledger: {0}")]
    Rejected(String),

    #[error("transport: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("locked output {} already spent", display_output_ref(.0))]
pub struct TransitionError(pub OutputRef);

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
