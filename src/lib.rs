//! Lock funds under a Plutus validator and release them against live liquidity pool
//! state.
//!
//! A lock pays to the validator address with an inline [`LockedDatum`]. An unlock
//! spends that output with a [`Redeemer`] naming the pool UTxOs the validator must
//! read, attaching them as reference inputs. Ledger access and signing are supplied
//! by the caller through [`LedgerClient`] and [`KeyStore`].

pub mod codec;
pub mod datum;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod pools;
pub mod redeemer;
pub mod script;
pub mod tx;
pub mod types;

pub use datum::{BuiltDatum, build_datum};
pub use error::{EncodingError, Error, ResolutionError, ScriptError, SubmitError};
pub use ledger::{KeyStore, LedgerClient};
pub use redeemer::{BuiltRedeemer, RedeemerBuilder};
pub use script::Validator;
pub use tx::{Assembler, LockState, LockedOutput, UnsignedTx};
pub use types::{LockedDatum, PoolReference, PoolType, Redeemer};
