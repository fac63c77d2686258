use std::path::Path;

use pallas_addresses::{Address, Network, ShelleyAddress, ShelleyDelegationPart, ShelleyPaymentPart};
use pallas_crypto::hash::{Hash, Hasher};
use serde::Deserialize;

use crate::codec::wrap_script;
use crate::error::{EncodingError, ScriptError};

/// Ledger script language. Only Plutus V2 is accepted by this validator deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlutusVersion {
    V2,
}

impl PlutusVersion {
    /// Prefix byte hashed together with the script to derive its hash.
    pub fn tag(self) -> u8 {
        match self {
            PlutusVersion::V2 => 2,
        }
    }
}

/// The spending validator guarding locked outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub version: PlutusVersion,
    /// `compiledCode` as emitted by the compiler (already a CBOR byte string).
    pub compiled_code: Vec<u8>,
}

#[derive(Deserialize)]
struct Blueprint {
    #[serde(default)]
    preamble: Option<Preamble>,
    validators: Vec<BlueprintValidator>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Preamble {
    plutus_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlueprintValidator {
    compiled_code: String,
    hash: Option<String>,
}

impl Validator {
    pub fn new(compiled_code: Vec<u8>) -> Self {
        Self {
            version: PlutusVersion::V2,
            compiled_code,
        }
    }

    pub fn from_blueprint_json(json: &str) -> Result<Self, ScriptError> {
        let blueprint: Blueprint = serde_json::from_str(json)?;
        if let Some(version) = blueprint.preamble.and_then(|p| p.plutus_version) {
            if !version.eq_ignore_ascii_case("v2") {
                return Err(ScriptError::UnsupportedVersion(version));
            }
        }
        let first = blueprint
            .validators
            .into_iter()
            .next()
            .ok_or(ScriptError::NoValidators)?;
        let validator = Validator::new(hex::decode(&first.compiled_code)?);
        if let Some(declared) = first.hash {
            let computed = validator.script_hash().to_string();
            if !declared.eq_ignore_ascii_case(&computed) {
                return Err(ScriptError::HashMismatch { declared, computed });
            }
        }
        Ok(validator)
    }

    /// Loads validator 0 from a CIP-57 `plutus.json` blueprint.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_blueprint_json(&json)
    }

    pub fn script_hash(&self) -> Hash<28> {
        let mut hasher = Hasher::<224>::new();
        hasher.input(&[self.version.tag()]);
        hasher.input(&self.compiled_code);
        hasher.finalize()
    }

    /// Enterprise address paying to the script, no staking part.
    pub fn address(&self, network: Network) -> Address {
        Address::Shelley(ShelleyAddress::new(
            network,
            ShelleyPaymentPart::Script(self.script_hash()),
            ShelleyDelegationPart::Null,
        ))
    }

    /// Bytes attached to a spending transaction.
    pub fn attachment(&self) -> Result<Vec<u8>, EncodingError> {
        wrap_script(&self.compiled_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "4e4d01000033222220051200120011";

    #[test]
    fn loads_first_validator() {
        let json = format!(
            r#"{{"preamble":{{"plutusVersion":"v2"}},"validators":[{{"title":"lock.spend","compiledCode":"{CODE}"}},{{"compiledCode":"00"}}]}}"#
        );
        let v = Validator::from_blueprint_json(&json).unwrap();
        assert_eq!(v.compiled_code, hex::decode(CODE).unwrap());
        assert_eq!(v.version, PlutusVersion::V2);
    }

    #[test]
    fn declared_hash_must_match() {
        let v = Validator::new(hex::decode(CODE).unwrap());
        let ok = format!(
            r#"{{"validators":[{{"compiledCode":"{CODE}","hash":"{}"}}]}}"#,
            v.script_hash()
        );
        assert!(Validator::from_blueprint_json(&ok).is_ok());

        let bad = format!(
            r#"{{"validators":[{{"compiledCode":"{CODE}","hash":"{}"}}]}}"#,
            "00".repeat(28)
        );
        assert!(matches!(
            Validator::from_blueprint_json(&bad),
            Err(ScriptError::HashMismatch { .. })
        ));
    }

    #[test]
    fn rejects_other_plutus_versions() {
        let json = format!(
            r#"{{"preamble":{{"plutusVersion":"v3"}},"validators":[{{"compiledCode":"{CODE}"}}]}}"#
        );
        assert!(matches!(
            Validator::from_blueprint_json(&json),
            Err(ScriptError::UnsupportedVersion(v)) if v == "v3"
        ));
    }

    #[test]
    fn rejects_empty_blueprint() {
        assert!(matches!(
            Validator::from_blueprint_json(r#"{"validators":[]}"#),
            Err(ScriptError::NoValidators)
        ));
    }

    #[test]
    fn address_is_script_credential() {
        let v = Validator::new(hex::decode(CODE).unwrap());
        let Address::Shelley(addr) = v.address(Network::Testnet) else {
            panic!("expected shelley address");
        };
        assert_eq!(addr.payment(), &ShelleyPaymentPart::Script(v.script_hash()));
        assert_eq!(addr.network(), Network::Testnet);
    }

    #[test]
    fn attachment_wraps_compiled_code() {
        let v = Validator::new(vec![0xaa; 10]);
        let wrapped = v.attachment().unwrap();
        assert_eq!(wrapped[0], 0x4a);
        assert_eq!(&wrapped[1..], &v.compiled_code[..]);
    }
}
