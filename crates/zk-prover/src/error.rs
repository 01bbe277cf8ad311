//! Error types for the credential prover

use thiserror::Error;

use crate::circuits::CircuitId;

/// Result type alias for prover operations
pub type Result<T> = std::result::Result<T, ZkError>;

/// Errors that can occur while matching, proving and verifying credentials.
///
/// A missing credential or an unsatisfied threshold is never an error: those
/// are reported as data (`satisfied: None` / `Ok(false)`).
#[derive(Error, Debug)]
pub enum ZkError {
    /// Circuit asset (descriptor, proving key, verification key) not provisioned
    #[error("Missing {circuit} asset: {path}")]
    MissingAsset { circuit: CircuitId, path: String },

    /// Input signals do not match the circuit's input schema
    #[error("Proving failed for {circuit}: {reason}")]
    Proving { circuit: CircuitId, reason: String },

    /// Structurally invalid proof or public signals
    #[error("Malformed proof: {reason}")]
    MalformedProof { reason: String },

    /// Structurally invalid caller input (conditions, credentials)
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    /// Value outside the circuit's domain
    #[error("{field} = {value} out of valid range [0, {max}]")]
    ValueOutOfRange { field: String, value: u64, max: u64 },

    /// Invalid input value
    #[error("Invalid input: {field} = {value} (expected {expected})")]
    InvalidInput {
        field: String,
        value: String,
        expected: String,
    },

    /// Setup or asset consistency error
    #[error("Setup error: {reason}")]
    Setup { reason: String },

    /// Credential repository failure
    #[error("Credential repository error: {reason}")]
    Repository { reason: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arkworks error
    #[error("Cryptographic error: {0}")]
    Ark(String),
}

impl ZkError {
    pub(crate) fn malformed_proof(reason: impl Into<String>) -> Self {
        Self::MalformedProof {
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed_input(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
        }
    }
}

impl From<ark_serialize::SerializationError> for ZkError {
    fn from(e: ark_serialize::SerializationError) -> Self {
        Self::Ark(e.to_string())
    }
}

impl From<ark_relations::r1cs::SynthesisError> for ZkError {
    fn from(e: ark_relations::r1cs::SynthesisError) -> Self {
        Self::Ark(e.to_string())
    }
}
