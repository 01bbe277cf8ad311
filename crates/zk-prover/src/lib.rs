//! # Non-Fungible Career ZK Credential Prover
//!
//! Zero-knowledge threshold proofs over career credentials: a job seeker
//! proves "TOEIC >= 800" or "GPA >= 3.0" to an employer without revealing
//! the score.
//!
//! ## Components
//!
//! - **Circuits**: Groth16/BN254 threshold circuits for age, TOEIC score and GPA
//! - **Matcher**: evaluates posting conditions against a holder's credentials
//! - **Prover / Verifier**: proof generation and verification from on-disk keys
//! - **Disclosure**: packages proofs and public inputs into a selective
//!   disclosure record, keeping the witnesses in a separate private half
//!
//! ## Example
//!
//! ```rust,ignore
//! use nfc_zk_prover::{CredentialProver, CredentialVerifier, ProofOutcome};
//!
//! let prover = CredentialProver::new("./circuits/build")?;
//! let outcome = prover.prove_toeic(850, 800)?;
//!
//! let verifier = CredentialVerifier::new("./circuits/build");
//! if let ProofOutcome::Proved(proof) = &outcome {
//!     assert!(verifier.verify(proof)?);
//!     assert_eq!(proof.satisfied(), Some(true));
//! }
//! ```

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod assets;
pub mod circuits;
pub mod condition;
pub mod config;
pub mod credential;
pub mod disclosure;
pub mod error;
pub mod matcher;
pub mod proof;
pub mod prover;
pub mod repository;
pub mod service;
pub mod setup;
pub mod types;
pub mod verifier;

// Re-exports
pub use circuits::{is_vacuous_threshold, CircuitId};
pub use condition::{is_vacuously_satisfied, parse_conditions, Condition, ConditionKind};
pub use config::ZkConfig;
pub use credential::{CredentialClaims, CredentialType, VerifiableCredential};
pub use disclosure::{
    verify_record, Disclosure, DisclosureBuilder, DisclosureRecord, PrivateDisclosure,
    VerificationStatus,
};
pub use error::{Result, ZkError};
pub use matcher::{ConditionMatcher, ConditionResult, DuplicatePolicy, MatchResults};
pub use proof::{CircuitProof, Proof, ProofOutcome};
pub use prover::CredentialProver;
pub use repository::{CredentialRepository, InMemoryCredentialRepository};
pub use service::DisclosureService;
pub use types::ThresholdInput;
pub use verifier::{verify_proof, CredentialVerifier};
