//! ZK-SNARK proof verification
//!
//! Verification needs only the circuit's verification key. An invalid or
//! mismatched proof verifies as `Ok(false)`; an error means the proof could
//! not be checked at all.

use std::path::PathBuf;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey, VerifyingKey};
use ark_snark::SNARK;
use once_cell::sync::OnceCell;
use tracing::{info, instrument, warn};

use crate::assets::AssetLayout;
use crate::circuits::CircuitId;
use crate::error::{Result, ZkError};
use crate::proof::{CircuitProof, Proof, ProofOutcome, ProofOutcomeJson};

/// Check a proof against a prepared verification key
pub fn verify_proof(
    pvk: &PreparedVerifyingKey<Bn254>,
    proof: &Proof,
    public_signals: &[Fr],
) -> Result<bool> {
    let expected = pvk.vk.gamma_abc_g1.len().saturating_sub(1);
    if public_signals.len() != expected {
        return Err(ZkError::malformed_proof(format!(
            "expected {expected} public signals, got {}",
            public_signals.len()
        )));
    }

    Groth16::<Bn254>::verify_with_processed_vk(pvk, public_signals, &proof.inner)
        .map_err(|e| ZkError::Ark(e.to_string()))
}

/// Result of checking a [`ProofOutcome`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeCheck {
    /// The proof verified (`true`) or did not (`false`)
    Checked(bool),
    /// No proof to check; the threshold was vacuous
    Skipped,
}

/// ZK-SNARK proof verifier for the credential circuits
pub struct CredentialVerifier {
    layout: AssetLayout,
    age_vk: OnceCell<PreparedVerifyingKey<Bn254>>,
    toeic_vk: OnceCell<PreparedVerifyingKey<Bn254>>,
    degree_vk: OnceCell<PreparedVerifyingKey<Bn254>>,
}

impl CredentialVerifier {
    /// Create a verifier that reads verification keys from `build_dir`
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: AssetLayout::new(build_dir),
            age_vk: OnceCell::new(),
            toeic_vk: OnceCell::new(),
            degree_vk: OnceCell::new(),
        }
    }

    /// Install a verification key obtained out of band
    pub fn with_verification_key(
        self,
        circuit: CircuitId,
        vk: &VerifyingKey<Bn254>,
    ) -> Result<Self> {
        let pvk = Groth16::<Bn254>::process_vk(vk)?;
        if self.cell(circuit).set(pvk).is_err() {
            warn!(%circuit, "verification key already loaded, keeping the first");
        }
        Ok(self)
    }

    fn cell(&self, circuit: CircuitId) -> &OnceCell<PreparedVerifyingKey<Bn254>> {
        match circuit {
            CircuitId::Age => &self.age_vk,
            CircuitId::Toeic => &self.toeic_vk,
            CircuitId::Degree => &self.degree_vk,
        }
    }

    fn verification_key(&self, circuit: CircuitId) -> Result<&PreparedVerifyingKey<Bn254>> {
        self.cell(circuit).get_or_try_init(|| {
            let vk = self.layout.load_verification_key(circuit)?;
            Ok(Groth16::<Bn254>::process_vk(&vk)?)
        })
    }

    /// Verify a proof against the key of the circuit it claims
    #[instrument(skip(self, proof), fields(circuit = %proof.circuit))]
    pub fn verify(&self, proof: &CircuitProof) -> Result<bool> {
        let pvk = self.verification_key(proof.circuit)?;
        let is_valid = verify_proof(pvk, &proof.proof, &proof.public_signals)?;
        info!("Proof verification result: {}", is_valid);
        Ok(is_valid)
    }

    /// Verify a proof, or report that the outcome was skipped
    pub fn verify_outcome(&self, outcome: &ProofOutcome) -> Result<OutcomeCheck> {
        match outcome {
            ProofOutcome::Proved(proof) => self.verify(proof).map(OutcomeCheck::Checked),
            ProofOutcome::Skipped { .. } => Ok(OutcomeCheck::Skipped),
        }
    }

    /// Parse and verify a proof outcome in wire form
    pub fn verify_json(&self, json: &str) -> Result<OutcomeCheck> {
        let wire: ProofOutcomeJson = serde_json::from_str(json)
            .map_err(|e| ZkError::malformed_proof(e.to_string()))?;
        self.verify_outcome(&ProofOutcome::try_from(wire)?)
    }

    /// Verify proof using raw bytes and public signals
    pub fn verify_raw(
        &self,
        circuit: CircuitId,
        proof_bytes: &[u8],
        public_signals: &[Fr],
    ) -> Result<bool> {
        let proof = Proof::from_bytes(proof_bytes)?;
        verify_proof(self.verification_key(circuit)?, &proof, public_signals)
    }
}
