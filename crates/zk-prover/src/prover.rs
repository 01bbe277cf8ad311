//! ZK-SNARK proof generation

use std::path::PathBuf;
use std::time::Instant;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, ProvingKey};
use ark_snark::SNARK;
use once_cell::sync::OnceCell;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::assets::{AssetLayout, CircuitDescriptor};
use crate::circuits::{is_vacuous_threshold, CircuitId, ThresholdCircuit};
use crate::error::{Result, ZkError};
use crate::proof::{CircuitProof, Proof, ProofOutcome};
use crate::types::{scale_gpa, ThresholdInput};

/// Descriptor and proving key of one circuit, loaded once
struct ProvingAssets {
    descriptor: CircuitDescriptor,
    pk: ProvingKey<Bn254>,
}

/// Groth16 prover for the credential threshold circuits.
///
/// Assets are loaded lazily from the build directory on the first proof for
/// each circuit and cached afterwards. The prover is `Sync`; one instance
/// may serve concurrent requests.
pub struct CredentialProver {
    layout: AssetLayout,
    age: OnceCell<ProvingAssets>,
    toeic: OnceCell<ProvingAssets>,
    degree: OnceCell<ProvingAssets>,
}

impl CredentialProver {
    /// Create a new prover with the given circuit build directory
    pub fn new(build_dir: impl Into<PathBuf>) -> Result<Self> {
        let layout = AssetLayout::new(build_dir);

        if !layout.build_dir().is_dir() {
            return Err(ZkError::Setup {
                reason: format!(
                    "circuit build directory not found: {}",
                    layout.build_dir().display()
                ),
            });
        }

        Ok(Self {
            layout,
            age: OnceCell::new(),
            toeic: OnceCell::new(),
            degree: OnceCell::new(),
        })
    }

    /// Asset layout the prover loads from
    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    fn assets(&self, circuit: CircuitId) -> Result<&ProvingAssets> {
        let cell = match circuit {
            CircuitId::Age => &self.age,
            CircuitId::Toeic => &self.toeic,
            CircuitId::Degree => &self.degree,
        };
        cell.get_or_try_init(|| {
            let descriptor = self.layout.load_descriptor(circuit)?;
            let pk = self.layout.load_proving_key(circuit)?;
            Ok(ProvingAssets { descriptor, pk })
        })
    }

    /// Generate a proof that the private value meets (or misses) the
    /// threshold.
    ///
    /// A vacuous threshold yields [`ProofOutcome::Skipped`] without touching
    /// the circuit assets.
    #[instrument(skip(self, input), fields(threshold = input.public_threshold))]
    pub fn generate(&self, circuit: CircuitId, input: &ThresholdInput) -> Result<ProofOutcome> {
        input.validate(circuit)?;

        if is_vacuous_threshold(circuit, input.public_threshold) {
            info!("Vacuous {} threshold, skipping proof generation", circuit);
            return Ok(ProofOutcome::Skipped { circuit });
        }

        self.build_and_prove(circuit, input).map(ProofOutcome::Proved)
    }

    /// Generate a proof from named input signals, e.g. `{"score": 850,
    /// "minScore": 800}`.
    ///
    /// The signal names must match the circuit's input schema exactly. The
    /// schema is checked against the compiled circuit, so a vacuous
    /// threshold still skips without touching the circuit assets.
    pub fn generate_from_signals(
        &self,
        circuit: CircuitId,
        signals: &Map<String, Value>,
    ) -> Result<ProofOutcome> {
        let proving_error = |reason: String| ZkError::Proving { circuit, reason };
        let inputs = [circuit.private_signal(), circuit.threshold_signal()];

        if let Some(unknown) = signals
            .keys()
            .find(|name| !inputs.contains(&name.as_str()))
        {
            return Err(proving_error(format!("unknown input signal {unknown:?}")));
        }

        let signal = |name: &str| -> Result<u64> {
            let value = signals
                .get(name)
                .ok_or_else(|| proving_error(format!("missing input signal {name:?}")))?;
            value
                .as_u64()
                .ok_or_else(|| proving_error(format!("signal {name:?} is not a field integer: {value}")))
        };

        let input = ThresholdInput::new(
            signal(circuit.private_signal())?,
            signal(circuit.threshold_signal())?,
        );
        self.generate(circuit, &input)
    }

    /// Prove `age >= min_age`
    pub fn prove_age(&self, age: u64, min_age: u64) -> Result<ProofOutcome> {
        self.generate(CircuitId::Age, &ThresholdInput::new(age, min_age))
    }

    /// Prove `score >= min_score` for a TOEIC score
    pub fn prove_toeic(&self, score: u64, min_score: u64) -> Result<ProofOutcome> {
        self.generate(CircuitId::Toeic, &ThresholdInput::new(score, min_score))
    }

    /// Prove `gpa >= min_gpa`, both on the 4.5 scale
    pub fn prove_gpa(&self, gpa: f64, min_gpa: f64) -> Result<ProofOutcome> {
        self.generate(
            CircuitId::Degree,
            &ThresholdInput::new(scale_gpa(gpa)?, scale_gpa(min_gpa)?),
        )
    }

    /// Synthesize the witness and generate a proof
    #[instrument(skip(self, input), fields(circuit = %circuit.file_name()))]
    fn build_and_prove(&self, circuit: CircuitId, input: &ThresholdInput) -> Result<CircuitProof> {
        let start = Instant::now();
        let assets = self.assets(circuit)?;
        let load_time = start.elapsed();
        debug!(
            "Assets ready in {:?} - {} constraints",
            load_time, assets.descriptor.num_constraints
        );

        let instance = ThresholdCircuit::new(circuit, input.private_value, input.public_threshold);
        let satisfied = input.private_value >= input.public_threshold;
        let public_signals = vec![Fr::from(input.public_threshold), Fr::from(satisfied)];

        let prove_start = Instant::now();
        let mut rng = rand::thread_rng();
        let proof = Groth16::<Bn254>::prove(&assets.pk, instance, &mut rng).map_err(|e| {
            ZkError::Proving {
                circuit,
                reason: e.to_string(),
            }
        })?;

        info!(
            "Proof generated - load: {:?}, prove: {:?}, total: {:?}",
            load_time,
            prove_start.elapsed(),
            start.elapsed()
        );

        Ok(CircuitProof::new(circuit, Proof::new(proof), public_signals))
    }
}

/// Convenience function to generate a single proof
pub fn generate_proof(
    build_dir: impl Into<PathBuf>,
    circuit: CircuitId,
    private_value: u64,
    public_threshold: u64,
) -> Result<ProofOutcome> {
    let prover = CredentialProver::new(build_dir)?;
    prover.generate(circuit, &ThresholdInput::new(private_value, public_threshold))
}
