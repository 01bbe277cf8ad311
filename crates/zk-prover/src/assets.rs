//! On-disk circuit assets
//!
//! Each circuit has its own directory under the build directory:
//!
//! ```text
//! <build_dir>/<circuit>/circuit.json            constraint-program descriptor
//! <build_dir>/<circuit>/proving_key.bin         arkworks, compressed
//! <build_dir>/<circuit>/verification_key.json   snarkjs format
//! ```
//!
//! The verification key alone is enough to verify and may be handed to
//! untrusted verifying parties.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use ark_bn254::Bn254;
use ark_groth16::{ProvingKey, VerifyingKey};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::circuits::{constraint_count, CircuitId, RANGE_BITS};
use crate::error::{Result, ZkError};
use crate::proof::{g1_from_strings, g1_to_strings, g2_from_strings, g2_to_strings};

/// Constraint-program descriptor file name
pub const DESCRIPTOR_FILE: &str = "circuit.json";
/// Proving key file name
pub const PROVING_KEY_FILE: &str = "proving_key.bin";
/// Verification key file name
pub const VERIFICATION_KEY_FILE: &str = "verification_key.json";

/// Locations of the circuit assets under a build directory
#[derive(Debug, Clone)]
pub struct AssetLayout {
    build_dir: PathBuf,
}

impl AssetLayout {
    /// Layout rooted at `build_dir`
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    /// Root of the layout
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Directory holding the assets of `circuit`
    pub fn circuit_dir(&self, circuit: CircuitId) -> PathBuf {
        self.build_dir.join(circuit.file_name())
    }

    /// Descriptor of `circuit`
    pub fn descriptor_path(&self, circuit: CircuitId) -> PathBuf {
        self.circuit_dir(circuit).join(DESCRIPTOR_FILE)
    }

    /// Proving key of `circuit`
    pub fn proving_key_path(&self, circuit: CircuitId) -> PathBuf {
        self.circuit_dir(circuit).join(PROVING_KEY_FILE)
    }

    /// Verification key of `circuit`
    pub fn verification_key_path(&self, circuit: CircuitId) -> PathBuf {
        self.circuit_dir(circuit).join(VERIFICATION_KEY_FILE)
    }

    /// Load the constraint-program descriptor and check it against the
    /// compiled circuit
    pub fn load_descriptor(&self, circuit: CircuitId) -> Result<CircuitDescriptor> {
        let path = self.descriptor_path(circuit);
        require(circuit, &path)?;
        debug!("Loading circuit descriptor from: {}", path.display());

        let descriptor: CircuitDescriptor = serde_json::from_str(&fs::read_to_string(&path)?)?;
        descriptor.check_compatible(circuit)?;
        Ok(descriptor)
    }

    /// Load the proving key
    pub fn load_proving_key(&self, circuit: CircuitId) -> Result<ProvingKey<Bn254>> {
        let path = self.proving_key_path(circuit);
        require(circuit, &path)?;
        debug!("Loading proving key from: {}", path.display());

        let reader = BufReader::new(File::open(&path)?);
        ProvingKey::deserialize_compressed(reader).map_err(|e| ZkError::Setup {
            reason: format!("invalid proving key {}: {e}", path.display()),
        })
    }

    /// Load the verification key (snarkjs JSON)
    pub fn load_verification_key(&self, circuit: CircuitId) -> Result<VerifyingKey<Bn254>> {
        let path = self.verification_key_path(circuit);
        require(circuit, &path)?;
        debug!("Loading verification key from: {}", path.display());

        let vkey_data: VerificationKeyJson = serde_json::from_str(&fs::read_to_string(&path)?)?;
        vkey_data.to_key()
    }

    /// Write the descriptor into its circuit directory, creating it if needed
    pub fn write_descriptor(&self, descriptor: &CircuitDescriptor) -> Result<()> {
        let dir = self.circuit_dir(descriptor.circuit);
        fs::create_dir_all(&dir)?;
        fs::write(
            dir.join(DESCRIPTOR_FILE),
            serde_json::to_string_pretty(descriptor)?,
        )?;
        Ok(())
    }

    /// Write the proving key in compressed form
    pub fn write_proving_key(&self, circuit: CircuitId, pk: &ProvingKey<Bn254>) -> Result<()> {
        fs::create_dir_all(self.circuit_dir(circuit))?;
        let mut writer = BufWriter::new(File::create(self.proving_key_path(circuit))?);
        pk.serialize_compressed(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the verification key as snarkjs JSON
    pub fn write_verification_key(&self, circuit: CircuitId, vk: &VerifyingKey<Bn254>) -> Result<()> {
        fs::create_dir_all(self.circuit_dir(circuit))?;
        fs::write(
            self.verification_key_path(circuit),
            serde_json::to_string_pretty(&VerificationKeyJson::from_key(vk))?,
        )?;
        Ok(())
    }
}

fn require(circuit: CircuitId, path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ZkError::MissingAsset {
            circuit,
            path: path.display().to_string(),
        })
    }
}

/// Constraint-program descriptor: the input schema and shape of a circuit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitDescriptor {
    pub circuit: CircuitId,
    /// Signals the prover must be given
    pub inputs: Vec<String>,
    /// Public signals, in verification order
    pub public_signals: Vec<String>,
    pub range_bits: usize,
    pub max_value: u64,
    pub num_constraints: usize,
}

impl CircuitDescriptor {
    /// Describe the circuit compiled into this crate
    pub fn compile(circuit: CircuitId) -> Result<Self> {
        Ok(Self {
            circuit,
            inputs: vec![
                circuit.private_signal().into(),
                circuit.threshold_signal().into(),
            ],
            public_signals: vec![circuit.threshold_signal().into(), "satisfied".into()],
            range_bits: RANGE_BITS,
            max_value: circuit.max_value(),
            num_constraints: constraint_count(circuit)?,
        })
    }

    /// Fail if the assets were generated for a different circuit version
    pub fn check_compatible(&self, circuit: CircuitId) -> Result<()> {
        let compiled = Self::compile(circuit)?;
        if *self != compiled {
            warn!(%circuit, "circuit descriptor does not match compiled circuit");
            return Err(ZkError::Setup {
                reason: format!(
                    "stale assets for {circuit}: descriptor has {} constraints over {:?}, circuit has {} over {:?}",
                    self.num_constraints, self.inputs, compiled.num_constraints, compiled.inputs
                ),
            });
        }
        Ok(())
    }
}

/// snarkjs verification key JSON format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationKeyJson {
    pub protocol: String,
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,
    /// Precomputed pairing; not needed to verify
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vk_alphabeta_12: Vec<Vec<Vec<String>>>,
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

impl VerificationKeyJson {
    /// Convert an arkworks verifying key
    pub fn from_key(vk: &VerifyingKey<Bn254>) -> Self {
        Self {
            protocol: "groth16".into(),
            curve: "bn128".into(),
            n_public: vk.gamma_abc_g1.len().saturating_sub(1),
            vk_alpha_1: g1_to_strings(&vk.alpha_g1),
            vk_beta_2: g2_to_strings(&vk.beta_g2),
            vk_gamma_2: g2_to_strings(&vk.gamma_g2),
            vk_delta_2: g2_to_strings(&vk.delta_g2),
            vk_alphabeta_12: Vec::new(),
            ic: vk.gamma_abc_g1.iter().map(g1_to_strings).collect(),
        }
    }

    /// Parse into an arkworks verifying key, checking the header and every point
    pub fn to_key(&self) -> Result<VerifyingKey<Bn254>> {
        let invalid = |reason: String| ZkError::Setup {
            reason: format!("invalid verification key: {reason}"),
        };
        if self.protocol != "groth16" || self.curve != "bn128" {
            return Err(invalid(format!("unsupported {}/{}", self.protocol, self.curve)));
        }
        if self.ic.len() != self.n_public + 1 {
            return Err(invalid(format!(
                "{} IC points for {} public signals",
                self.ic.len(),
                self.n_public
            )));
        }

        let parse = || -> Result<VerifyingKey<Bn254>> {
            Ok(VerifyingKey {
                alpha_g1: g1_from_strings(&self.vk_alpha_1)?,
                beta_g2: g2_from_strings(&self.vk_beta_2)?,
                gamma_g2: g2_from_strings(&self.vk_gamma_2)?,
                delta_g2: g2_from_strings(&self.vk_delta_2)?,
                gamma_abc_g1: self
                    .ic
                    .iter()
                    .map(|p| g1_from_strings(p))
                    .collect::<Result<_>>()?,
            })
        };
        parse().map_err(|e| invalid(e.to_string()))
    }
}
