//! Circuit key generation
//!
//! Runs a circuit-specific Groth16 setup and writes the descriptor, proving
//! key and verification key under the build directory. This is a
//! single-party setup whose toxic waste lives in `rng`; use it for
//! development and tests only. Production keys come from a ceremony and are
//! provisioned into the build directory by deployment.

use std::time::Instant;

use ark_bn254::Bn254;
use ark_groth16::Groth16;
use ark_snark::{CircuitSpecificSetupSNARK, SNARK};
use ark_std::rand::{CryptoRng, RngCore};
use tracing::{info, instrument};

use crate::assets::{AssetLayout, CircuitDescriptor};
use crate::circuits::{CircuitId, ThresholdCircuit};
use crate::error::{Result, ZkError};

/// Generate and write the assets for one circuit
#[instrument(skip(layout, rng), fields(build_dir = %layout.build_dir().display()))]
pub fn generate_assets<R: RngCore + CryptoRng>(
    layout: &AssetLayout,
    circuit: CircuitId,
    rng: &mut R,
) -> Result<()> {
    let start = Instant::now();
    let descriptor = CircuitDescriptor::compile(circuit)?;

    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(ThresholdCircuit::blank(circuit), rng)
        .map_err(|e| ZkError::Setup {
            reason: e.to_string(),
        })?;

    layout.write_descriptor(&descriptor)?;
    layout.write_proving_key(circuit, &pk)?;
    layout.write_verification_key(circuit, &vk)?;

    info!(
        "Setup for {} done - {} constraints in {:?}",
        circuit,
        descriptor.num_constraints,
        start.elapsed()
    );
    Ok(())
}

/// Generate assets for every circuit
pub fn generate_all_assets<R: RngCore + CryptoRng>(layout: &AssetLayout, rng: &mut R) -> Result<()> {
    for circuit in CircuitId::ALL {
        generate_assets(layout, circuit, rng)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_generated_assets_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let layout = AssetLayout::new(dir.path());
        let mut rng = StdRng::seed_from_u64(7);

        generate_assets(&layout, CircuitId::Age, &mut rng).unwrap();

        assert!(layout.descriptor_path(CircuitId::Age).is_file());
        let vk = layout.load_verification_key(CircuitId::Age).unwrap();
        let pk = layout.load_proving_key(CircuitId::Age).unwrap();
        assert_eq!(pk.vk, vk);
        // threshold and outcome bit
        assert_eq!(vk.gamma_abc_g1.len(), 3);

        // Other circuits are untouched
        assert!(!layout.circuit_dir(CircuitId::Toeic).exists());
    }
}
