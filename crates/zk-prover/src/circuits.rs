//! Native threshold circuits
//!
//! Every credential circuit proves the same statement over BN254:
//!
//! ```text
//! satisfied = (witness >= threshold)
//! ```
//!
//! with `witness` private and `[threshold, satisfied]` public, in that order.
//! Values are range-checked by bit decomposition so the comparison can not
//! wrap around the scalar field.

use std::fmt;
use std::str::FromStr;

use ark_bn254::Fr;
use ark_ff::{Field, One};
use ark_r1cs_std::fields::fp::FpVar;
use ark_r1cs_std::prelude::*;
use ark_relations::r1cs::{
    ConstraintSynthesizer, ConstraintSystem, ConstraintSystemRef, SynthesisError, SynthesisMode,
};
use serde::{Deserialize, Serialize};

use crate::error::ZkError;

/// Bit width of witness and threshold inside the circuits
pub const RANGE_BITS: usize = 16;

/// Number of public signals exposed by every threshold circuit
pub const NUM_PUBLIC_SIGNALS: usize = 2;

/// Domain maxima (inclusive), in circuit units
pub mod limits {
    /// Oldest age the age circuit accepts
    pub const MAX_AGE: u64 = 150;
    /// Maximum TOEIC listening + reading score
    pub const MAX_TOEIC_SCORE: u64 = 990;
    /// GPA on a 4.5 scale, fixed-point x100
    pub const MAX_GPA_SCALED: u64 = 450;
}

/// Circuit identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitId {
    /// Age derived from an identity credential's birth date
    Age,
    /// TOEIC score from a language test credential
    Toeic,
    /// GPA (x100) from a degree credential
    Degree,
}

impl CircuitId {
    /// All circuits, in asset-generation order
    pub const ALL: [CircuitId; 3] = [CircuitId::Age, CircuitId::Toeic, CircuitId::Degree];

    /// Short identifier used on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Toeic => "toeic",
            Self::Degree => "degree",
        }
    }

    /// Directory name of the circuit's assets
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Age => "age_threshold",
            Self::Toeic => "toeic_threshold",
            Self::Degree => "degree_threshold",
        }
    }

    /// Largest witness the circuit accepts
    pub fn max_value(self) -> u64 {
        match self {
            Self::Age => limits::MAX_AGE,
            Self::Toeic => limits::MAX_TOEIC_SCORE,
            Self::Degree => limits::MAX_GPA_SCALED,
        }
    }

    /// Name of the private input signal
    pub fn private_signal(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Toeic => "score",
            Self::Degree => "gpa",
        }
    }

    /// Name of the public threshold signal
    pub fn threshold_signal(self) -> &'static str {
        match self {
            Self::Age => "minAge",
            Self::Toeic => "minScore",
            Self::Degree => "minGpa",
        }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitId {
    type Err = ZkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "age" => Ok(Self::Age),
            "toeic" => Ok(Self::Toeic),
            "degree" => Ok(Self::Degree),
            other => Err(ZkError::InvalidInput {
                field: "circuit".into(),
                value: other.into(),
                expected: "age, toeic or degree".into(),
            }),
        }
    }
}

/// Whether a threshold makes the statement a tautology that is not proved.
///
/// Only the degree circuit treats a zero threshold as "holding a degree is
/// enough"; no proof is generated for it and callers get a skipped outcome.
pub fn is_vacuous_threshold(circuit: CircuitId, threshold: u64) -> bool {
    circuit == CircuitId::Degree && threshold == 0
}

/// Threshold circuit: `satisfied = value >= threshold`
#[derive(Clone, Debug)]
pub struct ThresholdCircuit {
    /// Which credential circuit this instance belongs to
    pub circuit: CircuitId,
    /// Public: minimum required value
    pub threshold: Option<u64>,
    /// Public: claimed comparison outcome
    pub satisfied: Option<bool>,
    /// Private: the credential value
    pub value: Option<u64>,
}

impl ThresholdCircuit {
    /// Create a circuit with a full assignment
    pub fn new(circuit: CircuitId, value: u64, threshold: u64) -> Self {
        Self {
            circuit,
            threshold: Some(threshold),
            satisfied: Some(value >= threshold),
            value: Some(value),
        }
    }

    /// Create an unassigned circuit, used for key generation
    pub fn blank(circuit: CircuitId) -> Self {
        Self {
            circuit,
            threshold: None,
            satisfied: None,
            value: None,
        }
    }
}

/// Decompose `var` into `num_bits` little-endian bits and enforce the
/// recomposition, which bounds `var` to `[0, 2^num_bits)`.
fn enforce_bit_width(
    cs: ConstraintSystemRef<Fr>,
    var: &FpVar<Fr>,
    value: Option<u64>,
    num_bits: usize,
) -> Result<Vec<Boolean<Fr>>, SynthesisError> {
    let mut bits = Vec::with_capacity(num_bits);
    for i in 0..num_bits {
        let bit = Boolean::new_witness(cs.clone(), || {
            value
                .map(|v| (v >> i) & 1 == 1)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        bits.push(bit);
    }

    let mut recomposed = FpVar::<Fr>::zero();
    let mut coeff = Fr::one();
    for bit in &bits {
        recomposed += FpVar::from(bit.clone()) * coeff;
        coeff.double_in_place();
    }
    recomposed.enforce_equal(var)?;

    Ok(bits)
}

impl ConstraintSynthesizer<Fr> for ThresholdCircuit {
    fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
        let max = self.circuit.max_value();

        // Public inputs, in signal order
        let threshold_var = FpVar::new_input(cs.clone(), || {
            self.threshold
                .map(Fr::from)
                .ok_or(SynthesisError::AssignmentMissing)
        })?;
        let satisfied_var = Boolean::new_input(cs.clone(), || {
            self.satisfied.ok_or(SynthesisError::AssignmentMissing)
        })?;

        // Private witness
        let value_var = FpVar::new_witness(cs.clone(), || {
            self.value.map(Fr::from).ok_or(SynthesisError::AssignmentMissing)
        })?;

        enforce_bit_width(cs.clone(), &threshold_var, self.threshold, RANGE_BITS)?;
        enforce_bit_width(cs.clone(), &value_var, self.value, RANGE_BITS)?;

        // value <= max
        let headroom = FpVar::Constant(Fr::from(max)) - &value_var;
        let headroom_value = self.value.and_then(|v| max.checked_sub(v));
        enforce_bit_width(cs.clone(), &headroom, headroom_value, RANGE_BITS)?;

        // value - threshold + 2^RANGE_BITS has its top bit set iff value >= threshold
        let offset = 1u64 << RANGE_BITS;
        let shifted = &value_var - &threshold_var + Fr::from(offset);
        let shifted_value = match (self.value, self.threshold) {
            (Some(v), Some(t)) => (v + offset).checked_sub(t),
            _ => None,
        };
        let shifted_bits = enforce_bit_width(cs, &shifted, shifted_value, RANGE_BITS + 1)?;
        shifted_bits[RANGE_BITS].enforce_equal(&satisfied_var)?;

        Ok(())
    }
}

/// Number of constraints the compiled circuit contains
pub fn constraint_count(circuit: CircuitId) -> Result<usize, SynthesisError> {
    let cs = ConstraintSystem::<Fr>::new_ref();
    cs.set_mode(SynthesisMode::Setup);
    ThresholdCircuit::blank(circuit).generate_constraints(cs.clone())?;
    Ok(cs.num_constraints())
}
