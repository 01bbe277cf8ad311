//! Proof types and serialization

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::PrimeField;
use ark_groth16::Proof as Groth16Proof;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use num_bigint::BigUint;
use num_traits::{Num, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::circuits::{CircuitId, NUM_PUBLIC_SIGNALS};
use crate::error::{Result, ZkError};

/// A Groth16 proof for the BN254 curve
#[derive(Clone, Debug, PartialEq)]
pub struct Proof {
    /// The underlying arkworks proof
    pub inner: Groth16Proof<Bn254>,
}

impl Proof {
    /// Create from arkworks proof
    pub fn new(inner: Groth16Proof<Bn254>) -> Self {
        Self { inner }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.inner.serialize_compressed(&mut bytes)?;
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = Groth16Proof::deserialize_compressed(bytes)
            .map_err(|e| ZkError::malformed_proof(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Convert to hex string
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Convert from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(|e| ZkError::malformed_proof(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Convert to JSON-serializable format (compatible with snarkjs)
    pub fn to_json(&self) -> ProofJson {
        ProofJson {
            pi_a: g1_to_strings(&self.inner.a),
            pi_b: g2_to_strings(&self.inner.b),
            pi_c: g1_to_strings(&self.inner.c),
            protocol: "groth16".into(),
            curve: "bn128".into(),
        }
    }

    /// Parse the snarkjs JSON format, checking every point
    pub fn from_json(json: &ProofJson) -> Result<Self> {
        if json.protocol != "groth16" || json.curve != "bn128" {
            return Err(ZkError::malformed_proof(format!(
                "unsupported proof system {}/{}",
                json.protocol, json.curve
            )));
        }
        Ok(Self::new(Groth16Proof {
            a: g1_from_strings(&json.pi_a)?,
            b: g2_from_strings(&json.pi_b)?,
            c: g1_from_strings(&json.pi_c)?,
        }))
    }
}

/// Parse a decimal string into a field element, rejecting non-canonical values
pub(crate) fn field_from_decimal<F: PrimeField>(s: &str) -> Result<F> {
    let n = BigUint::from_str_radix(s, 10)
        .map_err(|_| ZkError::malformed_proof(format!("not a decimal number: {s:?}")))?;
    let modulus: BigUint = F::MODULUS.into();
    if n >= modulus {
        return Err(ZkError::malformed_proof(format!(
            "value {s} exceeds the field modulus"
        )));
    }
    Ok(F::from(n))
}

/// Render a field element as a decimal string
pub(crate) fn field_to_decimal<F: PrimeField>(f: &F) -> String {
    let n: BigUint = (*f).into();
    n.to_string()
}

/// Convert G1 point to snarkjs projective string array
pub(crate) fn g1_to_strings(point: &G1Affine) -> Vec<String> {
    if point.is_zero() {
        return vec!["0".into(), "1".into(), "0".into()];
    }
    vec![field_to_decimal(&point.x), field_to_decimal(&point.y), "1".into()]
}

/// Convert G2 point to snarkjs projective string array
pub(crate) fn g2_to_strings(point: &G2Affine) -> Vec<Vec<String>> {
    if point.is_zero() {
        return vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ];
    }
    vec![
        vec![field_to_decimal(&point.x.c0), field_to_decimal(&point.x.c1)],
        vec![field_to_decimal(&point.y.c0), field_to_decimal(&point.y.c1)],
        vec!["1".into(), "0".into()],
    ]
}

pub(crate) fn g1_from_strings(coords: &[String]) -> Result<G1Affine> {
    let [x, y, z] = coords else {
        return Err(ZkError::malformed_proof(format!(
            "G1 point needs 3 coordinates, got {}",
            coords.len()
        )));
    };
    match z.as_str() {
        "0" => return Ok(G1Affine::zero()),
        "1" => {}
        other => {
            return Err(ZkError::malformed_proof(format!(
                "G1 point is not affine (z = {other})"
            )))
        }
    }
    let point = G1Affine::new_unchecked(field_from_decimal::<Fq>(x)?, field_from_decimal::<Fq>(y)?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ZkError::malformed_proof("G1 point is not on the curve"));
    }
    Ok(point)
}

pub(crate) fn g2_from_strings(coords: &[Vec<String>]) -> Result<G2Affine> {
    let fq2 = |pair: &[String]| -> Result<Fq2> {
        match pair {
            [c0, c1] => Ok(Fq2::new(field_from_decimal(c0)?, field_from_decimal(c1)?)),
            _ => Err(ZkError::malformed_proof("G2 coordinate needs 2 components")),
        }
    };
    let [x, y, z] = coords else {
        return Err(ZkError::malformed_proof(format!(
            "G2 point needs 3 coordinates, got {}",
            coords.len()
        )));
    };
    let z = fq2(z.as_slice())?;
    if z == Fq2::from(0u64) {
        return Ok(G2Affine::zero());
    }
    if z != Fq2::from(1u64) {
        return Err(ZkError::malformed_proof("G2 point is not affine"));
    }
    let point = G2Affine::new_unchecked(fq2(x.as_slice())?, fq2(y.as_slice())?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ZkError::malformed_proof("G2 point is not on the curve"));
    }
    Ok(point)
}

/// Proof bound to the circuit and public signals it was generated for
#[derive(Clone, Debug, PartialEq)]
pub struct CircuitProof {
    /// Circuit that produced the proof
    pub circuit: CircuitId,
    /// The ZK proof
    pub proof: Proof,
    /// Public signals: `[threshold, satisfied]`
    pub public_signals: Vec<Fr>,
}

impl CircuitProof {
    /// Bind a proof to its circuit and public signals
    pub fn new(circuit: CircuitId, proof: Proof, public_signals: Vec<Fr>) -> Self {
        Self {
            circuit,
            proof,
            public_signals,
        }
    }

    /// Disclosed threshold, if the signals are well formed
    pub fn threshold(&self) -> Option<u64> {
        self.public_signals.first().and_then(fr_to_u64)
    }

    /// Disclosed outcome bit, if the signals are well formed
    pub fn satisfied(&self) -> Option<bool> {
        match self.public_signals.get(1).and_then(fr_to_u64) {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        }
    }

    /// Public signals as decimal strings
    pub fn public_signal_strings(&self) -> Vec<String> {
        self.public_signals.iter().map(field_to_decimal).collect()
    }
}

fn fr_to_u64(f: &Fr) -> Option<u64> {
    let n: BigUint = (*f).into();
    n.to_u64()
}

/// Parse decimal public signals, checking the count the circuits expose
pub fn parse_public_signals(signals: &[String]) -> Result<Vec<Fr>> {
    if signals.len() != NUM_PUBLIC_SIGNALS {
        return Err(ZkError::malformed_proof(format!(
            "expected {NUM_PUBLIC_SIGNALS} public signals, got {}",
            signals.len()
        )));
    }
    signals.iter().map(|s| field_from_decimal(s)).collect()
}

/// Result of a proof request: a proof, or the skipped sentinel for a vacuous
/// threshold.
///
/// A skipped outcome carries no cryptographic evidence and is not equivalent
/// to a proof whose outcome bit is 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProofOutcomeJson", into = "ProofOutcomeJson")]
pub enum ProofOutcome {
    /// A proof was generated
    Proved(CircuitProof),
    /// Vacuous threshold; no proof was generated
    Skipped { circuit: CircuitId },
}

impl ProofOutcome {
    /// Circuit the outcome belongs to
    pub fn circuit(&self) -> CircuitId {
        match self {
            Self::Proved(proof) => proof.circuit,
            Self::Skipped { circuit } => *circuit,
        }
    }

    /// Whether proof generation was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// The proof, unless skipped
    pub fn proof(&self) -> Option<&CircuitProof> {
        match self {
            Self::Proved(proof) => Some(proof),
            Self::Skipped { .. } => None,
        }
    }

    /// Public signals; empty when skipped
    pub fn public_signals(&self) -> &[Fr] {
        match self {
            Self::Proved(proof) => &proof.public_signals,
            Self::Skipped { .. } => &[],
        }
    }
}

/// JSON-serializable proof format (compatible with snarkjs)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofJson {
    /// Proof point A (G1)
    pub pi_a: Vec<String>,
    /// Proof point B (G2)
    pub pi_b: Vec<Vec<String>>,
    /// Proof point C (G1)
    pub pi_c: Vec<String>,
    /// Protocol identifier
    pub protocol: String,
    /// Curve identifier
    pub curve: String,
}

/// Wire form of [`ProofOutcome`]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofOutcomeJson {
    /// Circuit identifier
    pub circuit_id: CircuitId,
    /// The proof; absent when skipped
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofJson>,
    /// Public signals as decimal strings
    #[serde(default)]
    pub public_signals: Vec<String>,
    /// Whether proof generation was skipped
    #[serde(default)]
    pub skipped: bool,
}

impl From<ProofOutcome> for ProofOutcomeJson {
    fn from(outcome: ProofOutcome) -> Self {
        match outcome {
            ProofOutcome::Proved(proof) => Self {
                circuit_id: proof.circuit,
                proof: Some(proof.proof.to_json()),
                public_signals: proof.public_signal_strings(),
                skipped: false,
            },
            ProofOutcome::Skipped { circuit } => Self {
                circuit_id: circuit,
                proof: None,
                public_signals: Vec::new(),
                skipped: true,
            },
        }
    }
}

impl TryFrom<ProofOutcomeJson> for ProofOutcome {
    type Error = ZkError;

    fn try_from(json: ProofOutcomeJson) -> Result<Self> {
        match (json.skipped, json.proof) {
            (true, None) if json.public_signals.is_empty() => Ok(Self::Skipped {
                circuit: json.circuit_id,
            }),
            (true, _) => Err(ZkError::malformed_proof(
                "skipped outcome must not carry a proof or public signals",
            )),
            (false, Some(proof)) => Ok(Self::Proved(CircuitProof::new(
                json.circuit_id,
                Proof::from_json(&proof)?,
                parse_public_signals(&json.public_signals)?,
            ))),
            (false, None) => Err(ZkError::malformed_proof("outcome has neither proof nor skip flag")),
        }
    }
}
