//! Selective disclosure records
//!
//! A disclosure is produced as two halves:
//!
//! - [`DisclosureRecord`]: proofs and public inputs, handed to the verifier
//! - [`PrivateDisclosure`]: the witnesses behind each proof, kept by the holder
//!
//! Private values never enter the record.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::circuits::{is_vacuous_threshold, CircuitId};
use crate::condition::{is_vacuously_satisfied, Condition, ConditionKind};
use crate::credential::VerifiableCredential;
use crate::error::{Result, ZkError};
use crate::matcher::MatchResults;
use crate::proof::ProofOutcome;
use crate::prover::CredentialProver;
use crate::types::ThresholdInput;
use crate::verifier::CredentialVerifier;

/// Public view of one disclosed condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosedCondition {
    /// Threshold in circuit units (GPA x100)
    pub threshold: u64,
    /// `None` when the holder has no usable credential for the condition
    pub satisfied: Option<bool>,
    /// Restatement of the comparison, e.g. `">= 800"`
    pub condition_label: String,
    /// Vacuous threshold; no proof was generated
    #[serde(default)]
    pub skipped: bool,
}

/// The public half of a disclosure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosureRecord {
    /// One outcome per disclosed condition that had a credential, in
    /// selection order
    pub proofs: Vec<ProofOutcome>,
    /// Public inputs per disclosed condition
    pub public_inputs: BTreeMap<ConditionKind, DisclosedCondition>,
    /// `type.attribute` names of the source credentials that were not used
    /// as a witness. Informational only.
    pub hidden_attribute_names: Vec<String>,
}

impl DisclosureRecord {
    /// Outcome for the circuit behind `kind`, if the record carries one
    pub fn outcome_for(&self, kind: ConditionKind) -> Result<Option<&ProofOutcome>> {
        let mut matching = self
            .proofs
            .iter()
            .filter(|outcome| outcome.circuit() == kind.circuit());
        let first = matching.next();
        if matching.next().is_some() {
            return Err(ZkError::malformed_proof(format!(
                "record carries several {} proofs",
                kind.circuit()
            )));
        }
        Ok(first)
    }
}

/// Witness behind one proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateWitness {
    /// Credential the witness was taken from
    pub credential_id: String,
    /// Circuit the witness was proven with
    pub circuit: CircuitId,
    /// Private value, in circuit units
    pub private_value: u64,
    /// Threshold the value was compared against
    pub public_threshold: u64,
}

/// The holder-side half of a disclosure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateDisclosure {
    /// Witness per proven condition
    pub witnesses: BTreeMap<ConditionKind, PrivateWitness>,
}

/// Both halves of a disclosure
#[derive(Debug, Clone)]
pub struct Disclosure {
    /// Public half, for the verifier
    pub record: DisclosureRecord,
    /// Holder-side half
    pub private: PrivateDisclosure,
}

enum Planned {
    Absent,
    Skipped,
    Prove {
        credential_id: String,
        input: ThresholdInput,
    },
}

/// Packages proofs for a selection of evaluated conditions
pub struct DisclosureBuilder<'a> {
    prover: &'a CredentialProver,
    parallel: bool,
}

impl<'a> DisclosureBuilder<'a> {
    /// Builder over `prover`; parallel when the `parallel` feature is on
    pub fn new(prover: &'a CredentialProver) -> Self {
        Self {
            prover,
            parallel: cfg!(feature = "parallel"),
        }
    }

    /// Prove conditions concurrently. Has no effect without the `parallel`
    /// feature.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Whether proofs will be generated concurrently
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Build a disclosure for the `selection` of conditions.
    ///
    /// `results` must come from evaluating `conditions` against
    /// `credentials`. Unsatisfied conditions are still proven (a proof of
    /// non-satisfaction); conditions without a credential are listed with
    /// `satisfied: null` and no proof.
    #[instrument(skip_all, fields(selected = selection.len()))]
    pub fn build(
        &self,
        credentials: &[VerifiableCredential],
        conditions: &[Condition],
        results: &MatchResults,
        selection: &[ConditionKind],
    ) -> Result<Disclosure> {
        let mut selected: Vec<ConditionKind> = Vec::with_capacity(selection.len());
        for kind in selection {
            if !selected.contains(kind) {
                selected.push(*kind);
            }
        }

        let mut plans = Vec::with_capacity(selected.len());
        for kind in &selected {
            let condition = conditions
                .iter()
                .find(|c| c.kind == *kind)
                .ok_or_else(|| ZkError::malformed_input(format!("{kind} was not requested")))?;
            let result = results
                .get(kind)
                .ok_or_else(|| ZkError::malformed_input(format!("{kind} was not evaluated")))?;

            let plan = if result.satisfied.is_none() {
                Planned::Absent
            } else if is_vacuously_satisfied(condition) {
                Planned::Skipped
            } else {
                match (result.value, &result.credential_id) {
                    (Some(value), Some(credential_id)) => Planned::Prove {
                        credential_id: credential_id.clone(),
                        input: ThresholdInput::new(value, condition.threshold),
                    },
                    _ => Planned::Absent,
                }
            };
            plans.push((*condition, plan));
        }

        let jobs: Vec<(CircuitId, ThresholdInput)> = plans
            .iter()
            .filter_map(|(condition, plan)| match plan {
                Planned::Prove { input, .. } => Some((condition.circuit(), *input)),
                _ => None,
            })
            .collect();
        let mut proved = self.prove_all(&jobs)?.into_iter();

        let mut record = DisclosureRecord {
            proofs: Vec::new(),
            public_inputs: BTreeMap::new(),
            hidden_attribute_names: Vec::new(),
        };
        let mut private = PrivateDisclosure::default();

        for (condition, plan) in plans {
            let mut entry = DisclosedCondition {
                threshold: condition.threshold,
                satisfied: None,
                condition_label: condition.label(),
                skipped: false,
            };
            match plan {
                Planned::Absent => {}
                Planned::Skipped => {
                    entry.satisfied = Some(true);
                    entry.skipped = true;
                    record.proofs.push(ProofOutcome::Skipped {
                        circuit: condition.circuit(),
                    });
                }
                Planned::Prove {
                    credential_id,
                    input,
                } => {
                    let outcome = proved
                        .next()
                        .ok_or_else(|| ZkError::Proving {
                            circuit: condition.circuit(),
                            reason: "proof missing from batch".into(),
                        })?;
                    // Disclose what the proof commits to
                    if let Some(proof) = outcome.proof() {
                        entry.threshold = proof.threshold().unwrap_or(condition.threshold);
                        entry.satisfied = proof.satisfied();
                    }
                    private.witnesses.insert(
                        condition.kind,
                        PrivateWitness {
                            credential_id,
                            circuit: condition.circuit(),
                            private_value: input.private_value,
                            public_threshold: input.public_threshold,
                        },
                    );
                    record.proofs.push(outcome);
                }
            }
            record.public_inputs.insert(condition.kind, entry);
        }

        record.hidden_attribute_names = hidden_attributes(credentials, &private);

        info!(
            "Disclosure built - {} conditions, {} proofs, {} hidden attributes",
            record.public_inputs.len(),
            record.proofs.len(),
            record.hidden_attribute_names.len()
        );

        Ok(Disclosure { record, private })
    }

    fn prove_all(&self, jobs: &[(CircuitId, ThresholdInput)]) -> Result<Vec<ProofOutcome>> {
        #[cfg(feature = "parallel")]
        {
            if self.parallel && jobs.len() > 1 {
                use rayon::prelude::*;
                return jobs
                    .par_iter()
                    .map(|(circuit, input)| self.prover.generate(*circuit, input))
                    .collect();
            }
        }

        jobs.iter()
            .map(|(circuit, input)| self.prover.generate(*circuit, input))
            .collect()
    }
}

/// `type.attribute` names across `credentials`, minus every name a proof
/// used as its witness. Names are not qualified by credential, so a proven
/// attribute is never listed as hidden even when a second credential of the
/// same type carries it.
fn hidden_attributes(
    credentials: &[VerifiableCredential],
    private: &PrivateDisclosure,
) -> Vec<String> {
    let used: BTreeSet<String> = private
        .witnesses
        .keys()
        .map(|kind| format!("{}.{}", kind.credential_type(), kind.witness_attribute()))
        .collect();

    let hidden: BTreeSet<String> = credentials
        .iter()
        .flat_map(|vc| {
            let kind = vc.credential_type();
            vc.attribute_names()
                .into_iter()
                .map(move |name| format!("{kind}.{name}"))
        })
        .filter(|name| !used.contains(name))
        .collect();
    hidden.into_iter().collect()
}

/// How one disclosed condition fared under verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VerificationStatus {
    /// Proof valid and consistent with the public inputs
    Verified,
    /// Vacuous threshold; accepted without a proof
    Skipped,
    /// The holder had no credential for the condition
    NotEvaluable,
    /// Proof invalid, missing or inconsistent with the public inputs
    Rejected,
}

/// Verified result of one disclosed condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionVerification {
    /// How the condition fared
    pub status: VerificationStatus,
    /// Outcome the verifier may rely on; `None` unless verified or skipped
    pub satisfied: Option<bool>,
}

impl ConditionVerification {
    fn new(status: VerificationStatus, satisfied: Option<bool>) -> Self {
        Self { status, satisfied }
    }

    fn rejected(kind: ConditionKind, reason: &str) -> Self {
        warn!(condition = %kind, "disclosure rejected: {reason}");
        Self::new(VerificationStatus::Rejected, None)
    }

    /// Whether verification rejected the condition
    pub fn is_rejected(&self) -> bool {
        self.status == VerificationStatus::Rejected
    }
}

/// Verify every proof of a record and check that each public input agrees
/// with the public signals of its proof.
///
/// Tampering (a flipped outcome, a changed threshold, a claim without a
/// proof) yields [`VerificationStatus::Rejected`]. Structural problems and
/// missing verification keys are errors.
#[instrument(skip_all, fields(conditions = record.public_inputs.len()))]
pub fn verify_record(
    verifier: &CredentialVerifier,
    record: &DisclosureRecord,
) -> Result<BTreeMap<ConditionKind, ConditionVerification>> {
    let mut verified = BTreeMap::new();
    for (kind, entry) in &record.public_inputs {
        let kind = *kind;
        let check = if entry.condition_label != kind.label(entry.threshold) {
            ConditionVerification::rejected(kind, "label does not match threshold")
        } else {
            match record.outcome_for(kind)? {
                None if entry.satisfied.is_none() && !entry.skipped => {
                    ConditionVerification::new(VerificationStatus::NotEvaluable, None)
                }
                None => ConditionVerification::rejected(kind, "claim without a proof"),
                Some(ProofOutcome::Skipped { circuit }) => {
                    if entry.skipped
                        && entry.satisfied == Some(true)
                        && is_vacuous_threshold(*circuit, entry.threshold)
                    {
                        ConditionVerification::new(VerificationStatus::Skipped, Some(true))
                    } else {
                        ConditionVerification::rejected(kind, "skip on a non-vacuous threshold")
                    }
                }
                Some(ProofOutcome::Proved(proof)) => {
                    if entry.skipped
                        || proof.threshold() != Some(entry.threshold)
                        || proof.satisfied() != entry.satisfied
                    {
                        ConditionVerification::rejected(kind, "public inputs disagree with proof")
                    } else if verifier.verify(proof)? {
                        ConditionVerification::new(VerificationStatus::Verified, proof.satisfied())
                    } else {
                        ConditionVerification::rejected(kind, "invalid proof")
                    }
                }
            }
        };
        verified.insert(kind, check);
    }

    let orphaned = record
        .proofs
        .iter()
        .filter(|outcome| {
            !record
                .public_inputs
                .keys()
                .any(|kind| kind.circuit() == outcome.circuit())
        })
        .count();
    if orphaned > 0 {
        warn!("{} proofs without a public input were ignored", orphaned);
    }

    Ok(verified)
}
