//! Credential condition matching
//!
//! Decides, per condition, whether the holder's credentials satisfy it. The
//! outcome distinguishes four states:
//!
//! - credential present, condition satisfied (`Some(true)`)
//! - credential present, condition unsatisfied (`Some(false)`)
//! - credential absent or its attribute unusable (`None`)
//! - condition vacuous (`Some(true)` with `vacuous` set, credential present)
//!
//! Absence is data, never an error.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::condition::{is_vacuously_satisfied, parse_conditions, Condition, ConditionKind};
use crate::credential::VerifiableCredential;
use crate::error::{Result, ZkError};
use crate::types::{age_on, scale_gpa};

/// Per-condition results, keyed by condition name
pub type MatchResults = BTreeMap<ConditionKind, ConditionResult>;

/// Which credential to use when a holder has several of the required type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicatePolicy {
    /// First in the order the credentials were handed in
    #[default]
    FirstFound,
    /// Latest `issuedAt`
    MostRecent,
    /// Largest attribute value
    Highest,
}

/// Outcome of evaluating one condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionResult {
    /// `None` when the condition could not be evaluated
    pub satisfied: Option<bool>,
    /// Private value compared against the threshold, in circuit units
    #[serde(skip)]
    pub value: Option<u64>,
    /// Disclosable restatement of the comparison, e.g. `">= 800"`
    pub condition_label: String,
    /// Threshold is vacuous; satisfied by credential presence alone
    pub vacuous: bool,
    /// Credential the value was taken from
    #[serde(skip)]
    pub credential_id: Option<String>,
}

impl ConditionResult {
    fn absent(condition: &Condition) -> Self {
        Self {
            satisfied: None,
            value: None,
            condition_label: condition.label(),
            vacuous: is_vacuously_satisfied(condition),
            credential_id: None,
        }
    }

    /// Whether a credential was found and the condition could be decided
    pub fn is_evaluable(&self) -> bool {
        self.satisfied.is_some()
    }
}

/// Evaluates conditions against a holder's credentials
#[derive(Debug, Clone)]
pub struct ConditionMatcher {
    policy: DuplicatePolicy,
    reference_date: NaiveDate,
}

impl Default for ConditionMatcher {
    fn default() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

impl ConditionMatcher {
    /// Create a matcher that computes ages as of `reference_date`
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            policy: DuplicatePolicy::default(),
            reference_date,
        }
    }

    /// Use `policy` when a holder has several applicable credentials
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active duplicate policy
    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Evaluate every condition against `credentials`
    pub fn evaluate(
        &self,
        credentials: &[VerifiableCredential],
        conditions: &[Condition],
    ) -> MatchResults {
        conditions
            .iter()
            .map(|condition| (condition.kind, self.evaluate_one(credentials, condition)))
            .collect()
    }

    /// Evaluate conditions and credentials given as JSON
    pub fn evaluate_json(&self, credentials: &Value, conditions: &Value) -> Result<MatchResults> {
        let items = credentials
            .as_array()
            .ok_or_else(|| ZkError::malformed_input("credentials must be a list"))?;
        let credentials = items
            .iter()
            .map(|item| {
                serde_json::from_value(item.clone())
                    .map_err(|e| ZkError::malformed_input(format!("invalid credential: {e}")))
            })
            .collect::<Result<Vec<VerifiableCredential>>>()?;
        let conditions = parse_conditions(conditions)?;
        Ok(self.evaluate(&credentials, &conditions))
    }

    /// Evaluate a single condition
    pub fn evaluate_one(
        &self,
        credentials: &[VerifiableCredential],
        condition: &Condition,
    ) -> ConditionResult {
        let Some(vc) = self.select(credentials, condition.kind) else {
            debug!(condition = %condition.kind, "no applicable credential");
            return ConditionResult::absent(condition);
        };

        let value = self.witness(vc, condition.kind);
        let vacuous = is_vacuously_satisfied(condition);
        let satisfied = if vacuous {
            Some(true)
        } else {
            value.map(|v| v >= condition.threshold)
        };

        debug!(
            condition = %condition.kind,
            credential = %vc.id,
            vacuous,
            ?satisfied,
            "condition evaluated"
        );

        ConditionResult {
            satisfied,
            value,
            condition_label: condition.label(),
            vacuous,
            credential_id: Some(vc.id.clone()),
        }
    }

    /// Private value of `kind` carried by `vc`, in circuit units.
    ///
    /// Values the circuit cannot range-check (TOEIC above 990, GPA above
    /// 4.5, age above 150) are unusable, the same as a missing attribute.
    pub fn witness(&self, vc: &VerifiableCredential, kind: ConditionKind) -> Option<u64> {
        let value = match kind {
            ConditionKind::MinAge => vc
                .birth_date()
                .map(|birth| age_on(birth, self.reference_date)),
            ConditionKind::MinToeicScore => vc.toeic_score(),
            ConditionKind::MinGpa => vc.gpa().and_then(|gpa| match scale_gpa(gpa) {
                Ok(scaled) => Some(scaled),
                Err(e) => {
                    warn!(credential = %vc.id, "unusable gpa attribute: {e}");
                    None
                }
            }),
        }?;

        let max = kind.circuit().max_value();
        if value > max {
            warn!(
                credential = %vc.id,
                condition = %kind,
                "{} is above the circuit maximum {max}",
                kind.witness_attribute()
            );
            return None;
        }
        Some(value)
    }

    fn select<'a>(
        &self,
        credentials: &'a [VerifiableCredential],
        kind: ConditionKind,
    ) -> Option<&'a VerifiableCredential> {
        let mut candidates = credentials.iter().filter(|vc| kind.applies_to(vc));
        match self.policy {
            DuplicatePolicy::FirstFound => candidates.next(),
            // Ties keep the earlier credential
            DuplicatePolicy::MostRecent => {
                candidates.reduce(|best, vc| if vc.issued_at > best.issued_at { vc } else { best })
            }
            DuplicatePolicy::Highest => candidates.reduce(|best, vc| {
                if self.witness(vc, kind) > self.witness(best, kind) {
                    vc
                } else {
                    best
                }
            }),
        }
    }
}
