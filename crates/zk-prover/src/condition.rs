//! Disclosure conditions (job posting requirements)

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::circuits::{is_vacuous_threshold, CircuitId};
use crate::credential::{CredentialType, VerifiableCredential};
use crate::error::{Result, ZkError};
use crate::types::{format_gpa, scale_gpa};

/// Named condition; each maps to exactly one credential type and circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionKind {
    /// Minimum age in whole years
    #[serde(rename = "minAge")]
    MinAge,
    /// Minimum TOEIC score
    #[serde(rename = "minToeicScore")]
    MinToeicScore,
    /// Minimum GPA on the 4.5 scale
    #[serde(rename = "minGpa")]
    MinGpa,
}

impl ConditionKind {
    /// Every supported condition
    pub const ALL: [ConditionKind; 3] = [
        ConditionKind::MinAge,
        ConditionKind::MinToeicScore,
        ConditionKind::MinGpa,
    ];

    /// Name used in postings and on the wire
    pub fn name(self) -> &'static str {
        match self {
            Self::MinAge => "minAge",
            Self::MinToeicScore => "minToeicScore",
            Self::MinGpa => "minGpa",
        }
    }

    /// Circuit that proves this condition
    pub fn circuit(self) -> CircuitId {
        match self {
            Self::MinAge => CircuitId::Age,
            Self::MinToeicScore => CircuitId::Toeic,
            Self::MinGpa => CircuitId::Degree,
        }
    }

    /// Credential type the condition is evaluated against
    pub fn credential_type(self) -> CredentialType {
        match self {
            Self::MinAge => CredentialType::Identity,
            Self::MinToeicScore => CredentialType::LanguageTestScore,
            Self::MinGpa => CredentialType::Degree,
        }
    }

    /// Credential attribute the private witness is derived from
    pub fn witness_attribute(self) -> &'static str {
        match self {
            Self::MinAge => "birthDate",
            Self::MinToeicScore => "score",
            Self::MinGpa => "gpa",
        }
    }

    /// Whether `vc` is the kind of credential this condition evaluates
    pub fn applies_to(self, vc: &VerifiableCredential) -> bool {
        match self {
            Self::MinToeicScore => vc.is_toeic(),
            _ => vc.credential_type() == self.credential_type(),
        }
    }

    /// Convert a threshold as written in a posting to circuit units
    pub fn to_circuit_units(self, threshold: f64) -> Result<u64> {
        match self {
            Self::MinGpa => scale_gpa(threshold),
            Self::MinAge | Self::MinToeicScore => {
                if threshold.is_finite() && threshold >= 0.0 && threshold.fract() == 0.0 {
                    Ok(threshold as u64)
                } else {
                    Err(ZkError::InvalidInput {
                        field: self.name().into(),
                        value: threshold.to_string(),
                        expected: "a non-negative integer".into(),
                    })
                }
            }
        }
    }

    /// Human-readable restatement of the comparison, safe to disclose
    pub fn label(self, threshold: u64) -> String {
        match self {
            Self::MinGpa => format!(">= {}", format_gpa(threshold)),
            Self::MinAge | Self::MinToeicScore => format!(">= {threshold}"),
        }
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConditionKind {
    type Err = ZkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ZkError::malformed_input(format!("unknown condition {s:?}")))
    }
}

/// A threshold requirement, in circuit units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Condition {
    /// Which condition
    pub kind: ConditionKind,
    /// Threshold in circuit units (GPA x100)
    pub threshold: u64,
}

impl Condition {
    /// Condition with a threshold already in circuit units
    pub fn new(kind: ConditionKind, threshold: u64) -> Self {
        Self { kind, threshold }
    }

    /// Age `>= years`
    pub fn min_age(years: u64) -> Self {
        Self::new(ConditionKind::MinAge, years)
    }

    /// TOEIC score `>= score`
    pub fn min_toeic_score(score: u64) -> Self {
        Self::new(ConditionKind::MinToeicScore, score)
    }

    /// GPA `>= gpa`, scaling the threshold to circuit units
    pub fn min_gpa(gpa: f64) -> Result<Self> {
        Ok(Self::new(ConditionKind::MinGpa, scale_gpa(gpa)?))
    }

    /// Circuit that proves this condition
    pub fn circuit(&self) -> CircuitId {
        self.kind.circuit()
    }

    /// Disclosable restatement, e.g. `">= 3.00"`
    pub fn label(&self) -> String {
        self.kind.label(self.threshold)
    }
}

/// Whether `condition` holds for anyone who merely holds the credential.
///
/// This is the only place the zero-threshold rule is decided; the matcher
/// and the proof generator both go through it.
pub fn is_vacuously_satisfied(condition: &Condition) -> bool {
    is_vacuous_threshold(condition.circuit(), condition.threshold)
}

/// Parse conditions from JSON.
///
/// Accepts the posting form `{"minToeicScore": 800, "minGpa": 3.0}` or a
/// list `[{"name": "minToeicScore", "threshold": 800}]`. A `null` or missing
/// threshold reads as zero.
pub fn parse_conditions(value: &Value) -> Result<Vec<Condition>> {
    let entries: Vec<(String, Option<&Value>)> = match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), Some(v))).collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let name = item
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ZkError::malformed_input("condition without a name"))?;
                Ok((name.to_string(), item.get("threshold")))
            })
            .collect::<Result<_>>()?,
        other => {
            return Err(ZkError::malformed_input(format!(
                "conditions must be an object or a list, got {other}"
            )))
        }
    };

    let mut seen = BTreeSet::new();
    let mut conditions = Vec::with_capacity(entries.len());
    for (name, threshold) in entries {
        let kind: ConditionKind = name.parse()?;
        if !seen.insert(kind) {
            return Err(ZkError::malformed_input(format!("duplicate condition {kind}")));
        }

        let raw = match threshold {
            None | Some(Value::Null) => 0.0,
            Some(v) => v.as_f64().ok_or_else(|| {
                ZkError::malformed_input(format!("threshold of {kind} is not a number: {v}"))
            })?,
        };
        let units = kind
            .to_circuit_units(raw)
            .map_err(|e| ZkError::malformed_input(e.to_string()))?;
        let max = kind.circuit().max_value();
        if units > max {
            return Err(ZkError::malformed_input(format!(
                "threshold of {kind} is above the maximum {}",
                kind.label(max).trim_start_matches(">= ")
            )));
        }
        conditions.push(Condition::new(kind, units));
    }
    Ok(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_posting_object() {
        let conditions = parse_conditions(&json!({ "minToeicScore": 800, "minGpa": 3.0 })).unwrap();
        assert_eq!(
            conditions,
            vec![Condition::min_gpa(3.0).unwrap(), Condition::min_toeic_score(800)]
        );
    }

    #[test]
    fn test_parse_list_with_absent_threshold() {
        let conditions = parse_conditions(&json!([
            { "name": "minGpa" },
            { "name": "minAge", "threshold": null },
            { "name": "minToeicScore", "threshold": 700 }
        ]))
        .unwrap();
        assert_eq!(conditions[0], Condition::new(ConditionKind::MinGpa, 0));
        assert_eq!(conditions[1], Condition::min_age(0));
        assert_eq!(conditions[2], Condition::min_toeic_score(700));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_conditions(&json!("minToeicScore")).is_err());
        assert!(parse_conditions(&json!({ "minToeicScore": "high" })).is_err());
        assert!(parse_conditions(&json!({ "minToeicScore": -5 })).is_err());
        assert!(parse_conditions(&json!({ "minToeicScore": 800.5 })).is_err());
        assert!(parse_conditions(&json!({ "minToeicScore": 1000 })).is_err());
        assert!(parse_conditions(&json!({ "minSalary": 1 })).is_err());
        assert!(parse_conditions(&json!([{ "threshold": 1 }])).is_err());
        assert!(parse_conditions(&json!([
            { "name": "minGpa", "threshold": 3.0 },
            { "name": "minGpa", "threshold": 3.5 }
        ]))
        .is_err());
    }

    #[test]
    fn test_vacuous_condition() {
        assert!(is_vacuously_satisfied(&Condition::min_gpa(0.0).unwrap()));
        assert!(!is_vacuously_satisfied(&Condition::min_gpa(3.0).unwrap()));
        assert!(!is_vacuously_satisfied(&Condition::min_toeic_score(0)));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Condition::min_toeic_score(800).label(), ">= 800");
        assert_eq!(Condition::min_gpa(3.0).unwrap().label(), ">= 3.00");
        assert_eq!(Condition::min_age(19).label(), ">= 19");
    }
}
