//! Input types for the threshold circuits

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::circuits::CircuitId;
use crate::error::{Result, ZkError};

/// Fixed-point scale applied to GPA values
pub const GPA_SCALE: f64 = 100.0;

/// Input for a threshold proof
///
/// Proves: `private_value >= public_threshold` (or its negation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdInput {
    /// Credential value in circuit units (private)
    pub private_value: u64,
    /// Minimum required value in circuit units (public)
    pub public_threshold: u64,
}

impl ThresholdInput {
    /// Create a new input
    pub fn new(private_value: u64, public_threshold: u64) -> Self {
        Self {
            private_value,
            public_threshold,
        }
    }

    /// Validate both values against the circuit domain
    pub fn validate(&self, circuit: CircuitId) -> Result<()> {
        let max = circuit.max_value();
        if self.private_value > max {
            return Err(ZkError::ValueOutOfRange {
                field: circuit.private_signal().into(),
                value: self.private_value,
                max,
            });
        }
        if self.public_threshold > max {
            return Err(ZkError::ValueOutOfRange {
                field: circuit.threshold_signal().into(),
                value: self.public_threshold,
                max,
            });
        }
        Ok(())
    }

    /// Convert to named input signals, as a circom `input.json` would hold them
    pub fn to_circuit_input(&self, circuit: CircuitId) -> Map<String, Value> {
        let mut signals = Map::new();
        signals.insert(circuit.private_signal().into(), Value::from(self.private_value));
        signals.insert(
            circuit.threshold_signal().into(),
            Value::from(self.public_threshold),
        );
        signals
    }
}

/// Convert a GPA to circuit units (x100, rounded to the nearest hundredth)
pub fn scale_gpa(gpa: f64) -> Result<u64> {
    if !gpa.is_finite() || gpa < 0.0 {
        return Err(ZkError::InvalidInput {
            field: "gpa".into(),
            value: gpa.to_string(),
            expected: "a non-negative number".into(),
        });
    }
    // Bounded by the finite check above; out-of-domain values are rejected later
    Ok((gpa * GPA_SCALE).round() as u64)
}

/// Render a scaled GPA as a two-decimal string
pub fn format_gpa(scaled: u64) -> String {
    format!("{}.{:02}", scaled / 100, scaled % 100)
}

/// Full years between `birth_date` and `on`
pub fn age_on(birth_date: NaiveDate, on: NaiveDate) -> u64 {
    if on < birth_date {
        return 0;
    }
    let mut years = on.year() - birth_date.year();
    if (on.month(), on.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    u64::try_from(years).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_validation() {
        assert!(ThresholdInput::new(850, 800).validate(CircuitId::Toeic).is_ok());
        // Below threshold is still a valid input: it proves non-satisfaction
        assert!(ThresholdInput::new(750, 800).validate(CircuitId::Toeic).is_ok());

        let err = ThresholdInput::new(1200, 800)
            .validate(CircuitId::Toeic)
            .unwrap_err();
        assert!(matches!(err, ZkError::ValueOutOfRange { value: 1200, .. }));

        let err = ThresholdInput::new(380, 500)
            .validate(CircuitId::Degree)
            .unwrap_err();
        assert!(matches!(err, ZkError::ValueOutOfRange { ref field, .. } if field == "minGpa"));
    }

    #[test]
    fn test_circuit_input_names() {
        let signals = ThresholdInput::new(380, 300).to_circuit_input(CircuitId::Degree);
        assert_eq!(signals.get("gpa"), Some(&Value::from(380u64)));
        assert_eq!(signals.get("minGpa"), Some(&Value::from(300u64)));
        assert_eq!(signals.len(), 2);
    }

    #[test]
    fn test_scale_gpa() {
        assert_eq!(scale_gpa(3.8).unwrap(), 380);
        assert_eq!(scale_gpa(4.5).unwrap(), 450);
        assert_eq!(scale_gpa(0.0).unwrap(), 0);
        assert_eq!(scale_gpa(3.14159).unwrap(), 314);
        assert!(scale_gpa(-1.0).is_err());
        assert!(scale_gpa(f64::NAN).is_err());
        assert_eq!(format_gpa(305), "3.05");
    }

    #[test]
    fn test_age_on() {
        let birth = NaiveDate::from_ymd_opt(2000, 6, 15).unwrap();
        let before_birthday = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let on_birthday = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        assert_eq!(age_on(birth, before_birthday), 24);
        assert_eq!(age_on(birth, on_birthday), 25);
        assert_eq!(age_on(on_birthday, birth), 0);
    }
}
