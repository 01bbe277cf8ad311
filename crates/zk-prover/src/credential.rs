//! Verifiable Credential model
//!
//! Credentials are held as a tagged union per credential type with typed
//! accessors. Types this crate does not know keep a plain attribute map.
//! On the wire a credential is a flat JSON object:
//!
//! ```json
//! {
//!   "id": "urn:uuid:...",
//!   "type": "languageTestScore",
//!   "issuer": "ETS Global",
//!   "issuedAt": "2024-03-01T00:00:00Z",
//!   "attributes": { "testName": "TOEIC", "score": 850 }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{Result, ZkError};

/// JSON-LD context of W3C Verifiable Credentials
pub const W3C_CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// Attribute name reserved for embedded proofs; never valid on a source credential
const PROOF_ATTRIBUTE: &str = "proof";

/// Credential type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CredentialType {
    Identity,
    LanguageTestScore,
    Degree,
    Certification,
    /// Any type without typed claims
    Custom(String),
}

impl CredentialType {
    /// Wire name of the type
    pub fn as_str(&self) -> &str {
        match self {
            Self::Identity => "identity",
            Self::LanguageTestScore => "languageTestScore",
            Self::Degree => "degree",
            Self::Certification => "certification",
            Self::Custom(kind) => kind,
        }
    }

    /// Parse a wire name; unknown names become [`CredentialType::Custom`]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "identity" => Self::Identity,
            "languageTestScore" | "language-test-score" => Self::LanguageTestScore,
            "degree" => Self::Degree,
            "certification" => Self::Certification,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Type name used in W3C documents
    fn w3c_type(&self) -> String {
        match self {
            Self::Identity => "IdentityCredential".into(),
            Self::LanguageTestScore => "LanguageTestScoreCredential".into(),
            Self::Degree => "DegreeCredential".into(),
            Self::Certification => "CertificationCredential".into(),
            Self::Custom(kind) => kind.clone(),
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claims of an identity credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Claims of a language test credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageTestClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Claims of a degree credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DegreeClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub major: Option<String>,
    /// GPA on a 4.5 scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<f64>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Claims of a certification credential
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificationClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// Claims of a credential, by type
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialClaims {
    Identity(IdentityClaims),
    LanguageTestScore(LanguageTestClaims),
    Degree(DegreeClaims),
    Certification(CertificationClaims),
    Custom {
        kind: String,
        attributes: BTreeMap<String, Value>,
    },
}

impl CredentialClaims {
    /// Type of the credential these claims belong to
    pub fn credential_type(&self) -> CredentialType {
        match self {
            Self::Identity(_) => CredentialType::Identity,
            Self::LanguageTestScore(_) => CredentialType::LanguageTestScore,
            Self::Degree(_) => CredentialType::Degree,
            Self::Certification(_) => CredentialType::Certification,
            Self::Custom { kind, .. } => CredentialType::Custom(kind.clone()),
        }
    }

    /// Build typed claims from a generic attribute map.
    ///
    /// Never fails on attribute values: a typed attribute whose value does
    /// not parse is kept verbatim among the untyped attributes, so it reads
    /// as absent through the accessors.
    fn from_attributes(kind: &str, mut attributes: Map<String, Value>) -> Self {
        let attrs = &mut attributes;
        let claims = match CredentialType::parse(kind) {
            CredentialType::Identity => Self::Identity(IdentityClaims {
                name: take(attrs, "name"),
                birth_date: take(attrs, "birthDate"),
                other: BTreeMap::new(),
            }),
            CredentialType::LanguageTestScore => Self::LanguageTestScore(LanguageTestClaims {
                test_name: take(attrs, "testName"),
                score: take(attrs, "score"),
                other: BTreeMap::new(),
            }),
            CredentialType::Degree => Self::Degree(DegreeClaims {
                institution: take(attrs, "institution"),
                major: take(attrs, "major"),
                gpa: take(attrs, "gpa"),
                other: BTreeMap::new(),
            }),
            CredentialType::Certification => Self::Certification(CertificationClaims {
                title: take(attrs, "title"),
                other: BTreeMap::new(),
            }),
            CredentialType::Custom(kind) => {
                return Self::Custom {
                    kind,
                    attributes: attributes.into_iter().collect(),
                }
            }
        };
        claims.with_other(attributes.into_iter().collect())
    }

    fn with_other(mut self, rest: BTreeMap<String, Value>) -> Self {
        match &mut self {
            Self::Identity(c) => c.other = rest,
            Self::LanguageTestScore(c) => c.other = rest,
            Self::Degree(c) => c.other = rest,
            Self::Certification(c) => c.other = rest,
            Self::Custom { .. } => {}
        }
        self
    }

    /// Flatten the claims back to a generic attribute map
    pub fn to_attributes(&self) -> Map<String, Value> {
        fn put<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
            if let Some(value) = value {
                map.insert(key.to_string(), value.into());
            }
        }

        let mut map = Map::new();
        let other = match self {
            Self::Identity(c) => {
                put(&mut map, "name", c.name.clone());
                put(
                    &mut map,
                    "birthDate",
                    c.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
                );
                &c.other
            }
            Self::LanguageTestScore(c) => {
                put(&mut map, "testName", c.test_name.clone());
                put(&mut map, "score", c.score);
                &c.other
            }
            Self::Degree(c) => {
                put(&mut map, "institution", c.institution.clone());
                put(&mut map, "major", c.major.clone());
                put(&mut map, "gpa", c.gpa);
                &c.other
            }
            Self::Certification(c) => {
                put(&mut map, "title", c.title.clone());
                &c.other
            }
            Self::Custom { attributes, .. } => attributes,
        };
        for (key, value) in other {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// Remove `key` from `attributes` if its value parses as `T`; otherwise
/// leave it in place
fn take<T: DeserializeOwned>(attributes: &mut Map<String, Value>, key: &str) -> Option<T> {
    let value = attributes.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => {
            attributes.remove(key);
            Some(parsed)
        }
        // The parse error echoes the value; keep it out of the log
        Err(_) => {
            warn!("unusable credential attribute {key:?}");
            None
        }
    }
}

/// A Verifiable Credential held by a wallet
///
/// Credentials are immutable: a changed credential is a new credential with
/// a new `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCredential", into = "RawCredential")]
pub struct VerifiableCredential {
    pub id: String,
    pub issuer: String,
    pub issued_at: DateTime<Utc>,
    pub claims: CredentialClaims,
}

impl VerifiableCredential {
    /// Create a credential from already typed claims
    pub fn new(
        id: impl Into<String>,
        issuer: impl Into<String>,
        issued_at: DateTime<Utc>,
        claims: CredentialClaims,
    ) -> Self {
        Self {
            id: id.into(),
            issuer: issuer.into(),
            issued_at,
            claims,
        }
    }

    pub fn credential_type(&self) -> CredentialType {
        self.claims.credential_type()
    }

    /// Birth date of an identity credential
    pub fn birth_date(&self) -> Option<NaiveDate> {
        match &self.claims {
            CredentialClaims::Identity(c) => c.birth_date,
            _ => None,
        }
    }

    /// Whether this is a language test credential for TOEIC
    pub fn is_toeic(&self) -> bool {
        matches!(
            &self.claims,
            CredentialClaims::LanguageTestScore(LanguageTestClaims { test_name: Some(name), .. })
                if name.eq_ignore_ascii_case("toeic")
        )
    }

    /// TOEIC score; `None` for other language tests
    pub fn toeic_score(&self) -> Option<u64> {
        match &self.claims {
            CredentialClaims::LanguageTestScore(c) if self.is_toeic() => c.score,
            _ => None,
        }
    }

    /// GPA of a degree credential, on the 4.5 scale
    pub fn gpa(&self) -> Option<f64> {
        match &self.claims {
            CredentialClaims::Degree(c) => c.gpa,
            _ => None,
        }
    }

    /// Names of every attribute present on the credential
    pub fn attribute_names(&self) -> Vec<String> {
        self.claims.to_attributes().keys().cloned().collect()
    }

    /// Convert to a generic W3C-style JSON document.
    ///
    /// This is a format bridge for consumers that expect the W3C data model;
    /// it discloses every attribute and is not a selective disclosure.
    pub fn to_generic_json(&self) -> Value {
        let mut subject = self.claims.to_attributes();
        subject.insert("type".into(), Value::from(self.credential_type().as_str()));
        json!({
            "@context": [W3C_CREDENTIALS_CONTEXT],
            "id": self.id,
            "type": ["VerifiableCredential", self.credential_type().w3c_type()],
            "issuer": self.issuer,
            "issuanceDate": self.issued_at.to_rfc3339(),
            "credentialSubject": subject,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCredential {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    issuer: String,
    issued_at: DateTime<Utc>,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl TryFrom<RawCredential> for VerifiableCredential {
    type Error = ZkError;

    fn try_from(raw: RawCredential) -> Result<Self> {
        if raw.attributes.contains_key(PROOF_ATTRIBUTE) {
            return Err(ZkError::malformed_input(format!(
                "credential {} carries a proof attribute",
                raw.id
            )));
        }
        let claims = CredentialClaims::from_attributes(&raw.kind, raw.attributes);
        Ok(Self {
            id: raw.id,
            issuer: raw.issuer,
            issued_at: raw.issued_at,
            claims,
        })
    }
}

impl From<VerifiableCredential> for RawCredential {
    fn from(vc: VerifiableCredential) -> Self {
        Self {
            kind: vc.credential_type().as_str().to_string(),
            attributes: vc.claims.to_attributes(),
            id: vc.id,
            issuer: vc.issuer,
            issued_at: vc.issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: Value) -> VerifiableCredential {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parse_typed_credentials() {
        let toeic = parse(json!({
            "id": "vc-1",
            "type": "languageTestScore",
            "issuer": "ETS Global",
            "issuedAt": "2024-03-01T00:00:00Z",
            "attributes": { "testName": "TOEIC", "score": 850, "testDate": "2024-02-11" }
        }));
        assert_eq!(toeic.credential_type(), CredentialType::LanguageTestScore);
        assert!(toeic.is_toeic());
        assert_eq!(toeic.toeic_score(), Some(850));
        assert_eq!(toeic.gpa(), None);

        let degree = parse(json!({
            "id": "vc-2",
            "type": "degree",
            "issuer": "Seoul National University",
            "issuedAt": "2023-02-20T09:00:00Z",
            "attributes": { "institution": "SNU", "major": "CS", "gpa": 3.8 }
        }));
        assert_eq!(degree.gpa(), Some(3.8));

        let identity = parse(json!({
            "id": "vc-3",
            "type": "identity",
            "issuer": "gov",
            "issuedAt": "2020-01-01T00:00:00Z",
            "attributes": { "name": "Kim", "birthDate": "1999-05-04" }
        }));
        assert_eq!(identity.birth_date(), NaiveDate::from_ymd_opt(1999, 5, 4));
    }

    #[test]
    fn test_other_language_test_is_not_toeic() {
        let ielts = parse(json!({
            "id": "vc-4",
            "type": "language-test-score",
            "issuer": "British Council",
            "issuedAt": "2024-03-01T00:00:00Z",
            "attributes": { "testName": "IELTS", "score": 7 }
        }));
        assert!(!ielts.is_toeic());
        assert_eq!(ielts.toeic_score(), None);
    }

    #[test]
    fn test_custom_type_keeps_attributes() {
        let vc = parse(json!({
            "id": "vc-5",
            "type": "internship",
            "issuer": "ACME",
            "issuedAt": "2024-03-01T00:00:00Z",
            "attributes": { "company": "ACME", "months": 6 }
        }));
        assert_eq!(vc.credential_type(), CredentialType::Custom("internship".into()));
        assert_eq!(vc.attribute_names(), vec!["company", "months"]);
    }

    #[test]
    fn test_unknown_attributes_are_preserved() {
        let vc = parse(json!({
            "id": "vc-6",
            "type": "degree",
            "issuer": "SNU",
            "issuedAt": "2023-02-20T09:00:00Z",
            "attributes": { "gpa": 3.1, "graduationYear": 2023 }
        }));
        assert_eq!(vc.attribute_names(), vec!["gpa", "graduationYear"]);

        let round_tripped: VerifiableCredential =
            serde_json::from_value(serde_json::to_value(&vc).unwrap()).unwrap();
        assert_eq!(round_tripped, vc);
    }

    #[test]
    fn test_mistyped_attribute_reads_as_absent() {
        let toeic = parse(json!({
            "id": "vc-9",
            "type": "languageTestScore",
            "issuer": "ETS Global",
            "issuedAt": "2024-03-01T00:00:00Z",
            "attributes": { "testName": "TOEIC", "score": "850" }
        }));
        assert!(toeic.is_toeic());
        assert_eq!(toeic.toeic_score(), None);
        assert_eq!(toeic.attribute_names(), vec!["score", "testName"]);

        let identity = parse(json!({
            "id": "vc-10",
            "type": "identity",
            "issuer": "gov",
            "issuedAt": "2020-01-01T00:00:00Z",
            "attributes": { "name": "Kim", "birthDate": "1999/05/04" }
        }));
        assert_eq!(identity.birth_date(), None);

        // The raw value survives the wire unchanged
        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["attributes"]["birthDate"], "1999/05/04");
        assert_eq!(serde_json::from_value::<VerifiableCredential>(json).unwrap(), identity);
    }

    #[test]
    fn test_embedded_proof_is_rejected() {
        let result: std::result::Result<VerifiableCredential, _> = serde_json::from_value(json!({
            "id": "vc-7",
            "type": "degree",
            "issuer": "SNU",
            "issuedAt": "2023-02-20T09:00:00Z",
            "attributes": { "gpa": 3.1, "proof": { "pi_a": [] } }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_generic_json() {
        let vc = VerifiableCredential::new(
            "vc-8",
            "SNU",
            "2023-02-20T09:00:00Z".parse().unwrap(),
            CredentialClaims::Degree(DegreeClaims {
                gpa: Some(3.8),
                ..Default::default()
            }),
        );
        let doc = vc.to_generic_json();
        assert_eq!(doc["@context"][0], W3C_CREDENTIALS_CONTEXT);
        assert_eq!(doc["type"][1], "DegreeCredential");
        assert_eq!(doc["credentialSubject"]["gpa"], 3.8);
        assert_eq!(doc["credentialSubject"]["type"], "degree");
        assert_eq!(doc["issuanceDate"], "2023-02-20T09:00:00+00:00");
    }
}
