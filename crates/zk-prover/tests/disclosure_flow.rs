//! End-to-end proving, verification and disclosure against freshly
//! generated circuit assets

use std::collections::BTreeMap;

use anyhow::Result;
use ark_bn254::Fr;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use chrono::{NaiveDate, TimeZone, Utc};
use nfc_zk_prover::{
    assets::AssetLayout,
    credential::{DegreeClaims, IdentityClaims, LanguageTestClaims},
    disclosure::ConditionVerification,
    parse_conditions,
    prover::generate_proof,
    setup::{generate_all_assets, generate_assets},
    types::ThresholdInput,
    verifier::OutcomeCheck,
    verify_record, CircuitId, CircuitProof, ConditionKind, ConditionMatcher, CredentialClaims,
    CredentialProver, CredentialVerifier, DisclosureBuilder, DisclosureService,
    InMemoryCredentialRepository, ProofOutcome, VerifiableCredential, VerificationStatus, ZkError,
};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tempfile::TempDir;

const HOLDER: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

/// Assets for every circuit, generated once for the whole test binary
static ASSETS: Lazy<TempDir> = Lazy::new(|| {
    let dir = tempfile::tempdir().unwrap();
    generate_all_assets(&AssetLayout::new(dir.path()), &mut StdRng::seed_from_u64(2024)).unwrap();
    dir
});

fn prover() -> CredentialProver {
    CredentialProver::new(ASSETS.path()).unwrap()
}

fn verifier() -> CredentialVerifier {
    CredentialVerifier::new(ASSETS.path())
}

fn proved(outcome: ProofOutcome) -> CircuitProof {
    match outcome {
        ProofOutcome::Proved(proof) => proof,
        ProofOutcome::Skipped { circuit } => panic!("unexpected skip for {circuit}"),
    }
}

fn wallet(toeic: u64) -> Vec<VerifiableCredential> {
    let issued = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    vec![
        VerifiableCredential::new(
            "urn:vc:toeic-1",
            "did:web:ets.org",
            issued,
            CredentialClaims::LanguageTestScore(LanguageTestClaims {
                test_name: Some("TOEIC".into()),
                score: Some(toeic),
                ..Default::default()
            }),
        ),
        VerifiableCredential::new(
            "urn:vc:degree-1",
            "did:web:snu.ac.kr",
            issued,
            CredentialClaims::Degree(DegreeClaims {
                institution: Some("Seoul National University".into()),
                major: Some("Computer Science".into()),
                gpa: Some(3.8),
                ..Default::default()
            }),
        ),
    ]
}

fn matcher() -> ConditionMatcher {
    ConditionMatcher::new(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
}

fn scalar_leaves(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| scalar_leaves(v, out)),
        Value::Object(map) => map.values().for_each(|v| scalar_leaves(v, out)),
        scalar => out.push(scalar.clone()),
    }
}

#[test]
fn test_satisfied_threshold_proves_and_verifies() -> Result<()> {
    let proof = proved(prover().prove_toeic(850, 800)?);

    assert_eq!(proof.public_signal_strings(), vec!["800", "1"]);
    assert_eq!(proof.threshold(), Some(800));
    assert_eq!(proof.satisfied(), Some(true));
    assert!(verifier().verify(&proof)?);
    Ok(())
}

#[test]
fn test_unsatisfied_threshold_proves_non_satisfaction() -> Result<()> {
    let proof = proved(prover().prove_toeic(750, 800)?);

    assert_eq!(proof.public_signal_strings(), vec!["800", "0"]);
    assert!(verifier().verify(&proof)?);
    Ok(())
}

#[test]
fn test_boundary_value_is_satisfied() -> Result<()> {
    let proof = proved(prover().prove_age(19, 19)?);
    assert_eq!(proof.satisfied(), Some(true));
    assert!(verifier().verify(&proof)?);
    Ok(())
}

#[test]
fn test_tampered_outcome_is_rejected() -> Result<()> {
    let mut proof = proved(prover().prove_toeic(750, 800)?);
    proof.public_signals[1] = Fr::from(1u64);
    assert!(!verifier().verify(&proof)?);

    let mut proof = proved(prover().prove_toeic(850, 800)?);
    proof.public_signals[0] = Fr::from(700u64);
    assert!(!verifier().verify(&proof)?);
    Ok(())
}

#[test]
fn test_swapped_public_signals_are_rejected() -> Result<()> {
    let mut proof = proved(prover().prove_toeic(850, 800)?);
    proof.public_signals.swap(0, 1);
    assert!(!verifier().verify(&proof)?);
    Ok(())
}

#[test]
fn test_proof_is_bound_to_its_circuit() -> Result<()> {
    let mut proof = proved(prover().prove_gpa(3.8, 3.0)?);
    assert!(verifier().verify(&proof)?);

    proof.circuit = CircuitId::Toeic;
    assert!(!verifier().verify(&proof)?);
    Ok(())
}

#[test]
fn test_wrong_signal_count_is_malformed() -> Result<()> {
    let mut proof = proved(prover().prove_toeic(850, 800)?);
    proof.public_signals.push(Fr::from(0u64));
    assert!(matches!(
        verifier().verify(&proof),
        Err(ZkError::MalformedProof { .. })
    ));
    Ok(())
}

#[test]
fn test_verification_is_idempotent() -> Result<()> {
    let proof = proved(prover().prove_toeic(850, 800)?);
    let verifier = verifier();
    let first = verifier.verify(&proof)?;
    let second = verifier.verify(&proof)?;
    assert!(first);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn test_outcome_survives_the_wire() -> Result<()> {
    let outcome = prover().prove_toeic(850, 800)?;
    let json = serde_json::to_string(&outcome)?;

    assert_eq!(verifier().verify_json(&json)?, OutcomeCheck::Checked(true));
    let back: ProofOutcome = serde_json::from_str(&json)?;
    assert_eq!(back, outcome);
    Ok(())
}

#[test]
fn test_zero_gpa_threshold_is_skipped() -> Result<()> {
    let outcome = prover().prove_gpa(3.8, 0.0)?;
    assert_eq!(outcome, ProofOutcome::Skipped { circuit: CircuitId::Degree });

    let json = serde_json::to_value(&outcome)?;
    assert_eq!(json, json!({ "circuitId": "degree", "publicSignals": [], "skipped": true }));

    assert!(generate_proof(ASSETS.path(), CircuitId::Degree, 380, 0)?.is_skipped());
    assert!(!generate_proof(ASSETS.path(), CircuitId::Toeic, 380, 0)?.is_skipped());
    Ok(())
}

#[test]
fn test_named_signals() -> Result<()> {
    let prover = prover();

    let signals = ThresholdInput::new(850, 800).to_circuit_input(CircuitId::Toeic);
    let outcome = prover.generate_from_signals(CircuitId::Toeic, &signals)?;
    assert!(verifier().verify(&proved(outcome))?);

    let typo = json!({ "scroe": 850, "minScore": 800 });
    assert!(matches!(
        prover.generate_from_signals(CircuitId::Toeic, typo.as_object().unwrap()),
        Err(ZkError::Proving { circuit: CircuitId::Toeic, .. })
    ));

    let fractional = json!({ "gpa": 3.8, "minGpa": 300 });
    assert!(matches!(
        prover.generate_from_signals(CircuitId::Degree, fractional.as_object().unwrap()),
        Err(ZkError::Proving { .. })
    ));
    Ok(())
}

#[test]
fn test_missing_and_stale_assets() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let prover = CredentialProver::new(dir.path())?;
    assert!(matches!(
        prover.prove_toeic(850, 800),
        Err(ZkError::MissingAsset { circuit: CircuitId::Toeic, .. })
    ));

    let layout = AssetLayout::new(dir.path());
    generate_assets(&layout, CircuitId::Toeic, &mut StdRng::seed_from_u64(1))?;
    let mut descriptor: Value =
        serde_json::from_str(&std::fs::read_to_string(layout.descriptor_path(CircuitId::Toeic))?)?;
    descriptor["numConstraints"] = json!(1);
    std::fs::write(layout.descriptor_path(CircuitId::Toeic), descriptor.to_string())?;

    let prover = CredentialProver::new(dir.path())?;
    assert!(matches!(prover.prove_toeic(850, 800), Err(ZkError::Setup { .. })));
    Ok(())
}

#[test]
fn test_disclosure_hides_private_values() -> Result<()> {
    let prover = prover();
    let credentials = wallet(850);
    let conditions = parse_conditions(&json!({ "minToeicScore": 800, "minGpa": 3.0 }))?;
    let results = matcher().evaluate(&credentials, &conditions);

    let disclosure = DisclosureBuilder::new(&prover).build(
        &credentials,
        &conditions,
        &results,
        &[ConditionKind::MinToeicScore, ConditionKind::MinGpa],
    )?;
    let record = &disclosure.record;

    assert_eq!(record.proofs.len(), 2);
    let toeic = &record.public_inputs[&ConditionKind::MinToeicScore];
    assert_eq!(toeic.threshold, 800);
    assert_eq!(toeic.satisfied, Some(true));
    assert_eq!(toeic.condition_label, ">= 800");
    assert_eq!(record.public_inputs[&ConditionKind::MinGpa].condition_label, ">= 3.00");

    let mut leaves = Vec::new();
    scalar_leaves(&serde_json::to_value(record)?, &mut leaves);
    for secret in [json!(850), json!("850"), json!(380), json!("380"), json!(3.8)] {
        assert!(!leaves.contains(&secret), "{secret} leaked into the record");
    }

    // Witness attributes are disclosed through proofs, the rest stay hidden
    assert!(!record.hidden_attribute_names.contains(&"languageTestScore.score".to_string()));
    assert!(!record.hidden_attribute_names.contains(&"degree.gpa".to_string()));
    assert!(record.hidden_attribute_names.contains(&"degree.major".to_string()));
    assert!(record.hidden_attribute_names.contains(&"languageTestScore.testName".to_string()));

    let witnesses = &disclosure.private.witnesses;
    assert_eq!(witnesses[&ConditionKind::MinToeicScore].private_value, 850);
    assert_eq!(witnesses[&ConditionKind::MinGpa].private_value, 380);
    assert_eq!(witnesses[&ConditionKind::MinGpa].credential_id, "urn:vc:degree-1");
    Ok(())
}

#[test]
fn test_service_disclosure_verifies() -> Result<()> {
    let repository = InMemoryCredentialRepository::new();
    for vc in wallet(750) {
        repository.insert(HOLDER, vc)?;
    }
    let service = DisclosureService::new(&repository, matcher(), prover());

    let conditions =
        parse_conditions(&json!({ "minToeicScore": 800, "minGpa": 0, "minAge": 19 }))?;
    let disclosure = service.disclose(
        &HOLDER.to_lowercase(),
        &conditions,
        &[ConditionKind::MinToeicScore, ConditionKind::MinGpa, ConditionKind::MinAge],
    )?;
    let record = disclosure.record;

    // Unsatisfied TOEIC is proven, GPA 0 skipped, age has no credential
    let toeic = &record.public_inputs[&ConditionKind::MinToeicScore];
    assert_eq!(toeic.satisfied, Some(false));
    let gpa = &record.public_inputs[&ConditionKind::MinGpa];
    assert!(gpa.skipped);
    assert_eq!(gpa.satisfied, Some(true));
    assert_eq!(record.public_inputs[&ConditionKind::MinAge].satisfied, None);

    // The verifying party works from the wire form only
    let wire = serde_json::to_string(&record)?;
    let received = serde_json::from_str(&wire)?;
    let verified: BTreeMap<ConditionKind, ConditionVerification> =
        verify_record(&verifier(), &received)?;

    assert_eq!(verified[&ConditionKind::MinToeicScore].status, VerificationStatus::Verified);
    assert_eq!(verified[&ConditionKind::MinToeicScore].satisfied, Some(false));
    assert_eq!(verified[&ConditionKind::MinGpa].status, VerificationStatus::Skipped);
    assert_eq!(verified[&ConditionKind::MinAge].status, VerificationStatus::NotEvaluable);
    Ok(())
}

#[test]
fn test_tampered_record_is_rejected() -> Result<()> {
    let prover = prover();
    let credentials = wallet(750);
    let conditions = parse_conditions(&json!({ "minToeicScore": 800 }))?;
    let results = matcher().evaluate(&credentials, &conditions);
    let mut record = DisclosureBuilder::new(&prover)
        .build(&credentials, &conditions, &results, &[ConditionKind::MinToeicScore])?
        .record;

    // Claim success in the public inputs only
    if let Some(entry) = record.public_inputs.get_mut(&ConditionKind::MinToeicScore) {
        entry.satisfied = Some(true);
    }
    let verified = verify_record(&verifier(), &record)?;
    assert!(verified[&ConditionKind::MinToeicScore].is_rejected());

    // And in the proof's public signals as well
    if let Some(ProofOutcome::Proved(proof)) = record.proofs.first_mut() {
        proof.public_signals[1] = Fr::from(1u64);
    }
    let verified = verify_record(&verifier(), &record)?;
    assert!(verified[&ConditionKind::MinToeicScore].is_rejected());
    Ok(())
}

#[test]
fn test_parallel_and_sequential_agree() -> Result<()> {
    let prover = prover();
    let mut credentials = wallet(850);
    credentials.push(VerifiableCredential::new(
        "urn:vc:id-1",
        "did:web:gov.kr",
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        CredentialClaims::Identity(IdentityClaims {
            birth_date: NaiveDate::from_ymd_opt(2000, 6, 1),
            ..Default::default()
        }),
    ));
    let conditions =
        parse_conditions(&json!({ "minToeicScore": 800, "minGpa": 3.5, "minAge": 19 }))?;
    let results = matcher().evaluate(&credentials, &conditions);
    let selection = [ConditionKind::MinAge, ConditionKind::MinToeicScore, ConditionKind::MinGpa];

    let parallel = DisclosureBuilder::new(&prover)
        .parallel(true)
        .build(&credentials, &conditions, &results, &selection)?;
    let sequential = DisclosureBuilder::new(&prover)
        .parallel(false)
        .build(&credentials, &conditions, &results, &selection)?;

    assert_eq!(parallel.record.public_inputs, sequential.record.public_inputs);
    assert_eq!(parallel.private, sequential.private);
    let circuits: Vec<CircuitId> = parallel.record.proofs.iter().map(ProofOutcome::circuit).collect();
    assert_eq!(circuits, vec![CircuitId::Age, CircuitId::Toeic, CircuitId::Degree]);

    let verified = verify_record(&verifier(), &parallel.record)?;
    assert!(verified
        .values()
        .all(|v| v.status == VerificationStatus::Verified && v.satisfied == Some(true)));
    Ok(())
}
