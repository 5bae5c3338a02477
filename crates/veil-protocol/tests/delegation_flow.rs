//! End-to-end delegation runs: prepare -> transfer -> compute -> retrieve -> verify,
//! each step in its own party instance as separate invocations would be.

use veil_engine::{
    ConfidentialityEngine, EngineConfig, EngineError, MaskingEngine, MockEngine, SharingEngine,
};
use veil_protocol::{
    ComputingParty, DelegatingParty, FsHandoff, HandoffMedium, Locations, MemoryHandoff,
    ProtocolError, ProtocolState, Stage, Tolerance,
};
use veil_types::{
    ComputationRequest, OperandRole, OperandSlot, Operation, PrimitiveOperation, VerificationReport,
};

fn locations() -> Locations {
    Locations::default()
}

/// Full run over `medium`; returns the report and the decoded result
fn run_flow<E, M>(engine: E, medium: M, request: ComputationRequest) -> (VerificationReport, Vec<f64>)
where
    E: ConfidentialityEngine + Clone,
    M: HandoffMedium + Clone,
{
    let mut owner = DelegatingParty::new(engine.clone(), medium.clone(), locations(), request.clone());
    owner.prepare_and_transfer().unwrap();
    assert_eq!(owner.state(), ProtocolState::Transferred);

    let mut server =
        ComputingParty::from_descriptor(engine.clone(), medium.clone(), &locations().descriptor).unwrap();
    server.compute().unwrap();
    assert_eq!(server.state(), ProtocolState::Computed);

    let mut owner = DelegatingParty::resume(engine, medium, locations(), request).unwrap();
    let result = owner.retrieve().unwrap().to_vec();
    let report = owner.verify().unwrap();
    assert_eq!(owner.state(), ProtocolState::Verified);
    (report, result)
}

fn scenario_add() -> ComputationRequest {
    ComputationRequest::new(4, Operation::Add)
        .with_a(vec![1.0, 2.0, 3.0, 4.0])
        .with_b(vec![5.0, 6.0, 7.0, 8.0])
        .with_reference(vec![6.0, 8.0, 10.0, 12.0])
}

fn scenario_div() -> ComputationRequest {
    ComputationRequest::new(3, Operation::Div)
        .with_a(vec![10.0, 20.0, 30.0])
        .with_b(vec![2.0, 4.0, 5.0])
        .with_reference(vec![5.0, 5.0, 6.0])
}

fn scenario_exp() -> ComputationRequest {
    ComputationRequest::new(2, Operation::Exp)
        .with_a(vec![2.0, 3.0])
        .with_b(vec![3.0, 2.0])
        .with_reference(vec![8.0, 9.0])
}

fn seeded(seed: u8) -> EngineConfig {
    EngineConfig::default().with_batch_size(64).with_seed([seed; 32])
}

#[test]
fn test_scenario_add_roles_and_translation() {
    let mut owner = DelegatingParty::new(
        MockEngine::default(),
        MemoryHandoff::new(),
        locations(),
        scenario_add(),
    );
    let package = owner.prepare().unwrap();
    assert_eq!(package.primitive(), PrimitiveOperation::Add);

    assert_eq!(owner.role(), Some(OperandRole::BothOperands));
    let translation = owner.translation().unwrap();
    assert_eq!(translation.primitive, PrimitiveOperation::Add);
    assert_eq!(translation.operand_a, vec![1.0, 2.0, 3.0, 4.0]);
    assert_eq!(translation.operand_b, vec![5.0, 6.0, 7.0, 8.0]);
}

#[test]
fn test_scenario_add_every_backend() {
    let (report, _) = run_flow(MockEngine::default(), MemoryHandoff::new(), scenario_add());
    assert_eq!(report.differences, vec![0.0; 4]);

    let dir = tempfile::tempdir().unwrap();
    let (report, result) = run_flow(
        MaskingEngine::new(seeded(1)),
        FsHandoff::rooted(dir.path()),
        scenario_add(),
    );
    assert_eq!(result.len(), 4);
    assert!(Tolerance::Absolute(1e-9).flagged(&result, &[6.0, 8.0, 10.0, 12.0]).is_empty());
    assert!(report.max_difference().unwrap() < 1e-9);

    let dir = tempfile::tempdir().unwrap();
    let (report, _) = run_flow(
        SharingEngine::new(seeded(2)),
        FsHandoff::rooted(dir.path()),
        scenario_add(),
    );
    assert_eq!(report.differences, vec![0.0; 4]);
}

#[test]
fn test_scenario_div_as_reciprocal_mul() {
    let dir = tempfile::tempdir().unwrap();
    let medium = FsHandoff::rooted(dir.path());
    let engine = MaskingEngine::new(seeded(3));

    let mut owner = DelegatingParty::new(engine.clone(), medium.clone(), locations(), scenario_div());
    owner.prepare().unwrap();
    let translation = owner.translation().unwrap();
    assert_eq!(translation.primitive, PrimitiveOperation::Mul);
    assert_eq!(translation.operand_a, vec![10.0, 20.0, 30.0]);
    assert_eq!(translation.operand_b, vec![0.5, 0.25, 0.2]);

    let (report, result) = run_flow(engine, medium, scenario_div());
    assert_eq!(result.len(), 3);
    for (value, expected) in result.iter().zip([5.0, 5.0, 6.0]) {
        assert!((value - expected).abs() < 1e-9, "{value} vs {expected}");
    }
    assert!(report.max_difference().unwrap() < 1e-9);
}

#[test]
fn test_scenario_exp_compares_in_log_space() {
    let mut owner = DelegatingParty::new(
        MockEngine::default(),
        MemoryHandoff::new(),
        locations(),
        scenario_exp(),
    );
    owner.prepare().unwrap();
    let translation = owner.translation().unwrap();
    assert_eq!(translation.primitive, PrimitiveOperation::Mul);
    assert_eq!(translation.operand_a[0], 1.0);
    assert!((translation.operand_a[1] - 1.584962500721156).abs() < 1e-12);
    assert!((translation.reference[0] - 3.0).abs() < 1e-12);
    assert!((translation.reference[1] - 3.169925001442312).abs() < 1e-12);

    let dir = tempfile::tempdir().unwrap();
    let (report, result) = run_flow(
        SharingEngine::new(seeded(4)),
        FsHandoff::rooted(dir.path()),
        scenario_exp(),
    );
    assert!((result[0] - 3.0).abs() < 1e-12);
    assert!(report.max_difference().unwrap() < 1e-12);

    let linear = veil_protocol::result_to_linear(Operation::Exp, &result);
    assert!((linear[1] - 9.0).abs() < 1e-9);
}

#[test]
fn test_scenario_invalid_shape_aborts_before_encode() {
    let engine = MockEngine::default();
    let medium = MemoryHandoff::new();
    let request = ComputationRequest::new(5, Operation::Add)
        .with_a(vec![1.0; 5])
        .with_b(vec![1.0; 3]);

    let mut owner = DelegatingParty::new(engine.clone(), medium.clone(), locations(), request);
    let err = owner.prepare_and_transfer().unwrap_err();

    assert!(matches!(err, ProtocolError::Shape { stage: Stage::Prepare, .. }));
    assert_eq!(owner.state(), ProtocolState::Failed);
    assert_eq!(engine.encode_count(), 0);
    assert!(medium.locations().is_empty());
}

#[test]
fn test_scenario_missing_result_fails_retrieval() {
    let engine = MockEngine::default();
    let medium = MemoryHandoff::new();

    let mut owner = DelegatingParty::new(engine.clone(), medium.clone(), locations(), scenario_add());
    owner.prepare_and_transfer().unwrap();

    let mut owner = DelegatingParty::resume(engine.clone(), medium, locations(), scenario_add()).unwrap();
    let err = owner.retrieve().unwrap_err();
    assert!(err.is_io());
    assert_eq!(err.stage(), Stage::Retrieve);
    assert_eq!(owner.state(), ProtocolState::Failed);
    assert_eq!(engine.decode_count(), 0);

    assert!(matches!(
        owner.verify().unwrap_err(),
        ProtocolError::InvalidTransition { stage: Stage::Verify, state: ProtocolState::Failed }
    ));
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let medium = FsHandoff::rooted(dir.path());
    let engine = SharingEngine::new(seeded(5));
    let result_location = locations().resolve(&locations().result);

    run_flow(engine.clone(), medium.clone(), scenario_div());
    let first = medium.read(&result_location).unwrap();

    run_flow(engine, medium.clone(), scenario_div());
    let second = medium.read(&result_location).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_masking_reruns_agree_within_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let medium = FsHandoff::rooted(dir.path());
    let engine = MaskingEngine::new(EngineConfig::default().with_batch_size(16));

    let (_, first) = run_flow(engine.clone(), medium.clone(), scenario_add());
    let (_, second) = run_flow(engine, medium, scenario_add());
    assert!(Tolerance::Absolute(1e-9).flagged(&first, &second).is_empty());
}

#[test]
fn test_share_record_on_disk_layout() {
    let dir = tempfile::tempdir().unwrap();
    let medium = FsHandoff::rooted(dir.path());
    let engine = SharingEngine::new(seeded(6));

    let mut owner = DelegatingParty::new(engine, medium.clone(), locations(), scenario_add());
    owner.prepare_and_transfer().unwrap();

    let bytes = std::fs::read(medium.path_of(&locations().resolve(&locations().operand_a))).unwrap();
    assert_eq!(&bytes[..8], &4u64.to_le_bytes());
    assert_eq!(bytes.len(), 8 + 4 * 18);
}

#[test]
fn test_truncated_share_record_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let medium = FsHandoff::rooted(dir.path());
    let engine = SharingEngine::new(seeded(7));

    let mut owner = DelegatingParty::new(engine.clone(), medium.clone(), locations(), scenario_add());
    owner.prepare_and_transfer().unwrap();

    let operand = locations().resolve(&locations().operand_b);
    let bytes = medium.read(&operand).unwrap();
    medium.write(&operand, &bytes[..bytes.len() - 3]).unwrap();

    let mut server = ComputingParty::from_descriptor(engine, medium, &locations().descriptor).unwrap();
    let err = server.compute().unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Engine { stage: Stage::Compute, source: EngineError::Truncated { .. } }
    ));
    assert_eq!(server.state(), ProtocolState::Failed);
}

#[test]
fn test_single_owner_with_server_placeholder() {
    let engine = SharingEngine::new(seeded(8));
    let medium = MemoryHandoff::new();
    let request = ComputationRequest::new(3, Operation::Mul)
        .with_a(vec![1.5, -2.0, 4.0])
        .with_reference(vec![1.5, -2.0, 4.0]);

    let (report, result) = run_flow(engine, medium, request);
    assert_eq!(result, vec![1.5, -2.0, 4.0]);
    assert_eq!(report.differences, vec![0.0; 3]);
}

#[test]
fn test_masking_requires_every_operand_delegated() {
    let engine = MaskingEngine::new(seeded(9));
    let medium = MemoryHandoff::new();
    let request = ComputationRequest::new(2, Operation::Add).with_b(vec![1.0, 2.0]);

    let mut owner = DelegatingParty::new(engine.clone(), medium.clone(), locations(), request);
    owner.prepare_and_transfer().unwrap();
    assert_eq!(owner.role(), Some(OperandRole::OperandB));

    let mut server = ComputingParty::from_descriptor(engine, medium.clone(), &locations().descriptor).unwrap();
    let err = server.compute().unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::Engine { stage: Stage::Compute, source: EngineError::MissingSecret("encode") }
    ));
}

#[test]
fn test_computing_party_never_sees_secret() {
    let engine = MaskingEngine::new(seeded(10));
    let medium = MemoryHandoff::new();

    let mut owner = DelegatingParty::new(engine.clone(), medium.clone(), locations(), scenario_add());
    owner.prepare_and_transfer().unwrap();
    let descriptor = owner.descriptor().unwrap().clone();

    let json = medium.read_to_string(&locations().descriptor).unwrap();
    assert!(!json.contains("secret"));
    assert_eq!(descriptor.context_path(), locations().context_location());
    assert_eq!(
        descriptor.public_material_path(),
        locations().public_material_location()
    );
}

#[test]
fn test_minimal_descriptor_from_older_client() {
    let engine = MockEngine::default();
    let medium = MemoryHandoff::new();

    let ctx = engine.keygen().unwrap();
    let bundle = engine.export_context(&ctx).unwrap();
    medium.write("shared/ctx.bin", &bundle.params).unwrap();
    medium.write("shared/pub.bin", &bundle.public_material).unwrap();
    let a = engine.encode(&ctx, &[2.0, 3.0]).unwrap();
    let b = engine.encode(&ctx, &[4.0, 5.0]).unwrap();
    medium.write("shared/a.bin", &engine.handle_to_bytes(&a).unwrap()).unwrap();
    medium.write("shared/b.bin", &engine.handle_to_bytes(&b).unwrap()).unwrap();
    medium
        .write(
            "to_server.json",
            br#"{
                "primitiveOperation": "sub",
                "basePath": "shared/",
                "operandALocation": "a.bin",
                "operandBLocation": "b.bin",
                "resultLocation": "res.bin",
                "contextLocation": "ctx.bin",
                "publicMaterialLocation": "pub.bin",
                "comment": "written by an older client"
            }"#,
        )
        .unwrap();

    let mut server = ComputingParty::from_descriptor(engine.clone(), medium.clone(), "to_server.json").unwrap();
    let location = server.compute().unwrap();
    assert_eq!(location, "shared/res.bin");

    let result = engine.handle_from_bytes(&medium.read(&location).unwrap()).unwrap();
    assert_eq!(engine.decode(&ctx, &result).unwrap(), vec![-2.0, -2.0]);
}

#[test]
fn test_verify_without_reference_reports_nothing() {
    let request = ComputationRequest::new(2, Operation::Add)
        .with_a(vec![1.0, 2.0])
        .with_b(vec![3.0, 4.0]);
    let (report, result) = run_flow(MockEngine::default(), MemoryHandoff::new(), request);
    assert_eq!(result, vec![4.0, 6.0]);
    assert!(report.is_empty());
}

/// Owner one delivers A, owner two joins the context and delivers B; the
/// server computes and owner two retrieves
fn run_two_owners<E>(engine: E, operation: Operation, a: Vec<f64>, b: Vec<f64>) -> (Vec<f64>, MemoryHandoff, Vec<u8>)
where
    E: ConfidentialityEngine + Clone,
{
    let medium = MemoryHandoff::new();
    let len = a.len();

    let mut first = DelegatingParty::new(
        engine.clone(),
        medium.clone(),
        locations(),
        ComputationRequest::new(len, operation).with_a(a),
    );
    first.prepare_and_transfer().unwrap();
    let public = medium.read(&locations().public_material_location()).unwrap();

    let second_request = ComputationRequest::new(len, operation).with_b(b);
    let mut second = DelegatingParty::new(
        engine.clone(),
        medium.clone(),
        locations(),
        second_request.clone(),
    )
    .with_load_context(true);
    let descriptor = second.prepare_and_transfer().unwrap();
    assert!(descriptor.operand_location(OperandSlot::A).is_some());
    assert!(descriptor.operand_location(OperandSlot::B).is_some());

    let mut server =
        ComputingParty::from_descriptor(engine.clone(), medium.clone(), &locations().descriptor).unwrap();
    server.compute().unwrap();

    let mut owner = DelegatingParty::resume(engine, medium.clone(), locations(), second_request).unwrap();
    let result = owner.retrieve().unwrap().to_vec();
    (result, medium, public)
}

#[test]
fn test_shared_context_between_two_owners() {
    let engine = SharingEngine::new(EngineConfig::default().with_batch_size(8));
    let (result, medium, public) = run_two_owners(engine, Operation::Add, vec![1.0, 2.0], vec![3.0, 4.0]);

    assert_eq!(result.len(), 2);
    assert!(Tolerance::Absolute(1e-9).flagged(&result, &[4.0, 6.0]).is_empty());
    assert_eq!(medium.read(&locations().public_material_location()).unwrap(), public);
}

#[test]
fn test_shared_masking_context_mul() {
    let engine = MaskingEngine::new(seeded(12));
    let (result, _, _) = run_two_owners(engine, Operation::Mul, vec![1.5, -2.0, 4.0], vec![2.0, 3.0, 0.5]);

    assert_eq!(result.len(), 3);
    assert!(Tolerance::Relative(1e-6).flagged(&result, &[3.0, -6.0, 2.0]).is_empty());
}

#[test]
fn test_joining_owner_does_not_adopt_other_primitive() {
    let engine = MockEngine::default();
    let medium = MemoryHandoff::new();

    let mut first = DelegatingParty::new(
        engine.clone(),
        medium.clone(),
        locations(),
        ComputationRequest::new(2, Operation::Mul).with_a(vec![1.0, 2.0]),
    );
    first.prepare_and_transfer().unwrap();

    let mut second = DelegatingParty::new(
        engine,
        medium,
        locations(),
        ComputationRequest::new(2, Operation::Add).with_b(vec![3.0, 4.0]),
    )
    .with_load_context(true);
    let descriptor = second.prepare_and_transfer().unwrap();
    assert_eq!(descriptor.operand_location(OperandSlot::A), None);
}
