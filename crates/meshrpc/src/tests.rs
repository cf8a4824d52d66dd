use std::collections::BTreeMap;

use crate::*;

// ============================================================================
//  COMMAND CONSTRUCTION
// ============================================================================

#[test]
fn test_rpc_command_has_no_job() {
    let cmd = Command::rpc("foo", vec![Val::S64(1), Val::S64(2)]);
    assert_eq!(cmd.kind(), CommandKind::Rpc);
    assert!(cmd.job().is_none());
}

#[test]
fn test_custom_response_carries_job_id_field() {
    let job = JobId("abc-1".into());
    let cmd = Command::custom_response(job.clone(), "views", Val::S64(42));

    let Command::CustomResponse { job: carried, value } = &cmd else {
        panic!("expected custom-response, got {:?}", cmd);
    };
    assert_eq!(carried, &job);
    assert_eq!(value.get(JOB_ID_FIELD), Some(&Val::String("abc-1".into())));
    assert_eq!(value.get("views"), Some(&Val::S64(42)));
}

#[test]
fn test_custom_response_key_may_shadow_job_field() {
    // The emitted key is written last, matching `{jobId, [key]: val}`.
    let cmd = Command::custom_response(JobId("j".into()), JOB_ID_FIELD, Val::Bool(true));
    let Command::CustomResponse { value, .. } = cmd else { unreachable!() };
    assert_eq!(value.len(), 1);
    assert_eq!(value.get(JOB_ID_FIELD), Some(&Val::Bool(true)));
}

#[test]
fn test_command_kind_display() {
    assert_eq!(CommandKind::Rpc.to_string(), "rpc");
    assert_eq!(CommandKind::Custom.to_string(), "custom");
    assert_eq!(CommandKind::CustomResponse.to_string(), "custom-response");
}

// ============================================================================
//  WIRE FORMAT
// ============================================================================

#[test]
fn test_encode_decode_each_kind() -> anyhow::Result<()> {
    let mut nested = BTreeMap::new();
    nested.insert("xs".to_string(), Val::from(vec![1i64, 2, 3]));
    nested.insert("pi".to_string(), Val::F64(3.5));

    let commands = vec![
        Command::rpc("store", vec![Val::from("k"), Val::Map(nested), Val::Unit]),
        Command::custom(JobId("j-1".into()), "views", "count", ResponseShape::Once),
        Command::custom_response(JobId("j-1".into()), "count", Val::S64(7)),
    ];

    for cmd in commands {
        let bytes = encode(&cmd)?;
        assert_eq!(decode(&bytes)?, cmd);
    }
    Ok(())
}

#[test]
fn test_wire_kind_tags() -> anyhow::Result<()> {
    let bytes = encode(&Command::custom_response(JobId("j".into()), "k", Val::Unit))?;
    let text = String::from_utf8(bytes)?;
    assert!(text.contains(r#""kind":"custom-response""#), "{}", text);
    assert!(text.contains(r#""version":1"#), "{}", text);
    Ok(())
}

#[test]
fn test_decode_rejects_unknown_version() {
    let raw = br#"{"version":99,"command":{"kind":"rpc","name":"foo","args":[]}}"#;
    match decode(raw) {
        Err(Error::UnsupportedVersion { expected, found }) => {
            assert_eq!(expected, PROTOCOL_VERSION);
            assert_eq!(found, 99);
        }
        other => panic!("expected version error, got {:?}", other),
    }
}

#[test]
fn test_decode_checks_version_before_command() {
    // A newer peer may send command kinds this build has never heard of.
    let raw = br#"{"version":2,"command":{"kind":"eval","source":"x => x"}}"#;
    assert!(matches!(
        decode(raw),
        Err(Error::UnsupportedVersion { expected: PROTOCOL_VERSION, found: 2 })
    ));
}

#[test]
fn test_encode_refuses_non_finite_floats() {
    let nan = Command::rpc("f", vec![Val::F64(f64::NAN)]);
    assert!(matches!(encode(&nan), Err(Error::Serialization(_))));

    let nested = Val::List(vec![Val::S64(1), Val::F64(f64::INFINITY)]);
    let response = Command::custom_response(JobId("j".into()), "xs", nested);
    assert!(matches!(encode(&response), Err(Error::Serialization(_))));

    let mut map = BTreeMap::new();
    map.insert("low".to_string(), Val::F64(f64::NEG_INFINITY));
    let deep = Command::rpc("f", vec![Val::Map(map)]);
    assert!(matches!(encode(&deep), Err(Error::Serialization(_))));
}

#[test]
fn test_finite_floats_survive_the_wire() -> anyhow::Result<()> {
    let cmd = Command::rpc("f", vec![Val::F64(-0.25), Val::F64(f64::MAX), Val::F64(3.0)]);
    assert_eq!(decode(&encode(&cmd)?)?, cmd);
    Ok(())
}

#[test]
fn test_decode_rejects_unknown_kind() {
    let raw = br#"{"version":1,"command":{"kind":"eval","source":"x => x"}}"#;
    assert!(matches!(decode(raw), Err(Error::Malformed(_))));
}

#[test]
fn test_decode_garbage_is_error_not_panic() {
    assert!(matches!(decode(&[0xFF, 0xFF, 0xFF]), Err(Error::Malformed(_))));
    assert!(matches!(decode(b""), Err(Error::Malformed(_))));
}

#[test]
fn test_decode_skips_unknown_envelope_fields() -> anyhow::Result<()> {
    let raw = br#"{"version":1,"trace":"x","command":{"kind":"rpc","name":"foo","args":[{"S64":1}]}}"#;
    assert_eq!(decode(raw)?, Command::rpc("foo", vec![Val::S64(1)]));
    Ok(())
}

#[test]
fn test_custom_shape_defaults_to_stream() -> anyhow::Result<()> {
    let raw = br#"{"version":1,"command":{"kind":"custom","job":"j","key":"views","mapper":"m"}}"#;
    let Command::Custom { shape, .. } = decode(raw)? else {
        panic!("expected custom command");
    };
    assert_eq!(shape, ResponseShape::Stream);
    Ok(())
}

#[test]
fn test_decode_bounded_limit() -> anyhow::Result<()> {
    let bytes = encode(&Command::rpc("foo", vec![Val::from("x".repeat(64))]))?;
    assert!(decode_bounded(&bytes, bytes.len()).is_ok());
    match decode_bounded(&bytes, 16) {
        Err(Error::PayloadTooLarge { limit, found }) => {
            assert_eq!(limit, 16);
            assert_eq!(found, bytes.len());
        }
        other => panic!("expected size error, got {:?}", other),
    }
    Ok(())
}

// ============================================================================
//  VALUES AND FAILURES
// ============================================================================

#[test]
fn test_val_accessors() {
    assert_eq!(Val::from(3i64).as_s64(), Some(3));
    assert_eq!(Val::from(3i64).as_f64(), Some(3.0));
    assert_eq!(Val::from("x").as_s64(), None);
    assert_eq!(Val::from(true).as_bool(), Some(true));
    assert_eq!(Val::from(vec!["a", "b"]).as_list().map(|l| l.len()), Some(2));
    assert_eq!(Val::Unit.desc(), "unit");
    assert_eq!(Val::Map(BTreeMap::new()).desc(), "map");
}

#[test]
fn test_failure_reason_display() {
    let reason = FailureReason::BadArgumentCount { expected: 2, found: 3 };
    assert_eq!(reason.to_string(), "bad argument count: expected 2, found 3");
    assert_eq!(FailureReason::NotFound("views".into()).to_string(), "key not found: views");
}

#[test]
fn test_outcome_round_trips_inside_values() -> anyhow::Result<()> {
    let ok: Outcome = Ok(Val::S64(3));
    let err: Outcome = Err(FailureReason::Panicked("boom".into()));
    let ok_back: Outcome = serde_json::from_str(&serde_json::to_string(&ok)?)?;
    let err_back: Outcome = serde_json::from_str(&serde_json::to_string(&err)?)?;
    assert_eq!(ok_back, ok);
    assert_eq!(err_back, err);
    Ok(())
}
