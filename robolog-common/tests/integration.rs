//! Integration tests for robolog-common library.

use robolog_common::{
    Fault, FaultSnapshot, FaultWidget, Format, KeyExprBuilder, LiveSample, TelemetryConfig, Value,
    decode, decode_auto, encode, join_path, parse_config,
};

#[test]
fn test_full_sample_workflow() {
    let path = join_path(Some(&join_path(Some("drivetrain"), "leftMotor")), "temperature");
    let sample = LiveSample::new(path.clone(), Value::Number(42.0)).with_label("tag", "drive");

    // Key on the bus
    let key = KeyExprBuilder::new().build(&sample.path);
    assert_eq!(key, "robolog/drivetrain/leftMotor/temperature");
    assert_eq!(KeyExprBuilder::new().strip(&key), Some(path.as_str()));

    // JSON
    let json_bytes = encode(&sample, Format::Json).expect("JSON encode failed");
    let decoded: LiveSample = decode(&json_bytes, Format::Json).expect("JSON decode failed");
    assert_eq!(decoded.path, "drivetrain/leftMotor/temperature");
    assert_eq!(decoded.value, Value::Number(42.0));
    assert_eq!(decoded.labels.get("tag"), Some(&"drive".to_string()));

    // CBOR
    let cbor_bytes = encode(&sample, Format::Cbor).expect("CBOR encode failed");
    assert!(
        cbor_bytes.len() < json_bytes.len(),
        "CBOR should be smaller than JSON"
    );
    let auto_decoded: LiveSample = decode_auto(&cbor_bytes).expect("Auto decode failed");
    assert_eq!(auto_decoded.path, decoded.path);
}

#[test]
fn test_all_value_shapes_survive_cbor() {
    let values = [
        Value::Boolean(true),
        Value::Integer(-12),
        Value::Number(3.5),
        Value::Text("auto: two piece".to_string()),
        Value::BooleanArray(vec![true, false]),
        Value::IntegerArray(vec![1, 2, 3]),
        Value::NumberArray(vec![0.5, 1.5]),
        Value::TextArray(vec!["a".to_string()]),
    ];

    for value in values {
        let sample = LiveSample::new("shape", value.clone());
        let encoded = encode(&sample, Format::Cbor).unwrap();
        let decoded: LiveSample = decode(&encoded, Format::Cbor).unwrap();
        assert_eq!(decoded.value, value);
    }
}

#[test]
fn test_fault_snapshot_roundtrip() {
    let active = [Fault::error("TalonFX [4]", "Overtemperature")];
    let total = [
        Fault::error("TalonFX [4]", "Overtemperature"),
        Fault::warning("PDH", "Brownout"),
    ];

    let snapshot = FaultSnapshot {
        active: FaultWidget::from_faults(&active),
        total: FaultWidget::from_faults(&total),
    };

    let encoded = encode(&snapshot, Format::Json).unwrap();
    let decoded: FaultSnapshot = decode(&encoded, Format::Json).unwrap();

    assert_eq!(decoded, snapshot);
    assert_eq!(decoded.total.warnings, vec!["PDH: Brownout"]);
}

#[test]
fn test_telemetry_config_from_json5() {
    let config: TelemetryConfig = parse_config(
        r#"{
            // comments are fine in JSON5
            key_prefix: "frc/1234",
            console: { enabled: true },
        }"#,
    )
    .unwrap();

    config.validate().unwrap();
    assert_eq!(
        KeyExprBuilder::with_prefix(&config.key_prefix).build("arm/angle"),
        "frc/1234/arm/angle"
    );
}
