use chargeapt::error::ChargeError;

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        ChargeError::config("x"),
        ChargeError::Config { .. }
    ));
    assert!(matches!(
        ChargeError::serialization("x"),
        ChargeError::Serialization { .. }
    ));
    assert!(matches!(ChargeError::io("x"), ChargeError::Io { .. }));
    assert!(matches!(
        ChargeError::network("x"),
        ChargeError::Network { .. }
    ));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(
        ChargeError::upstream("x"),
        ChargeError::Upstream { .. }
    ));
    assert!(matches!(
        ChargeError::validation("f", "m"),
        ChargeError::Validation { .. }
    ));
    assert!(matches!(
        ChargeError::timeout("x"),
        ChargeError::Timeout { .. }
    ));
}

#[test]
fn conversions() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        ChargeError::from(json_err),
        ChargeError::Serialization { .. }
    ));

    let parse_err = chrono::NaiveDate::parse_from_str("2024-13-01", "%Y-%m-%d").unwrap_err();
    assert!(matches!(
        ChargeError::from(parse_err),
        ChargeError::Validation { .. }
    ));
}

#[test]
fn display_messages() {
    let e = ChargeError::validation("field", "bad");
    let s = format!("{}", e);
    assert!(s.contains("Validation error"));
    assert!(ChargeError::upstream("503").is_transport());
}
