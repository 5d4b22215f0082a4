use elspot::error::{ElspotError, ErrorKind};

#[test]
fn error_constructors_group_1() {
    assert!(matches!(
        ElspotError::config("x"),
        ElspotError::Config { .. }
    ));
    assert!(matches!(
        ElspotError::validation("f", "m"),
        ElspotError::Validation { .. }
    ));
    assert!(matches!(
        ElspotError::communication("x"),
        ElspotError::Communication { status: None, .. }
    ));
    assert!(matches!(
        ElspotError::http_status(429, "x"),
        ElspotError::Communication {
            status: Some(429),
            ..
        }
    ));
}

#[test]
fn error_constructors_group_2() {
    assert!(matches!(ElspotError::timeout("x"), ElspotError::Timeout { .. }));
    assert!(matches!(ElspotError::parse("x"), ElspotError::Parse { .. }));
    assert!(matches!(ElspotError::empty("x"), ElspotError::Empty { .. }));
    assert!(matches!(ElspotError::io("x"), ElspotError::Io { .. }));
    assert!(matches!(
        ElspotError::cancelled("x"),
        ElspotError::Cancelled { .. }
    ));
}

#[test]
fn error_kinds_drive_retry_classification() {
    assert_eq!(
        ElspotError::validation("f", "m").kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        ElspotError::http_status(503, "x").kind(),
        ErrorKind::Communication
    );
    assert_eq!(ElspotError::timeout("x").kind(), ErrorKind::Communication);
    assert_eq!(ElspotError::empty("x").kind(), ErrorKind::Communication);
    assert_eq!(ElspotError::parse("x").kind(), ErrorKind::Parse);
    assert_eq!(
        ElspotError::DataIncomplete {
            expected: 13,
            actual: 2
        }
        .kind(),
        ErrorKind::DataIncomplete
    );
    assert!(ElspotError::config("x").is_retryable());
    assert!(!ElspotError::cancelled("x").is_retryable());
}

#[test]
fn conversions() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert!(matches!(ElspotError::from(io), ElspotError::Io { .. }));

    let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(ElspotError::from(json), ElspotError::Parse { .. }));

    let yaml = serde_yaml::from_str::<Vec<u8>>("a: b").unwrap_err();
    assert!(matches!(
        ElspotError::from(yaml),
        ElspotError::Serialization { .. }
    ));
}
