use elspot::config::LoggingConfig;
use elspot::logging::{LogContext, get_logger, get_logger_with_context, init_logging, parse_log_level};
use tracing::Level;

#[test]
fn init_logging_writes_into_log_directory() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let config = LoggingConfig {
        level: "debug".to_string(),
        file: tmp_dir.path().join("elspot.log").to_string_lossy().to_string(),
        console_output: false,
        ..LoggingConfig::default()
    };

    init_logging(&config).unwrap();
    // Repeated initialization is a no-op
    init_logging(&config).unwrap();

    get_logger("test").info("written to the rolling file");
}

#[test]
fn log_levels_are_case_insensitive() {
    assert_eq!(parse_log_level("warn").unwrap(), Level::WARN);
    assert_eq!(parse_log_level("Trace").unwrap(), Level::TRACE);
    assert!(parse_log_level("verbose").is_err());
}

#[test]
fn cycle_loggers_carry_price_area() {
    let logger = get_logger_with_context(LogContext::new("orchestrator").with_price_area("DK1"));
    let cycle = logger.for_cycle("42");
    assert_eq!(
        cycle.format_fields(),
        "component=orchestrator,price_area=DK1,cycle_id=42"
    );
}
