//! Integration tests for ledger-core infrastructure

use ledger_core::{
    config_error, init_logging, not_found_error, validation_error, ErrorKind, LedgerConfig,
    LedgerError, LogFormat, LoggingConfig, PageRequest, Role,
};
use std::io::Write;

#[tokio::test]
async fn test_error_handling() {
    let error = validation_error!("Invalid date format, use YYYY-MM-DD", "date", "ledger");

    match &error {
        LedgerError::Validation {
            message,
            field,
            context,
        } => {
            assert_eq!(message, "Invalid date format, use YYYY-MM-DD");
            assert_eq!(field.as_deref(), Some("date"));
            assert_eq!(context.component, "ledger");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Validation error"),
    }

    // Logging must not panic without a subscriber
    error.log();

    assert_eq!(not_found_error!("Entry 1", "ledger").kind(), ErrorKind::NotFound);
    assert_eq!(config_error!("broken", "config").kind(), ErrorKind::Internal);

    let io: LedgerError = std::io::Error::other("disk").into();
    assert_eq!(io.kind(), ErrorKind::Internal);
    assert!(io.context().is_none());
}

#[test]
fn test_config_file_round_trip_with_env_overlay() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[server]
port = 9000
debug = true

[auth]
jwt_secret = "from-file"
token_ttl_hours = 2

[pagination]
max_page_size = 50
default_page_size = 5

[catalog]
provinces = ["北京"]
"#
    )
    .unwrap();

    let mut config = LedgerConfig::from_file(file.path()).unwrap();
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.auth.signing_secret(), "from-file");
    assert_eq!(config.pagination.admin_page_size, 20);
    assert_eq!(config.catalog.provinces, vec!["北京"]);
    assert_eq!(config.catalog.nature_options.len(), 10);
    config.validate().unwrap();

    config
        .apply_env_with(|key| (key == "LEDGER_PORT").then(|| "9100".to_string()))
        .unwrap();
    assert_eq!(config.address(), "127.0.0.1:9100");

    let page = PageRequest::resolve(None, Some("80"), config.pagination.default_page_size, config.pagination.max_page_size);
    assert_eq!(page.page_size, 50);
}

#[test]
fn test_invalid_config_file_reports_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server\nport = ").unwrap();
    let err = LedgerConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, LedgerError::Config { .. }));
}

#[test]
fn test_role_ordering_of_privileges() {
    assert_eq!(Role::default(), Role::User);
    assert!(Role::ALL.iter().filter(|r| r.bypasses_ownership()).count() == 2);
    assert!(!Role::User.bypasses_ownership());
}

#[tokio::test]
async fn test_file_logging_initialization() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("ledger.log");

    let config = LoggingConfig {
        level: "info".to_string(),
        format: LogFormat::Json,
        log_to_file: true,
        log_file_path: Some(path.to_string_lossy().into_owned()),
        ..LoggingConfig::default()
    };

    init_logging(&config).unwrap();
    tracing::info!(entry_id = 7, "ledger entry created");

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("ledger entry created"));

    // Only one global subscriber may exist per process
    assert!(init_logging(&config).is_err());
}
