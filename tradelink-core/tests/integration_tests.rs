//! Integration tests for tradelink-core infrastructure

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tradelink_core::{
    config_error, init_logging, retry_async, ClientConfig, ErrorContext, LoggingConfig,
    RetryPolicy, TradelinkError, MAX_RETRIES, RETRY_DELAY_MS,
};

fn server_error(status: u16) -> TradelinkError {
    TradelinkError::Server {
        status,
        message: format!("HTTP error! status: {}", status),
        context: ErrorContext::new("test"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_with_linear_backoff() {
    let attempt_count = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();

    let operation = {
        let attempt_count = Arc::clone(&attempt_count);
        move |_attempt: usize| {
            let count = attempt_count.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if count < 3 {
                    Err(server_error(502))
                } else {
                    Ok("Success")
                }
            }
        }
    };

    let result = retry_async(operation, &RetryPolicy::default(), "test_operation").await;

    assert_eq!(result.unwrap(), "Success");
    assert_eq!(attempt_count.load(Ordering::SeqCst), 3);

    // 1s before the first retry, 2s before the second
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(3 * RETRY_DELAY_MS));
    assert!(elapsed < Duration::from_millis(3 * RETRY_DELAY_MS + 100));
}

#[tokio::test(start_paused = true)]
async fn test_retry_gives_up_after_max_retries() {
    let attempt_count = Arc::new(AtomicUsize::new(0));

    let operation = {
        let attempt_count = Arc::clone(&attempt_count);
        move |_attempt: usize| {
            attempt_count.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(server_error(500)) }
        }
    };

    let result = retry_async(operation, &RetryPolicy::default(), "always_failing").await;

    assert!(matches!(
        result,
        Err(TradelinkError::Server { status: 500, .. })
    ));
    assert_eq!(attempt_count.load(Ordering::SeqCst), MAX_RETRIES + 1);
}

#[tokio::test]
async fn test_retry_does_not_repeat_terminal_errors() {
    let attempt_count = Arc::new(AtomicUsize::new(0));

    let operation = {
        let attempt_count = Arc::clone(&attempt_count);
        move |_attempt: usize| {
            attempt_count.fetch_add(1, Ordering::SeqCst);
            async move {
                Err::<(), _>(TradelinkError::Client {
                    status: 400,
                    message: "phone is required".to_string(),
                    context: ErrorContext::new("test"),
                })
            }
        }
    };

    let result = retry_async(operation, &RetryPolicy::default(), "bad_request").await;

    assert!(result.is_err());
    assert_eq!(attempt_count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = ClientConfig::default();
    config.api.base_url = "https://market.example.com/api".to_string();
    config.retry = RetryPolicy {
        max_retries: 2,
        retry_delay_ms: 500,
    };

    config.save_to_file(&path).unwrap();
    let loaded = ClientConfig::from_file(&path).unwrap();

    assert_eq!(loaded, config);
}

#[tokio::test]
async fn test_missing_config_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ClientConfig::from_file(dir.path().join("absent.toml"));

    match result {
        Err(TradelinkError::Config { context, .. }) => {
            assert_eq!(context.operation.as_deref(), Some("read_file"));
            assert!(!context.recovery_suggestions.is_empty());
        }
        other => panic!("Expected Config error, got {:?}", other),
    }
}

#[test]
fn test_config_error_macro() {
    let error = config_error!("Invalid base URL", "test_component");

    match &error {
        TradelinkError::Config { message, context, .. } => {
            assert_eq!(message, "Invalid base URL");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
        }
        _ => panic!("Expected Config error"),
    }

    assert!(!error.is_retryable());
    error.log();
}

#[test]
fn test_logging_initialization_only_once() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: tradelink_core::LogFormat::Compact,
        filter_directives: vec!["tradelink_core=debug".to_string()],
        ..Default::default()
    };

    // The global subscriber can only be installed once per process
    let first = init_logging(&config);
    let second = init_logging(&config);
    if first.is_ok() {
        assert!(second.is_err());
    }
}
