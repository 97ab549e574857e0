//! Unit tests for error classification

use image_studio::generation::{classify, ClientFailure, ErrorKind, GenerationError, Pathway};

fn other(message: &str) -> ClientFailure {
    ClientFailure::Other(message.to_string())
}

#[test]
fn test_failed_to_fetch_is_network() {
    let err = classify(&other("TypeError: Failed to fetch"), Pathway::Generation);

    assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
    assert!(err.message().starts_with("Network error"));
    assert!(err.is_retryable());
}

#[test]
fn test_transport_failure_is_network() {
    let failure = ClientFailure::Transport {
        message: "error sending request: connection refused".to_string(),
    };

    assert_eq!(
        classify(&failure, Pathway::Generation).kind(),
        ErrorKind::NetworkUnreachable
    );
}

#[test]
fn test_server_status_is_overloaded() {
    for status in [500u16, 502, 503, 599] {
        let failure = ClientFailure::Status {
            status,
            message: format!("API request failed with status {}", status),
        };
        assert_eq!(
            classify(&failure, Pathway::Generation).kind(),
            ErrorKind::ServerOverloaded
        );
    }

    let err = classify(&other("API request failed with status 500"), Pathway::Generation);
    assert_eq!(
        err,
        GenerationError::ServerOverloaded(
            "The server is overloaded. Please try again in a few minutes.".to_string()
        )
    );
}

#[test]
fn test_client_status_keeps_message() {
    let failure = ClientFailure::Status {
        status: 400,
        message: "Prompt rejected by safety filter".to_string(),
    };

    assert_eq!(
        classify(&failure, Pathway::Generation),
        GenerationError::Unknown("Prompt rejected by safety filter".to_string())
    );

    // 401 is not a configuration problem on our side
    let failure = ClientFailure::Status {
        status: 401,
        message: "Invalid API key".to_string(),
    };
    assert_eq!(classify(&failure, Pathway::Generation).kind(), ErrorKind::Unknown);
}

#[test]
fn test_status_marker_needs_three_digits() {
    let err = classify(&other("status 5 of 7 failed"), Pathway::Generation);
    assert_eq!(err.kind(), ErrorKind::Unknown);
}

#[test]
fn test_empty_message_uses_fallback() {
    assert_eq!(
        classify(&other(""), Pathway::Generation).message(),
        "An unknown error occurred."
    );
    assert_eq!(
        classify(&other("  "), Pathway::Enhancement).message(),
        "Could not enhance the prompt."
    );
}

#[test]
fn test_missing_credential_is_not_retryable() {
    let err = classify(
        &ClientFailure::NotConfigured("The prompt enhancement API key is not configured.".to_string()),
        Pathway::Enhancement,
    );

    assert_eq!(err.kind(), ErrorKind::NotConfigured);
    assert!(!err.is_retryable());
}

#[test]
fn test_enhancement_network_message_differs() {
    let generation = classify(&other("Failed to fetch"), Pathway::Generation);
    let enhancement = classify(&other("Failed to fetch"), Pathway::Enhancement);

    assert_eq!(enhancement.kind(), ErrorKind::NetworkUnreachable);
    assert_ne!(generation.message(), enhancement.message());
    assert!(enhancement.message().contains("enhancement API"));
}
