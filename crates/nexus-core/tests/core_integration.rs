//! Integration tests for nexus-core: error display contract and wire-format
//! round trips of the run types.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use nexus_core::{NexusError, RunOutcome, RunPayload, RunState, StepOutput};

#[test]
fn error_display_strings() {
    assert_eq!(
        NexusError::ProviderUnavailable("openai".into()).to_string(),
        "Provider unavailable: openai"
    );
    assert_eq!(NexusError::EmptyQuery.to_string(), "Query cannot be empty");
    assert!(NexusError::Extraction("no fields".into())
        .to_string()
        .starts_with("No extractable text"));
}

#[test]
fn json_error_converts() {
    let parse_err = serde_json::from_str::<RunPayload>("{broken").unwrap_err();
    let err: NexusError = parse_err.into();
    assert!(matches!(err, NexusError::Json(_)));
}

#[test]
fn run_outcome_roundtrip() {
    let mut payload = RunPayload {
        final_output: Some(StepOutput {
            value: Some("42".to_string()),
            summary: Some("The answer is 42.".to_string()),
        }),
        ..RunPayload::default()
    };
    payload.step_outputs.insert(
        "web_search".to_string(),
        StepOutput {
            value: Some("three results".to_string()),
            summary: None,
        },
    );

    let outcome = RunOutcome {
        state: RunState::Complete,
        payload,
    };

    let json = serde_json::to_string(&outcome).unwrap();
    let back: RunOutcome = serde_json::from_str(&json).unwrap();

    assert_eq!(back.state, RunState::Complete);
    assert_eq!(
        back.payload.final_output.unwrap().value.as_deref(),
        Some("42")
    );
    assert_eq!(
        back.payload.step_outputs.keys().next().map(String::as_str),
        Some("web_search")
    );
}

#[test]
fn outcome_without_payload_defaults() {
    let outcome: RunOutcome = serde_json::from_str(r#"{"state": "cancelled"}"#).unwrap();
    assert_eq!(outcome.state, RunState::Cancelled);
    assert!(outcome.payload.result.is_none());
}
