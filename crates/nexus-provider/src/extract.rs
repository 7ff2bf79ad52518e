//! Pulls a user-facing text result and tool usage out of a run payload.
//!
//! The payload is optional-field-laden and varies by provider, so the
//! extraction sources and their priority are an explicit contract here
//! rather than scattered existence checks.

use nexus_core::{ExtractedResult, NexusError, NexusResult, RunOutcome, StepOutput};

/// Distinguished `step_outputs` key holding the plan's final result.
pub const FINAL_RESULT_KEY: &str = "$result";

fn non_empty(text: Option<&String>) -> Option<&str> {
    text.map(String::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Summary-then-value preference applied to a single step output.
fn from_step(step: &StepOutput) -> Option<&str> {
    non_empty(step.summary.as_ref()).or_else(|| non_empty(step.value.as_ref()))
}

/// Extracts the normalized result from a completed run.
///
/// Sources are probed in strict priority order, first match wins:
/// 1. the top-level `result` field, verbatim;
/// 2. `final_output`, preferring `summary` over `value`;
/// 3. the `$result` entry of `step_outputs`, same preference;
/// 4. otherwise an `Extraction` error — the run succeeded but produced no
///    usable text, which callers surface as a soft failure distinct from a
///    provider error.
///
/// Whitespace-only strings count as absent at every step. Pure function:
/// the same outcome always yields the same result.
pub fn extract(outcome: &RunOutcome) -> NexusResult<ExtractedResult> {
    let payload = &outcome.payload;

    let text = non_empty(payload.result.as_ref())
        .or_else(|| payload.final_output.as_ref().and_then(from_step))
        .or_else(|| payload.step_outputs.get(FINAL_RESULT_KEY).and_then(from_step));

    let Some(text) = text else {
        return Err(NexusError::Extraction(
            "run completed without a result, final_output, or $result step".to_string(),
        ));
    };

    Ok(ExtractedResult {
        text: text.to_string(),
        tools_used: tools_used(outcome),
        raw: serde_json::to_value(payload).unwrap_or_default(),
    })
}

/// Tool invocations inferred from the run's step outputs.
///
/// Every `step_outputs` key other than [`FINAL_RESULT_KEY`] names a tool the
/// run invoked; order follows the mapping's insertion order, which the
/// platform guarantees matches execution order.
pub fn tools_used(outcome: &RunOutcome) -> Vec<String> {
    outcome
        .payload
        .step_outputs
        .keys()
        .filter(|key| key.as_str() != FINAL_RESULT_KEY)
        .cloned()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nexus_core::{RunPayload, RunState};

    fn completed(payload: RunPayload) -> RunOutcome {
        RunOutcome {
            state: RunState::Complete,
            payload,
        }
    }

    fn step(value: Option<&str>, summary: Option<&str>) -> StepOutput {
        StepOutput {
            value: value.map(String::from),
            summary: summary.map(String::from),
        }
    }

    #[test]
    fn top_level_result_wins_over_final_output() {
        let outcome = completed(RunPayload {
            result: Some("direct".to_string()),
            final_output: Some(step(Some("nested"), Some("nested summary"))),
            ..RunPayload::default()
        });

        let extracted = extract(&outcome).unwrap();
        assert_eq!(extracted.text, "direct");
    }

    #[test]
    fn final_output_prefers_summary_over_value() {
        let outcome = completed(RunPayload {
            final_output: Some(step(Some("15"), Some("The answer is 15."))),
            ..RunPayload::default()
        });

        assert_eq!(extract(&outcome).unwrap().text, "The answer is 15.");
    }

    #[test]
    fn final_output_falls_back_to_value() {
        let outcome = completed(RunPayload {
            final_output: Some(step(Some("15"), None)),
            ..RunPayload::default()
        });

        assert_eq!(extract(&outcome).unwrap().text, "15");
    }

    #[test]
    fn blank_result_falls_through_to_final_output() {
        let outcome = completed(RunPayload {
            result: Some("   ".to_string()),
            final_output: Some(step(Some("7"), None)),
            ..RunPayload::default()
        });

        assert_eq!(extract(&outcome).unwrap().text, "7");
    }

    #[test]
    fn result_step_is_probed_last() {
        let mut payload = RunPayload::default();
        payload
            .step_outputs
            .insert("$result".to_string(), step(Some("from step"), None));
        let outcome = completed(payload);

        assert_eq!(extract(&outcome).unwrap().text, "from step");
    }

    #[test]
    fn no_usable_text_is_a_soft_failure() {
        let outcome = completed(RunPayload::default());
        let err = extract(&outcome).unwrap_err();
        assert!(matches!(err, NexusError::Extraction(_)));
    }

    #[test]
    fn tool_names_skip_result_key_and_keep_order() {
        let mut payload = RunPayload::default();
        payload
            .step_outputs
            .insert("web_search".to_string(), step(Some("results"), None));
        payload
            .step_outputs
            .insert("$result".to_string(), step(Some("done"), None));
        payload
            .step_outputs
            .insert("calculator".to_string(), step(Some("42"), None));
        let outcome = completed(payload);

        let extracted = extract(&outcome).unwrap();
        assert_eq!(extracted.tools_used, vec!["web_search", "calculator"]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let outcome = completed(RunPayload {
            result: Some("stable".to_string()),
            ..RunPayload::default()
        });

        let first = extract(&outcome).unwrap();
        let second = extract(&outcome).unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.tools_used, second.tools_used);
        assert_eq!(first.raw, second.raw);
    }
}
