//! Incremental reconciliation of a streamed JSON result array.
//!
//! The model streams its answer as text. After every chunk the accumulated
//! text is probed and, when it looks like a closed array, fully parsed. A
//! parse that yields at least one `summary`-bearing object replaces the
//! published result list wholesale. Intermediate parse failures are
//! expected and stay silent; only a failure on the finished text surfaces.

use serde_json::Value;

use crate::error::PipelineError;
use crate::models::{ResultRecord, StreamState};

/// What the caller should publish after a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    /// Nothing new to show.
    Unchanged,
    /// Replace the published list with these records.
    Results(Vec<ResultRecord>),
    /// The finished stream carried no summarized document.
    NoResults,
    /// The finished stream does not parse. Always a `PipelineError::Parse`.
    Failed(PipelineError),
}

/// Per-query reconciliation state.
///
/// The finished pass is terminal: once it has run, every later call returns
/// `Reconciled::Unchanged`, so a query yields at most one terminal outcome.
#[derive(Debug, Default)]
pub struct Reconciler {
    spent: bool,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reconcile(&mut self, state: &StreamState) -> Reconciled {
        if self.spent {
            return Reconciled::Unchanged;
        }
        let finished = state.is_stream_finished;
        if finished {
            self.spent = true;
        }

        let cleaned = strip_code_fences(&state.accumulated_text);

        if !passes_probe(cleaned) {
            if !finished {
                return Reconciled::Unchanged;
            }
            if cleaned.is_empty() {
                return Reconciled::NoResults;
            }
            let message = match serde_json::from_str::<Value>(cleaned) {
                Err(e) => e.to_string(),
                Ok(_) => "response is valid JSON but not an array".to_string(),
            };
            return Reconciled::Failed(PipelineError::Parse {
                message,
                raw_text: state.accumulated_text.clone(),
            });
        }

        match serde_json::from_str::<Value>(cleaned) {
            Ok(value) => match records_from_value(value) {
                Some(records) => Reconciled::Results(records),
                None if finished => Reconciled::NoResults,
                None => Reconciled::Unchanged,
            },
            Err(e) if finished => Reconciled::Failed(PipelineError::Parse {
                message: e.to_string(),
                raw_text: state.accumulated_text.clone(),
            }),
            Err(_) => Reconciled::Unchanged,
        }
    }
}

/// Remove surrounding markdown code fences and whitespace.
///
/// The opening fence's info string (`json`, `Json`, `jsonc`, ...) runs to
/// the first newline and is dropped whole. Trailing backticks are stripped
/// greedily so a half-streamed closing fence does not hide an otherwise
/// complete array.
pub fn strip_code_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        s = if rest.trim_start().starts_with('[') {
            rest
        } else {
            // Info string not terminated yet: nothing but the fence so far
            rest.split_once('\n').map_or("", |(_, body)| body)
        };
    }
    s.trim_end_matches('`').trim()
}

/// Cheap check run before a full parse.
pub fn passes_probe(cleaned: &str) -> bool {
    cleaned.starts_with('[') && (cleaned.contains("}]") || cleaned.ends_with(']'))
}

fn is_summary_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("summary"))
}

/// Convert a parsed array into records, one per `summary`-bearing object.
/// Returns `None` unless the array is non-empty and yields at least one
/// record.
fn records_from_value(value: Value) -> Option<Vec<ResultRecord>> {
    let items = match value {
        Value::Array(items) if !items.is_empty() => items,
        _ => return None,
    };
    if !items.iter().any(is_summary_object) {
        return None;
    }

    let records: Vec<ResultRecord> = items
        .into_iter()
        .filter(is_summary_object)
        .filter_map(|item| match serde_json::from_value::<ResultRecord>(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("Skipping malformed result element: {e}");
                None
            }
        })
        .collect();

    if records.is_empty() {
        None
    } else {
        Some(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_PRODUCT: &str = r#"[{"type":"product","id":"p1","summary":"x","topics":[],"actions":[],"advisor":{},"client":{},"product":{}}]"#;

    const TWO_RECORDS: &str = r#"[
  {"type":"conversation","id":"c1","date":"2024-05-02","advisor":{"id":"a1","name":"Ana"},"client":{"id":"k1","name":"Kim"},"product":{"id":"f1","name":"Fund","type":"etf"},"summary":"Discussed fees","topics":["fees"],"actions":["send brochure"]},
  {"type":"product","id":"p2","date":"2024-05-03","advisor":{},"client":{},"product":{"id":"f2","name":"Bond","type":"bond"},"summary":"New bond","topics":[],"actions":[]}
]"#;

    fn state(text: &str, finished: bool) -> StreamState {
        StreamState {
            accumulated_text: text.to_string(),
            is_stream_finished: finished,
        }
    }

    fn ids(outcome: &Reconciled) -> Vec<String> {
        match outcome {
            Reconciled::Results(records) => records.iter().map(|r| r.id.clone()).collect(),
            other => panic!("expected results, got {other:?}"),
        }
    }

    // ─── Fence stripping and probe ───────────────────────

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_code_fences("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("  ```\n[1]\n```  "), "[1]");
        assert_eq!(strip_code_fences("[1]"), "[1]");
    }

    #[test]
    fn test_strip_any_fence_info_string() {
        assert_eq!(strip_code_fences("```Json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```jsonc\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("``` json5 \n[1]\n```"), "[1]");
        assert_eq!(strip_code_fences("```[1]```"), "[1]");
        assert_eq!(strip_code_fences("```jso"), "");
    }

    #[test]
    fn test_mixed_case_fence_publishes_records() {
        let fenced = format!("```Json\n{ONE_PRODUCT}\n```");
        let outcome = Reconciler::new().reconcile(&state(&fenced, true));
        assert_eq!(ids(&outcome), vec!["p1"]);
    }

    #[test]
    fn test_strip_partial_closing_fence() {
        assert_eq!(strip_code_fences("```json\n[1]\n``"), "[1]");
    }

    #[test]
    fn test_probe_requires_opening_bracket() {
        assert!(!passes_probe("{\"summary\":\"x\"}]"));
        assert!(!passes_probe("Here you go: [{}]"));
    }

    #[test]
    fn test_probe_accepts_closing_patterns() {
        assert!(passes_probe("[{\"a\":1}]"));
        assert!(passes_probe("[{\"a\":1}], junk"));
        assert!(passes_probe("[]"));
        assert!(!passes_probe("[{\"a\":1}"));
    }

    // ─── Publishing ──────────────────────────────────────

    #[test]
    fn test_single_product_record() {
        let mut r = Reconciler::new();
        let outcome = r.reconcile(&state(ONE_PRODUCT, false));
        assert_eq!(ids(&outcome), vec!["p1"]);
    }

    #[test]
    fn test_fenced_array_publishes_same_records() {
        let fenced = format!("```json\n{TWO_RECORDS}\n```");
        let plain = Reconciler::new().reconcile(&state(TWO_RECORDS, true));
        let wrapped = Reconciler::new().reconcile(&state(&fenced, true));
        assert_eq!(plain, wrapped);
        assert_eq!(ids(&plain), vec!["c1", "p2"]);
    }

    #[test]
    fn test_nested_fields_survive_reconciliation() {
        let outcome = Reconciler::new().reconcile(&state(TWO_RECORDS, false));
        let Reconciled::Results(records) = outcome else {
            panic!("expected results");
        };
        assert_eq!(records[0].advisor.name, "Ana");
        assert_eq!(records[0].product.kind, "etf");
        assert_eq!(records[0].actions, vec!["send brochure"]);
    }

    #[test]
    fn test_every_prefix_is_silent_or_complete() {
        let mut boundaries: Vec<usize> = TWO_RECORDS.char_indices().map(|(i, _)| i).collect();
        boundaries.push(TWO_RECORDS.len());
        for end in boundaries {
            let prefix = &TWO_RECORDS[..end];
            let outcome = Reconciler::new().reconcile(&state(prefix, false));
            match outcome {
                Reconciled::Unchanged => {}
                Reconciled::Results(_) => {
                    assert!(serde_json::from_str::<Value>(prefix.trim()).is_ok());
                }
                other => panic!("prefix of len {end} produced {other:?}"),
            }
        }
    }

    #[test]
    fn test_valid_but_summaryless_array_is_ignored_mid_stream() {
        let mut r = Reconciler::new();
        assert_eq!(r.reconcile(&state("[{\"id\":\"x\"}]", false)), Reconciled::Unchanged);
        assert_eq!(r.reconcile(&state("[null]", false)), Reconciled::Unchanged);
        assert_eq!(r.reconcile(&state("[]", false)), Reconciled::Unchanged);
    }

    #[test]
    fn test_loosely_typed_summary_objects_are_published() {
        for text in [
            r#"[{"summary":"x"}]"#,
            r#"[{"type":"product","id":42,"summary":"x"}]"#,
            r#"[{"type":"Product","id":"p1","summary":"x","topics":[],"actions":[],"advisor":{},"client":{},"product":{}}]"#,
            r#"[{"type":"product","id":"p1","summary":null}]"#,
        ] {
            let outcome = Reconciler::new().reconcile(&state(text, true));
            assert!(
                matches!(&outcome, Reconciled::Results(records) if records.len() == 1),
                "{text} produced {outcome:?}"
            );
        }
    }

    #[test]
    fn test_every_summary_object_in_mixed_array_survives() {
        let text = r#"[null, 3, {"id":"nosum"}, {"type":"product","id":"p1","summary":"ok"}, {"type":"invoice","id":7,"summary":"also"}]"#;
        let outcome = Reconciler::new().reconcile(&state(text, false));
        assert_eq!(ids(&outcome), vec!["p1", "7"]);
        let Reconciled::Results(records) = outcome else {
            unreachable!()
        };
        assert_eq!(
            records[1].record_type,
            Some(crate::models::RecordType::Other("invoice".into()))
        );
    }

    #[test]
    fn test_later_publish_replaces_earlier() {
        let mut r = Reconciler::new();
        let first = r#"[{"type":"product","id":"p1","summary":"draft"}]"#;
        let second = r#"[{"type":"product","id":"p1","summary":"final"},{"type":"product","id":"p2","summary":"more"}]"#;
        assert_eq!(ids(&r.reconcile(&state(first, false))), vec!["p1"]);
        let Reconciled::Results(records) = r.reconcile(&state(second, true)) else {
            panic!("expected results");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].summary, "final");
    }

    // ─── Terminal outcomes ───────────────────────────────

    #[test]
    fn test_truncated_array_fails_once_finished() {
        let truncated = &ONE_PRODUCT[..ONE_PRODUCT.len() - 10];
        let mut r = Reconciler::new();
        assert_eq!(r.reconcile(&state(truncated, false)), Reconciled::Unchanged);
        match r.reconcile(&state(truncated, true)) {
            Reconciled::Failed(PipelineError::Parse { message, raw_text }) => {
                assert!(message.contains("EOF while parsing"), "{message}");
                assert_eq!(raw_text, truncated);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_is_published_at_most_once() {
        let mut r = Reconciler::new();
        let finished = state("[{\"summary\": oops}]", true);
        assert!(matches!(r.reconcile(&finished), Reconciled::Failed(_)));
        assert_eq!(r.reconcile(&finished), Reconciled::Unchanged);
        assert_eq!(r.reconcile(&state(ONE_PRODUCT, true)), Reconciled::Unchanged);
    }

    #[test]
    fn test_prose_response_fails_once_finished() {
        let mut r = Reconciler::new();
        let prose = "I could not find anything relevant.";
        assert_eq!(r.reconcile(&state(prose, false)), Reconciled::Unchanged);
        match r.reconcile(&state(prose, true)) {
            Reconciled::Failed(PipelineError::Parse { message, .. }) => {
                assert!(message.contains("expected value"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_finished_object_is_not_an_array() {
        match Reconciler::new().reconcile(&state(r#"{"summary":"x"}"#, true)) {
            Reconciled::Failed(PipelineError::Parse { message, .. }) => {
                assert!(message.contains("not an array"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_finished_stream_is_no_results() {
        assert_eq!(
            Reconciler::new().reconcile(&state("  ", true)),
            Reconciled::NoResults
        );
        assert_eq!(
            Reconciler::new().reconcile(&state("```json\n[]\n```", true)),
            Reconciled::NoResults
        );
    }

    #[test]
    fn test_finished_array_without_summaries_is_no_results() {
        let outcome = Reconciler::new().reconcile(&state("[{\"id\":\"x\"}]", true));
        assert_eq!(outcome, Reconciled::NoResults);
    }
}
