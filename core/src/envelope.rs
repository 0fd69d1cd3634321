//! Success/error classification of the vendor's JSON response envelope.
//!
//! The API reports failure state inconsistently: a boolean-ish `state`
//! field when it feels like it, and the numeric code under any one of
//! several historical names. The scan order below is fixed; the first
//! positive integer wins.

use serde_json::Value;

use crate::call::{JsonObject, Step};
use crate::error::{ApiError, ApiResult};

/// Candidate error-code fields, scanned in order.
const ERROR_KEYS: [&str; 4] = ["errcode", "errNo", "errno", "code"];

/// Compute the envelope's error code.
///
/// A present, truthy `state` means success (code 0). Otherwise (`state`
/// false *or absent*) the candidate fields are scanned and the first
/// positive integer is returned; -1 when nothing matches. Code <= 0 is
/// treated as success by [`classify`]: callers tolerate extraction failures
/// downstream when that default is wrong for an endpoint.
pub fn error_code(envelope: &JsonObject) -> i64 {
    if envelope.get("state").is_some_and(truthy) {
        return 0;
    }
    for key in ERROR_KEYS {
        let Some(value) = envelope.get(key) else {
            continue;
        };
        if let Some(code) = value.as_i64() {
            if code > 0 {
                return code;
            }
        }
    }
    -1
}

/// Default classification: positive code fails, everything else succeeds.
pub fn classify(envelope: &JsonObject) -> ApiResult<Step> {
    let code = error_code(envelope);
    if code > 0 {
        tracing::warn!(code, "server reported an error");
        Err(ApiError::api(code, envelope))
    } else {
        Ok(Step::Success)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: serde_json::Value) -> JsonObject {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn truthy_state_is_success() {
        assert_eq!(error_code(&obj(json!({"state": true}))), 0);
        assert_eq!(error_code(&obj(json!({"state": 1, "errno": 5}))), 0);
    }

    #[test]
    fn false_state_scans_candidate_keys_in_order() {
        assert_eq!(error_code(&obj(json!({"state": false, "errno": 5}))), 5);
        assert_eq!(
            error_code(&obj(json!({"state": false, "errcode": 0, "errNo": 7, "code": 9}))),
            7
        );
    }

    #[test]
    fn absent_state_scans_too() {
        assert_eq!(error_code(&obj(json!({"errno": 4100}))), 4100);
        assert_eq!(error_code(&obj(json!({"errcode": 0}))), -1);
    }

    #[test]
    fn non_positive_and_non_integer_codes_are_skipped() {
        assert_eq!(error_code(&obj(json!({"state": false, "errno": -2}))), -1);
        assert_eq!(
            error_code(&obj(json!({"state": false, "errno": "500"}))),
            -1
        );
    }

    #[test]
    fn ambiguous_envelopes_classify_as_success() {
        assert!(classify(&obj(json!({"errcode": 0}))).is_ok());
        assert!(classify(&obj(json!({"message": "?"}))).is_ok());
    }

    #[test]
    fn positive_code_carries_the_whole_envelope() {
        let err = classify(&obj(json!({"state": false, "errNo": 990, "error": "nope"})))
            .unwrap_err();
        match err {
            ApiError::Api { code, envelope } => {
                assert_eq!(code, 990);
                assert_eq!(envelope["error"], "nope");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
