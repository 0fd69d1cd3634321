//! Verify envelope classification and row decoding against JSON vectors
//! stored in `test-vectors/`.
//!
//! Decoded entries are compared as parsed JSON, not raw strings, to avoid
//! false negatives from field-ordering differences.

use drive115_core::envelope;
use drive115_core::{ApiError, FileEntry};

#[test]
fn envelope_classification_vectors() {
    let raw = include_str!("../../test-vectors/envelope.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let envelope_obj = case["envelope"].as_object().unwrap();
        let expected = case["expected_code"].as_i64().unwrap();
        assert_eq!(envelope::error_code(envelope_obj), expected, "{name}");
    }
}

#[test]
fn entity_decode_vectors() {
    let raw = include_str!("../../test-vectors/entity.json");
    let vectors: serde_json::Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let row = case["row"].as_object().unwrap();

        if let Some(expected_field) = case.get("expected_error") {
            let err = FileEntry::from_row(row).unwrap_err();
            match err {
                ApiError::Decode { field, .. } => {
                    assert_eq!(field, expected_field.as_str().unwrap(), "{name}: field");
                }
                other => panic!("{name}: expected Decode error, got {other:?}"),
            }
        } else {
            let entry = FileEntry::from_row(row).unwrap_or_else(|e| {
                panic!("{name}: decode failed: {e}");
            });
            let got = serde_json::to_value(&entry).unwrap();
            assert_eq!(got, case["expected"], "{name}: decoded entry");
        }
    }
}
