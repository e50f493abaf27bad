//! Annotation-based check skipping.
//!
//! An object opts out of checks with an annotation whose value is a
//! comma-separated list of check IDs, e.g.
//! `kubescan.io/skip: "KS-101, KS-105"`.

use serde_json::Value as Json;

/// Check IDs listed in the object's skip annotation.
pub fn skipped_checks<'a>(object: &'a Json, annotation: &str) -> Vec<&'a str> {
    object
        .get("metadata")
        .and_then(|m| m.get("annotations"))
        .and_then(|a| a.get(annotation))
        .and_then(Json::as_str)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Whether the object asks to skip `check_id`.
pub fn is_skipped(object: &Json, annotation: &str, check_id: &str) -> bool {
    skipped_checks(object, annotation).contains(&check_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ANNOTATION: &str = "marvin.example/skip";

    fn object(value: &str) -> Json {
        json!({"metadata": {"name": "a", "annotations": {ANNOTATION: value}}})
    }

    #[test]
    fn test_is_skipped() {
        let obj = object("check-a, check-b");
        assert!(is_skipped(&obj, ANNOTATION, "check-a"));
        assert!(is_skipped(&obj, ANNOTATION, "check-b"));
        assert!(!is_skipped(&obj, ANNOTATION, "check-c"));
    }

    #[test]
    fn test_other_annotation_ignored() {
        let obj = object("check-a");
        assert!(!is_skipped(&obj, "kubescan.io/skip", "check-a"));
    }

    #[test]
    fn test_no_annotations() {
        let obj = json!({"metadata": {"name": "a"}});
        assert!(skipped_checks(&obj, ANNOTATION).is_empty());
    }

    #[test]
    fn test_empty_entries_dropped() {
        let obj = object(" , check-a,,");
        assert_eq!(skipped_checks(&obj, ANNOTATION), vec!["check-a"]);
    }
}
