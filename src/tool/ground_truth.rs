use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    tool::{error_analysis::LoadError, file_models::TestCase},
    utils::load_json_file,
};

pub const UNKNOWN_EXPECTED_TOOL: &str = "Unknown";

/// Parses a fixture array. Entries without an `id` are skipped silently; entries
/// whose expectation cannot be read are skipped with a warning.
pub fn parse_test_cases(entries: Vec<Value>) -> Vec<TestCase> {
    let mut test_cases = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.get("id").is_none() {
            continue;
        }
        match serde_json::from_value::<TestCase>(entry) {
            Ok(test_case) => test_cases.push(test_case),
            Err(e) => warn!(error = %e, "skipping unreadable test case"),
        }
    }
    test_cases
}

pub fn load_test_cases(path: impl AsRef<Path>) -> Result<Vec<TestCase>, LoadError> {
    let path = path.as_ref();
    let entries: Vec<Value> = load_json_file(path)?;
    let test_cases = parse_test_cases(entries);
    info!(path = %path.display(), count = test_cases.len(), "loaded test cases");
    Ok(test_cases)
}

/// Test id to the expected tool label shown in reports.
#[derive(Clone, Debug, Default)]
pub struct GroundTruth(pub IndexMap<String, String>);

impl GroundTruth {
    pub fn from_test_cases(test_cases: &[TestCase]) -> Self {
        GroundTruth(
            test_cases
                .iter()
                .map(|case| (case.id.clone(), case.expected_json.tool_label()))
                .collect(),
        )
    }

    pub fn expected_tool(&self, id: &str) -> &str {
        self.0
            .get(id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_EXPECTED_TOOL)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn entries_without_id_or_readable_expectation_are_skipped() {
        let cases = parse_test_cases(vec![
            json!({"comment": "section header"}),
            json!({"id": "T1", "input": "read a", "expected_json": {"systemCall": {"Function used": "READ_CONTENT", "With parameter": "a"}}}),
            json!({"id": "T2", "expected_json": {"systemCall": {"Function used": "FORMAT_DISK"}}}),
            json!({"id": "T3", "category": "Errors", "expected_json": {"error_id": "E_NOT_FOUND"}}),
        ]);
        let ids: Vec<&str> = cases.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T3"]);
        assert_eq!(cases[1].category.as_deref(), Some("Errors"));
    }

    #[test]
    fn ground_truth_labels_error_expectations_and_unknown_ids() {
        let cases = parse_test_cases(vec![
            json!({"id": "T1", "expected_json": {"systemCall": {"Function used": "LIST_FILEPATH"}}}),
            json!({"id": "T2", "expected_json": {"error_id": "E_NOT_FOUND"}}),
        ]);
        let truth = GroundTruth::from_test_cases(&cases);
        assert_eq!(truth.expected_tool("T1"), "LIST_FILEPATH");
        assert_eq!(truth.expected_tool("T2"), "ErrorExpected");
        assert_eq!(truth.expected_tool("T404"), "Unknown");
    }

    #[test]
    fn loads_fixture_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.json");
        std::fs::write(
            &path,
            r#"[{"id": "T1", "expected_json": {"Function used": "DELETE_FILEPATH", "With parameter": "old.log"}}]"#,
        )
        .unwrap();
        let cases = load_test_cases(&path).unwrap();
        assert_eq!(cases.len(), 1);
        assert!(load_test_cases(dir.path().join("missing.json")).is_err());
    }
}
