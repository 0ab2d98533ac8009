use serde_json::{Map, Value};

use crate::{
    config::ToolName,
    tool::{
        error_analysis::ValidationStage,
        extract::extract_json_object,
        file_models::{
            ERROR_ID_ALIAS_KEY, ERROR_ID_KEY, ExpectedCall, FUNCTION_KEY, PARAMETER_KEY,
            ValidationReport, WRAPPER_KEY,
        },
    },
    utils::normalize_path,
};

/// Runs the check waterfall for one model response. Never fails: every problem
/// ends up as a flag plus a diagnostic in the report.
pub fn validate(expected: &ExpectedCall, raw_output: &str) -> ValidationReport {
    let mut report = ValidationReport::default();

    let actual = match extract_json_object(raw_output) {
        Ok(actual) => actual,
        Err(e) => {
            report
                .diagnostics
                .insert(ValidationStage::Json, format!("Failed to parse JSON: {}", e));
            return report;
        }
    };
    report.is_valid_json = true;

    let (expected_function, expected_parameter) = match expected {
        ExpectedCall::ErrorExpectation { error_id } => {
            check_error_code(&mut report, &actual, error_id);
            return report;
        }
        ExpectedCall::Standard {
            function,
            parameter,
        } => (function, parameter),
    };

    let core = match actual.get(WRAPPER_KEY) {
        Some(Value::Object(inner)) => {
            report.is_valid_schema = true;
            inner
        }
        Some(_) => {
            report.diagnostics.insert(
                ValidationStage::Schema,
                format!("'{}' is not an object", WRAPPER_KEY),
            );
            &actual
        }
        None => {
            report
                .diagnostics
                .insert(ValidationStage::Schema, format!("Missing '{}' key", WRAPPER_KEY));
            &actual
        }
    };

    let actual_function = core.get(FUNCTION_KEY).and_then(Value::as_str);
    let actual_parameter = core.get(PARAMETER_KEY);

    if actual_function.and_then(ToolName::from_name).is_none() {
        report.checks.no_hallucination = false;
        report.diagnostics.insert(
            ValidationStage::Hallucination,
            format!("Invented tool: {}", describe(core.get(FUNCTION_KEY))),
        );
    }

    if actual_function == Some(expected_function.to_string().as_str()) {
        report.checks.function_match = true;
    } else {
        report.diagnostics.insert(
            ValidationStage::Function,
            format!(
                "Expected {}, got {}",
                expected_function,
                describe(core.get(FUNCTION_KEY))
            ),
        );
    }

    if normalize_path(&parameter_text(actual_parameter)) == normalize_path(expected_parameter) {
        report.checks.param_match = true;
    } else {
        report.diagnostics.insert(
            ValidationStage::Param,
            format!(
                "Expected {}, got {}",
                expected_parameter,
                describe(actual_parameter)
            ),
        );
    }

    report.passed_all = report.is_valid_json
        && report.checks.no_hallucination
        && report.checks.function_match
        && report.checks.param_match;
    report
}

fn check_error_code(report: &mut ValidationReport, actual: &Map<String, Value>, expected_id: &str) {
    let actual_error = [ERROR_ID_KEY, ERROR_ID_ALIAS_KEY]
        .iter()
        .filter_map(|key| actual.get(*key))
        .find(|value| is_present(value));
    if actual_error.and_then(Value::as_str) == Some(expected_id) {
        report.checks.error_code_match = true;
        report.passed_all = true;
    } else {
        report.diagnostics.insert(
            ValidationStage::Error,
            format!("Expected {}, got {}", expected_id, describe(actual_error)),
        );
    }
}

/// Absent, null, false, zero and empty values fall through to the alias field.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Missing and null parameters compare as empty; other scalars by their JSON text.
fn parameter_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn describe(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "None".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn standard(function: ToolName, parameter: &str) -> ExpectedCall {
        ExpectedCall::Standard {
            function,
            parameter: parameter.to_string(),
        }
    }

    fn system_call(function: &str, parameter: &str) -> String {
        serde_json::json!({"systemCall": {"Function used": function, "With parameter": parameter}})
            .to_string()
    }

    #[test]
    fn chatty_output_with_backslash_path_passes() {
        let raw = "Sure! {\"systemCall\":{\"Function used\":\"READ_CONTENT\",\"With parameter\":\"docs\\\\a.txt\"}} thanks";
        let report = validate(&standard(ToolName::ReadContent, "docs/a.txt"), raw);
        assert!(report.is_valid_json);
        assert!(report.is_valid_schema);
        assert!(report.checks.no_hallucination);
        assert!(report.checks.function_match);
        assert!(report.checks.param_match);
        assert!(report.passed_all);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn parameter_comparison_ignores_separator_style() {
        let raw = system_call("LIST_FILEPATH", "a/b/c");
        let report = validate(&standard(ToolName::ListFilepath, "a\\b\\c"), &raw);
        assert!(report.checks.param_match);
        assert!(report.passed_all);
    }

    #[test]
    fn unparseable_output_short_circuits() {
        let report = validate(&standard(ToolName::ReadContent, "a.txt"), "not json");
        assert!(!report.is_valid_json);
        assert!(!report.passed_all);
        assert!(!report.is_valid_schema);
        assert!(!report.checks.function_match);
        assert!(!report.checks.param_match);
        assert!(!report.checks.error_code_match);
        assert_eq!(
            report.diagnostics.keys().copied().collect::<Vec<_>>(),
            vec![ValidationStage::Json]
        );
    }

    #[test]
    fn invented_tool_is_flagged_as_hallucination() {
        let raw = system_call("FORMAT_DISK", "/");
        let report = validate(&standard(ToolName::DeleteFilepath, "/"), &raw);
        assert!(!report.checks.no_hallucination);
        assert!(!report.checks.function_match);
        assert!(!report.passed_all);
        assert_eq!(
            report.diagnostics.get(&ValidationStage::Hallucination).map(String::as_str),
            Some("Invented tool: FORMAT_DISK")
        );
    }

    #[test]
    fn missing_wrapper_degrades_but_keeps_validating() {
        let raw = r#"{"Function used": "CREATE_FILEPATH", "With parameter": "notes/todo.md"}"#;
        let report = validate(&standard(ToolName::CreateFilepath, "notes/todo.md"), raw);
        assert!(!report.is_valid_schema);
        assert!(report.passed_all);
        assert_eq!(
            report.diagnostics.get(&ValidationStage::Schema).map(String::as_str),
            Some("Missing 'systemCall' key")
        );
    }

    #[test]
    fn diagnostics_accumulate_across_semantic_stages() {
        let raw = system_call("LIST_FILEPATH", "elsewhere");
        let report = validate(&standard(ToolName::ReadContent, "docs/a.txt"), &raw);
        assert!(report.checks.no_hallucination);
        assert!(!report.checks.function_match);
        assert!(!report.checks.param_match);
        assert_eq!(
            report.diagnostics.keys().copied().collect::<Vec<_>>(),
            vec![ValidationStage::Function, ValidationStage::Param]
        );
    }

    #[test]
    fn missing_parameter_matches_empty_expectation() {
        let raw = r#"{"systemCall": {"Function used": "LIST_FILEPATH", "With parameter": null}}"#;
        let report = validate(&standard(ToolName::ListFilepath, ""), raw);
        assert!(report.checks.param_match);
        assert!(report.passed_all);
    }

    #[test]
    fn error_expectation_compares_error_ids_only() {
        let expected = ExpectedCall::ErrorExpectation {
            error_id: "E_NOT_FOUND".to_string(),
        };
        let report = validate(&expected, r#"{"error_id":"E_NOT_FOUND"}"#);
        assert!(report.checks.error_code_match);
        assert!(report.passed_all);
        assert!(!report.is_valid_schema);
        assert!(!report.checks.function_match);
        assert!(!report.checks.param_match);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn error_expectation_falls_back_to_output_alias() {
        let expected = ExpectedCall::ErrorExpectation {
            error_id: "E_DENIED".to_string(),
        };
        let report = validate(&expected, r#"{"error_id": "", "Output": "E_DENIED"}"#);
        assert!(report.passed_all);
    }

    #[test]
    fn error_expectation_mismatch_reports_actual_code() {
        let expected = ExpectedCall::ErrorExpectation {
            error_id: "E_NOT_FOUND".to_string(),
        };
        let report = validate(&expected, &system_call("READ_CONTENT", "a.txt"));
        assert!(!report.passed_all);
        assert!(!report.checks.error_code_match);
        assert_eq!(
            report.diagnostics.get(&ValidationStage::Error).map(String::as_str),
            Some("Expected E_NOT_FOUND, got None")
        );
    }

    fn arb_tool() -> impl Strategy<Value = ToolName> {
        prop_oneof![
            Just(ToolName::ListFilepath),
            Just(ToolName::CreateFilepath),
            Just(ToolName::DeleteFilepath),
            Just(ToolName::ReadContent),
        ]
    }

    proptest! {
        #[test]
        fn verdict_is_the_conjunction_of_the_four_gates(
            expected_tool in arb_tool(),
            actual_name in prop_oneof![
                "(LIST|CREATE|DELETE)_FILEPATH",
                Just("READ_CONTENT".to_string()),
                "[A-Z_]{1,12}",
            ],
            expected_param in "[a-z]{1,4}([/\\\\][a-z]{1,4}){0,2}",
            actual_param in "[a-z]{1,4}([/\\\\][a-z]{1,4}){0,2}",
            wrapped in any::<bool>(),
            noise in "[a-zA-Z !?.]{0,12}",
        ) {
            let inner = serde_json::json!({"Function used": actual_name, "With parameter": actual_param});
            let payload = if wrapped { serde_json::json!({"systemCall": inner}) } else { inner };
            let raw = format!("{}{}{}", noise, payload, noise);
            let report = validate(&standard(expected_tool, &expected_param), &raw);
            prop_assert!(report.is_valid_json);
            prop_assert_eq!(report.is_valid_schema, wrapped);
            prop_assert_eq!(
                report.passed_all,
                report.is_valid_json
                    && report.checks.no_hallucination
                    && report.checks.function_match
                    && report.checks.param_match
            );
        }

        #[test]
        fn text_without_braces_never_validates(raw in "[^{}]{0,40}", tool in arb_tool()) {
            let report = validate(&standard(tool, "x"), &raw);
            prop_assert!(!report.is_valid_json);
            prop_assert!(!report.passed_all);
        }
    }
}
