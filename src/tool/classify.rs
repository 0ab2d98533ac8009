use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::tool::{
    error_analysis::{ExtractionError, PrimaryError},
    extract::extract_json_object,
    file_models::{FUNCTION_KEY, RunRecord, ValidationReport, WRAPPER_KEY},
};

/// Per-stage outcomes as seen by the pipeline flow graph. Every flag after
/// `json_ok` is false when the output never parsed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StageFlags {
    pub json_ok: bool,
    pub schema_ok: bool,
    pub no_hallucination: bool,
    pub function_ok: bool,
    pub param_ok: bool,
}

impl StageFlags {
    pub fn from_report(report: &ValidationReport) -> Self {
        let json_ok = report.is_valid_json;
        StageFlags {
            json_ok,
            schema_ok: json_ok && report.is_valid_schema,
            no_hallucination: json_ok && report.checks.no_hallucination,
            function_ok: json_ok && report.checks.function_match,
            param_ok: json_ok && report.checks.param_match,
        }
    }
}

pub type FailurePredicate = fn(&ValidationReport) -> bool;

fn json_invalid(report: &ValidationReport) -> bool {
    !report.is_valid_json
}

fn hallucinated(report: &ValidationReport) -> bool {
    !report.checks.no_hallucination
}

fn function_mismatch(report: &ValidationReport) -> bool {
    !report.checks.function_match
}

fn param_mismatch(report: &ValidationReport) -> bool {
    !report.checks.param_match
}

/// Failure reasons in priority order; the first predicate that holds names the failure.
pub const FAILURE_PRIORITY: [(FailurePredicate, PrimaryError); 4] = [
    (json_invalid, PrimaryError::InvalidJson),
    (hallucinated, PrimaryError::Hallucination),
    (function_mismatch, PrimaryError::WrongTool),
    (param_mismatch, PrimaryError::WrongParam),
];

pub fn primary_error(report: &ValidationReport) -> PrimaryError {
    if report.passed_all {
        return PrimaryError::None;
    }
    FAILURE_PRIORITY
        .iter()
        .find(|(predicate, _)| predicate(report))
        .map(|(_, label)| *label)
        .unwrap_or(PrimaryError::UnknownFail)
}

/// Name of the tool the raw output called, for display next to the expected tool.
pub fn extract_actual_tool(raw_output: &str) -> String {
    match extract_json_object(raw_output) {
        Ok(obj) => obj
            .get(WRAPPER_KEY)
            .and_then(|call| call.get(FUNCTION_KEY))
            .and_then(Value::as_str)
            .unwrap_or("Schema Error")
            .to_string(),
        Err(ExtractionError::NoJsonObject) => "No JSON".to_string(),
        Err(ExtractionError::InvalidJson(_)) => "Crash".to_string(),
    }
}

/// A validated test execution with everything aggregation and flow graphs read.
/// Derived fields are fixed at construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    pub id: String,
    pub run_id: String,
    pub category: String,
    #[serde(rename = "type")]
    pub test_type: String,
    pub rank: String,
    pub latency: f64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    report: ValidationReport,
    actual_tool: String,
    expected_tool: String,
    primary_error: PrimaryError,
    flags: StageFlags,
}

impl ClassifiedRecord {
    /// `expected_tool` comes from the ground truth map, not from the record itself.
    pub fn from_run_record(run_id: &str, record: &RunRecord, expected_tool: &str) -> Self {
        let report = record.errors.clone();
        let primary_error = primary_error(&report);
        if primary_error == PrimaryError::UnknownFail {
            error!(
                run_id,
                id = %record.id,
                "failed record matched no failure reason; verdict and classifier disagree"
            );
        }
        if record.passed != report.passed_all {
            error!(
                run_id,
                id = %record.id,
                passed = record.passed,
                passed_all = report.passed_all,
                "stored pass flag disagrees with its validation report"
            );
        }
        ClassifiedRecord {
            id: record.id.clone(),
            run_id: run_id.to_string(),
            category: record.category.clone(),
            test_type: record.test_type.clone(),
            rank: record.rank.clone(),
            latency: record.perf.latency,
            input_tokens: record.input_metrics.token_count,
            output_tokens: record.output_metrics.token_count,
            total_tokens: record.perf.total_tokens,
            total_cost: record.cost.total_cost,
            flags: StageFlags::from_report(&report),
            actual_tool: extract_actual_tool(&record.raw_output),
            expected_tool: expected_tool.to_string(),
            primary_error,
            report,
        }
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn passed(&self) -> bool {
        self.report.passed_all
    }

    pub fn status(&self) -> &'static str {
        if self.passed() { "PASS" } else { "FAIL" }
    }

    pub fn primary_error(&self) -> PrimaryError {
        self.primary_error
    }

    pub fn flags(&self) -> StageFlags {
        self.flags
    }

    pub fn actual_tool(&self) -> &str {
        &self.actual_tool
    }

    pub fn expected_tool(&self) -> &str {
        &self.expected_tool
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tool::file_models::{PerfMetrics, ValidationChecks};

    pub(crate) fn report(
        json: bool,
        schema: bool,
        no_hallucination: bool,
        function: bool,
        param: bool,
    ) -> ValidationReport {
        ValidationReport {
            passed_all: json && no_hallucination && function && param,
            is_valid_json: json,
            is_valid_schema: schema,
            checks: ValidationChecks {
                function_match: function,
                param_match: param,
                no_hallucination,
                error_code_match: false,
            },
            diagnostics: Default::default(),
        }
    }

    pub(crate) fn record(
        id: &str,
        (category, test_type, rank): (&str, &str, &str),
        errors: ValidationReport,
        latency: f64,
        total_cost: f64,
    ) -> ClassifiedRecord {
        let run_record = RunRecord {
            id: id.to_string(),
            category: category.to_string(),
            test_type: test_type.to_string(),
            rank: rank.to_string(),
            passed: errors.passed_all,
            errors,
            raw_output: String::new(),
            perf: PerfMetrics {
                latency,
                ..PerfMetrics::default()
            },
            input_metrics: Default::default(),
            output_metrics: Default::default(),
            cost: crate::tool::text_metrics::CostBreakdown {
                total_cost,
                ..Default::default()
            },
        };
        ClassifiedRecord::from_run_record("run-a", &run_record, "READ_CONTENT")
    }

    #[test]
    fn priority_list_order_is_json_hallucination_tool_param() {
        let labels: Vec<PrimaryError> = FAILURE_PRIORITY.iter().map(|(_, l)| *l).collect();
        assert_eq!(
            labels,
            vec![
                PrimaryError::InvalidJson,
                PrimaryError::Hallucination,
                PrimaryError::WrongTool,
                PrimaryError::WrongParam,
            ]
        );
    }

    #[test]
    fn each_predicate_fires_only_on_its_own_failure() {
        let all_ok = report(true, true, true, true, true);
        for (predicate, label) in FAILURE_PRIORITY.iter() {
            assert!(!predicate(&all_ok), "{} fired on a passing report", label);
        }
        assert!((FAILURE_PRIORITY[0].0)(&report(false, true, true, true, true)));
        assert!((FAILURE_PRIORITY[1].0)(&report(true, true, false, true, true)));
        assert!((FAILURE_PRIORITY[2].0)(&report(true, true, true, false, true)));
        assert!((FAILURE_PRIORITY[3].0)(&report(true, true, true, true, false)));
    }

    #[test]
    fn passing_report_has_no_primary_error() {
        assert_eq!(primary_error(&report(true, false, true, true, true)), PrimaryError::None);
    }

    #[test]
    fn hallucination_outranks_wrong_tool() {
        assert_eq!(
            primary_error(&report(true, true, false, false, false)),
            PrimaryError::Hallucination
        );
    }

    #[test]
    fn invalid_json_outranks_everything() {
        let mut r = report(false, false, true, false, false);
        r.checks.no_hallucination = false;
        assert_eq!(primary_error(&r), PrimaryError::InvalidJson);
    }

    #[test]
    fn drifted_report_falls_back_to_unknown_fail() {
        let mut r = report(true, true, true, true, true);
        r.passed_all = false;
        assert_eq!(primary_error(&r), PrimaryError::UnknownFail);
        let classified = record("T9", ("c", "t", "Easy"), r, 0.0, 0.0);
        assert_eq!(classified.primary_error(), PrimaryError::UnknownFail);
        assert!(!classified.passed());
    }

    #[test]
    fn flags_are_masked_when_json_failed() {
        let r = report(false, true, true, true, true);
        assert_eq!(StageFlags::from_report(&r), StageFlags::default());
    }

    #[test]
    fn actual_tool_labels_cover_every_extraction_outcome() {
        assert_eq!(
            extract_actual_tool(r#"ok {"systemCall": {"Function used": "LIST_FILEPATH"}}"#),
            "LIST_FILEPATH"
        );
        assert_eq!(extract_actual_tool(r#"{"Function used": "LIST_FILEPATH"}"#), "Schema Error");
        assert_eq!(extract_actual_tool("plain text"), "No JSON");
        assert_eq!(extract_actual_tool("{broken"), "No JSON");
        assert_eq!(extract_actual_tool("{broken}"), "Crash");
        assert_eq!(extract_actual_tool("{\"a\": 1} then {\"b\": 2}"), "Crash");
    }

    proptest! {
        #[test]
        fn primary_error_is_none_exactly_when_passed(
            json in any::<bool>(),
            schema in any::<bool>(),
            no_hallucination in any::<bool>(),
            function in any::<bool>(),
            param in any::<bool>(),
        ) {
            let r = report(json, schema, no_hallucination, function, param);
            let label = primary_error(&r);
            prop_assert_eq!(label == PrimaryError::None, r.passed_all);
            if !r.passed_all {
                prop_assert_ne!(label, PrimaryError::UnknownFail);
            }
            let flags = StageFlags::from_report(&r);
            if !flags.json_ok {
                prop_assert!(!flags.schema_ok && !flags.no_hallucination);
                prop_assert!(!flags.function_ok && !flags.param_ok);
            }
        }
    }
}
