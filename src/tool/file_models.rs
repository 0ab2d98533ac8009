use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    config::ToolName,
    tool::{
        error_analysis::{FixtureError, ValidationStage},
        text_metrics::{CostBreakdown, TextMetrics},
    },
};

pub const WRAPPER_KEY: &str = "systemCall";
pub const FUNCTION_KEY: &str = "Function used";
pub const PARAMETER_KEY: &str = "With parameter";
pub const ERROR_ID_KEY: &str = "error_id";
pub const ERROR_ID_ALIAS_KEY: &str = "Output";

/// What a test case expects the model to emit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExpectedCallRepr", into = "ExpectedCallRepr")]
pub enum ExpectedCall {
    Standard { function: ToolName, parameter: String },
    ErrorExpectation { error_id: String },
}

impl ExpectedCall {
    /// Label used for the expected side of the confusion matrix.
    pub fn tool_label(&self) -> String {
        match self {
            ExpectedCall::Standard { function, .. } => function.to_string(),
            ExpectedCall::ErrorExpectation { .. } => "ErrorExpected".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SystemCallRepr {
    #[serde(rename = "Function used", default, skip_serializing_if = "Option::is_none")]
    function: Option<String>,
    #[serde(rename = "With parameter", default, skip_serializing_if = "Option::is_none")]
    parameter: Option<String>,
}

/// Fixture shapes: `{"error_id": ..}`, `{"systemCall": {..}}` or the bare inner object.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ExpectedCallRepr {
    Error {
        error_id: String,
    },
    Wrapped {
        #[serde(rename = "systemCall")]
        system_call: SystemCallRepr,
    },
    Bare(SystemCallRepr),
}

impl TryFrom<ExpectedCallRepr> for ExpectedCall {
    type Error = FixtureError;

    fn try_from(repr: ExpectedCallRepr) -> Result<Self, Self::Error> {
        let system_call = match repr {
            ExpectedCallRepr::Error { error_id } => {
                return Ok(ExpectedCall::ErrorExpectation { error_id });
            }
            ExpectedCallRepr::Wrapped { system_call } => system_call,
            ExpectedCallRepr::Bare(system_call) => system_call,
        };
        let name = system_call.function.ok_or(FixtureError::MissingFunction)?;
        let function = ToolName::from_name(&name).ok_or(FixtureError::UnknownTool(name))?;
        Ok(ExpectedCall::Standard {
            function,
            parameter: system_call.parameter.unwrap_or_default(),
        })
    }
}

impl From<ExpectedCall> for ExpectedCallRepr {
    fn from(call: ExpectedCall) -> Self {
        match call {
            ExpectedCall::Standard {
                function,
                parameter,
            } => ExpectedCallRepr::Wrapped {
                system_call: SystemCallRepr {
                    function: Some(function.to_string()),
                    parameter: Some(parameter),
                },
            },
            ExpectedCall::ErrorExpectation { error_id } => ExpectedCallRepr::Error { error_id },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(rename = "type", default)]
    pub test_type: Option<String>,
    #[serde(default)]
    pub rank: Option<String>,
    pub expected_json: ExpectedCall,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationChecks {
    pub function_match: bool,
    pub param_match: bool,
    pub no_hallucination: bool,
    pub error_code_match: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed_all: bool,
    pub is_valid_json: bool,
    pub is_valid_schema: bool,
    pub checks: ValidationChecks,
    #[serde(rename = "diff_log", default)]
    pub diagnostics: IndexMap<ValidationStage, String>,
}

impl Default for ValidationReport {
    /// Nothing attempted yet. Hallucination starts clear: it is only ever set by
    /// observing an invented tool name.
    fn default() -> Self {
        ValidationReport {
            passed_all: false,
            is_valid_json: false,
            is_valid_schema: false,
            checks: ValidationChecks {
                no_hallucination: true,
                ..ValidationChecks::default()
            },
            diagnostics: IndexMap::new(),
        }
    }
}

/// What the execution harness hands over for one test once its own retry policy is done.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub id: String,
    pub raw_output: String,
    #[serde(default)]
    pub prompt: String,
    /// Seconds.
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    /// Provider total, which may include tokens beyond prompt and output.
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerfMetrics {
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub total_time_elapsed: f64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IoMetrics {
    #[serde(flatten)]
    pub text: TextMetrics,
    #[serde(default)]
    pub token_count: u64,
}

/// One persisted test execution, as written to the deep-dive results file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: String,
    #[serde(default = "unknown_label")]
    pub category: String,
    #[serde(rename = "type", default = "not_applicable_label")]
    pub test_type: String,
    #[serde(default = "not_applicable_label")]
    pub rank: String,
    pub passed: bool,
    pub errors: ValidationReport,
    #[serde(default)]
    pub raw_output: String,
    #[serde(default)]
    pub perf: PerfMetrics,
    #[serde(default)]
    pub input_metrics: IoMetrics,
    #[serde(default)]
    pub output_metrics: IoMetrics,
    #[serde(default)]
    pub cost: CostBreakdown,
}

fn unknown_label() -> String {
    "Unknown".to_string()
}

fn not_applicable_label() -> String {
    "N/A".to_string()
}
