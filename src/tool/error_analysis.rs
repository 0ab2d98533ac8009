use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};
use thiserror::Error;

/// The single failure reason a record is reported under.
/// The serialized names are the labels the dashboard filters on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Display, EnumIter, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimaryError {
    #[serde(rename = "None")]
    #[strum(serialize = "None")]
    None,
    #[serde(rename = "Invalid JSON")]
    #[strum(serialize = "Invalid JSON")]
    InvalidJson,
    #[serde(rename = "Hallucination")]
    #[strum(serialize = "Hallucination")]
    Hallucination,
    #[serde(rename = "Wrong Tool")]
    #[strum(serialize = "Wrong Tool")]
    WrongTool,
    #[serde(rename = "Wrong Param")]
    #[strum(serialize = "Wrong Param")]
    WrongParam,
    #[serde(rename = "Unknown Fail")]
    #[strum(serialize = "Unknown Fail")]
    UnknownFail,
}

/// Keys of the diagnostics map, one per validation stage.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValidationStage {
    Json,
    Error,
    Schema,
    Hallucination,
    Function,
    Param,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("no JSON object delimiters found in output")]
    NoJsonObject,
    #[error("failed to parse JSON: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FixtureError {
    #[error("expected call names unknown tool `{0}`")]
    UnknownTool(String),
    #[error("expected call has neither `error_id` nor a `Function used` entry")]
    MissingFunction,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse `{path}`: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("failed to parse line {line} of `{path}`: {source}")]
    JsonLine {
        path: String,
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}
