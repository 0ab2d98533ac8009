use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use crate::tool::text_metrics::TokenRates;

/// The closed set of functions a model may call. Anything else it names is invented.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter,
)]
pub enum ToolName {
    #[strum(serialize = "LIST_FILEPATH")]
    #[serde(rename = "LIST_FILEPATH")]
    ListFilepath,
    #[strum(serialize = "CREATE_FILEPATH")]
    #[serde(rename = "CREATE_FILEPATH")]
    CreateFilepath,
    #[strum(serialize = "DELETE_FILEPATH")]
    #[serde(rename = "DELETE_FILEPATH")]
    DeleteFilepath,
    #[strum(serialize = "READ_CONTENT")]
    #[serde(rename = "READ_CONTENT")]
    ReadContent,
}

impl ToolName {
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, EnumIter)]
pub enum Rank {
    Easy,
    Medium,
    Hard,
}

/* ---------------------------------------------------------------------------------------------------- */
/* Suite Configuration                                                                                  */
/* ---------------------------------------------------------------------------------------------------- */

pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash";
pub const MODEL_NAME_ENV: &str = "GEMINI_MODEL";

/// Labels used when a test case leaves a grouping field out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDefaults {
    pub category: String,
    pub test_type: String,
    pub rank: String,
}

impl Default for RecordDefaults {
    fn default() -> Self {
        RecordDefaults {
            category: "Uncategorized".to_string(),
            test_type: "General".to_string(),
            rank: Rank::Medium.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SuiteConfig {
    pub model_name: String,
    pub defaults: RecordDefaults,
    pub token_rates: TokenRates,
}

impl SuiteConfig {
    pub fn new(model_name: impl Into<String>) -> Self {
        SuiteConfig {
            model_name: model_name.into(),
            defaults: RecordDefaults::default(),
            token_rates: TokenRates::default(),
        }
    }

    /// Reads the model name from the environment, loading `.env` first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let model_name =
            std::env::var(MODEL_NAME_ENV).unwrap_or_else(|_| DEFAULT_MODEL_NAME.to_string());
        SuiteConfig::new(model_name)
    }

    pub fn with_token_rates(mut self, token_rates: TokenRates) -> Self {
        self.token_rates = token_rates;
        self
    }
}

impl Default for SuiteConfig {
    fn default() -> Self {
        SuiteConfig::new(DEFAULT_MODEL_NAME)
    }
}
