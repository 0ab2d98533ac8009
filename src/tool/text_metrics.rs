use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextMetrics {
    pub char_count: usize,
    pub char_count_no_space: usize,
    pub word_count: usize,
    /// Share of characters that are neither alphanumeric nor whitespace, in percent, two decimals.
    pub special_char_percent: f64,
}

pub fn analyze_text(text: &str) -> TextMetrics {
    if text.is_empty() {
        return TextMetrics::default();
    }
    let char_count = text.chars().count();
    let char_count_no_space = text.chars().filter(|c| !c.is_whitespace()).count();
    let word_count = text.split_whitespace().count();
    let special_chars = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    let special_char_percent = special_chars as f64 / char_count as f64 * 100.0;
    TextMetrics {
        char_count,
        char_count_no_space,
        word_count,
        special_char_percent: (special_char_percent * 100.0).round() / 100.0,
    }
}

/// Counts tokens for prompt and output text when the provider did not report them.
/// Constructed once by the caller and passed down by reference.
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> u64;
}

/// Rough estimate of four characters per token.
#[derive(Clone, Copy, Debug, Default)]
pub struct CharRatioTokenCounter;

impl TokenCounter for CharRatioTokenCounter {
    fn count_tokens(&self, text: &str) -> u64 {
        (text.chars().count() / 4) as u64
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostBreakdown {
    pub currency: String,
    pub inference_cost: f64,
    pub output_cost: f64,
    pub total_cost: f64,
}

impl Default for CostBreakdown {
    fn default() -> Self {
        CostBreakdown {
            currency: "USD".to_string(),
            inference_cost: 0.0,
            output_cost: 0.0,
            total_cost: 0.0,
        }
    }
}

pub trait CostModel {
    fn cost(&self, input_tokens: u64, output_tokens: u64) -> CostBreakdown;
}

/// USD per one million tokens. The default is the free tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenRates {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl CostModel for TokenRates {
    fn cost(&self, input_tokens: u64, output_tokens: u64) -> CostBreakdown {
        let inference_cost = input_tokens as f64 / 1_000_000.0 * self.input_per_million;
        let output_cost = output_tokens as f64 / 1_000_000.0 * self.output_per_million;
        CostBreakdown {
            inference_cost,
            output_cost,
            total_cost: inference_cost + output_cost,
            ..CostBreakdown::default()
        }
    }
}
