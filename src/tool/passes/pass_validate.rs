use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::{
    config::SuiteConfig,
    tool::{
        evaluate::validate,
        file_models::{ExecutionOutcome, IoMetrics, PerfMetrics, RunRecord, TestCase},
        text_metrics::{CostModel, TokenCounter, analyze_text},
    },
};

/// Input, output and total tokens. Provider counts win when it reported output
/// tokens; otherwise both sides are counted locally and the total is their sum.
fn token_counts(outcome: &ExecutionOutcome, token_counter: &dyn TokenCounter) -> (u64, u64, u64) {
    match (outcome.input_tokens, outcome.output_tokens) {
        (Some(input), Some(output)) if output > 0 => {
            (input, output, outcome.total_tokens.unwrap_or(input + output))
        }
        _ => {
            let input = token_counter.count_tokens(&outcome.prompt);
            let output = token_counter.count_tokens(&outcome.raw_output);
            (input, output, input + output)
        }
    }
}

pub fn build_run_record(
    test_case: &TestCase,
    outcome: &ExecutionOutcome,
    config: &SuiteConfig,
    token_counter: &dyn TokenCounter,
) -> RunRecord {
    let report = validate(&test_case.expected_json, &outcome.raw_output);
    let (input_tokens, output_tokens, total_tokens) = token_counts(outcome, token_counter);
    let cost = config.token_rates.cost(input_tokens, output_tokens);
    let latency = (outcome.latency * 10_000.0).round() / 10_000.0;

    if report.passed_all {
        info!(id = %test_case.id, latency, output_tokens, "PASS");
    } else {
        warn!(
            id = %test_case.id,
            latency,
            output_tokens,
            errors = ?report.diagnostics,
            "FAIL"
        );
    }

    let defaults = &config.defaults;
    RunRecord {
        id: test_case.id.clone(),
        category: test_case
            .category
            .clone()
            .unwrap_or_else(|| defaults.category.clone()),
        test_type: test_case
            .test_type
            .clone()
            .unwrap_or_else(|| defaults.test_type.clone()),
        rank: test_case
            .rank
            .clone()
            .unwrap_or_else(|| defaults.rank.clone()),
        passed: report.passed_all,
        errors: report,
        raw_output: outcome.raw_output.clone(),
        perf: PerfMetrics {
            latency,
            total_time_elapsed: latency,
            total_tokens,
        },
        input_metrics: IoMetrics {
            text: analyze_text(&outcome.prompt),
            token_count: input_tokens,
        },
        output_metrics: IoMetrics {
            text: analyze_text(&outcome.raw_output),
            token_count: output_tokens,
        },
        cost,
    }
}

/// Validates every test case that has an execution outcome, in fixture order.
/// Test cases the harness gave up on have no outcome and produce no record.
pub fn pass_validate(
    test_cases: &[TestCase],
    outcomes: &[ExecutionOutcome],
    config: &SuiteConfig,
    token_counter: &dyn TokenCounter,
) -> Vec<RunRecord> {
    let mut outcomes_by_id: HashMap<&str, &ExecutionOutcome> = HashMap::new();
    for outcome in outcomes {
        if outcomes_by_id.insert(outcome.id.as_str(), outcome).is_some() {
            warn!(id = %outcome.id, "duplicate execution outcome; keeping the last one");
        }
    }
    let known_ids: HashSet<&str> = test_cases.iter().map(|c| c.id.as_str()).collect();
    for outcome in outcomes {
        if !known_ids.contains(outcome.id.as_str()) {
            warn!(id = %outcome.id, "execution outcome has no matching test case");
        }
    }

    let mut records = Vec::with_capacity(test_cases.len());
    let mut skipped = 0;
    for test_case in test_cases {
        let Some(outcome) = outcomes_by_id.get(test_case.id.as_str()) else {
            debug!(id = %test_case.id, "no execution outcome, skipping");
            skipped += 1;
            continue;
        };
        records.push(build_run_record(test_case, outcome, config, token_counter));
    }
    info!(
        model = %config.model_name,
        validated = records.len(),
        skipped,
        "validation pass completed"
    );
    records
}
