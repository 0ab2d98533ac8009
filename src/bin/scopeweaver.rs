use std::{
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use scopeweaver_lab::{
    config::SuiteConfig,
    tool::{
        classify::ClassifiedRecord,
        file_models::{ExecutionOutcome, RunRecord},
        flow_graph::{FlowGraph, hierarchical_graph, pipeline_graph},
        ground_truth::{GroundTruth, load_test_cases},
        passes::{
            pass_statistics::{GroupField, pass_statistics},
            pass_validate::pass_validate,
        },
        text_metrics::{CharRatioTokenCounter, TokenRates},
    },
    utils::{load_json_file, load_json_lines, run_id_of, write_json_pretty},
};

/// Validate tool-calling outputs and report on them.
#[derive(Parser, Debug)]
#[command(name = "scopeweaver", version, about, long_about = None)]
struct Cli {
    /// Fixture with test cases and their expected calls
    #[arg(long, global = true, default_value = "tests/v1_test_cases.json")]
    test_cases: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate execution outcomes (JSON lines) and write the run's results file
    Validate {
        #[arg(long)]
        executions: PathBuf,
        #[arg(long, default_value = "results_deep_dive.json")]
        out: PathBuf,
        /// Model name recorded in logs (defaults to $GEMINI_MODEL)
        #[arg(long)]
        model: Option<String>,
        /// USD per one million input tokens
        #[arg(long, default_value_t = 0.0)]
        input_rate: f64,
        /// USD per one million output tokens
        #[arg(long, default_value_t = 0.0)]
        output_rate: f64,
    },
    /// Aggregate one or more results files; each file's folder names its run
    Report {
        #[arg(required = true)]
        results: Vec<PathBuf>,
        /// Run whose hierarchical flow graph is exported (defaults to the last one)
        #[arg(long)]
        focus_run: Option<String>,
        #[arg(long)]
        stats_out: Option<PathBuf>,
        #[arg(long)]
        graphs_out: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct GraphsFile {
    pipeline: IndexMap<String, FlowGraph>,
    focus_run: String,
    hierarchical: FlowGraph,
}

/// One run id per results file, each distinct.
fn run_ids_for(results: &[PathBuf]) -> Result<Vec<String>> {
    let mut run_ids: Vec<String> = Vec::with_capacity(results.len());
    for path in results {
        let run_id = run_id_of(path)
            .with_context(|| format!("results path `{}` names no run", path.display()))?;
        if run_ids.contains(&run_id) {
            bail!(
                "results path `{}` resolves to run `{}`, which is already loaded",
                path.display(),
                run_id
            );
        }
        run_ids.push(run_id);
    }
    Ok(run_ids)
}

fn validate(
    cli_test_cases: &Path,
    executions: &Path,
    out: &Path,
    model: Option<String>,
    token_rates: TokenRates,
) -> Result<()> {
    let mut config = SuiteConfig::from_env().with_token_rates(token_rates);
    if let Some(model) = model {
        config.model_name = model;
    }
    info!(model = %config.model_name, "validating execution outcomes");
    let test_cases = load_test_cases(cli_test_cases)?;
    let outcomes: Vec<ExecutionOutcome> = load_json_lines(executions)?;
    let records = pass_validate(&test_cases, &outcomes, &config, &CharRatioTokenCounter);
    write_json_pretty(out, &records)?;
    info!(path = %out.display(), count = records.len(), "wrote results");
    Ok(())
}

fn report(
    cli_test_cases: &Path,
    results: &[PathBuf],
    focus_run: Option<String>,
    stats_out: Option<PathBuf>,
    graphs_out: Option<PathBuf>,
) -> Result<()> {
    let ground_truth = GroundTruth::from_test_cases(&load_test_cases(cli_test_cases)?);
    let run_ids = run_ids_for(results)?;
    let mut records: Vec<ClassifiedRecord> = Vec::new();
    for (path, run_id) in results.iter().zip(&run_ids) {
        let run_records: Vec<RunRecord> = load_json_file(path)?;
        info!(run_id = %run_id, count = run_records.len(), "loaded run");
        records.extend(run_records.iter().map(|record| {
            ClassifiedRecord::from_run_record(run_id, record, ground_truth.expected_tool(&record.id))
        }));
    }

    let statistics = pass_statistics(&records);
    for run in &statistics.runs {
        println!(
            "{}: {}/{} passed ({:.1}%), {} failed, avg latency {:.2}s, cost ${:.6}",
            run.key_value(GroupField::RunId).unwrap_or_default(),
            run.passed,
            run.count,
            run.pass_rate * 100.0,
            run.failed(),
            run.avg_latency,
            run.total_cost
        );
    }
    println!("{}", statistics.hierarchy);

    if let Some(stats_out) = stats_out {
        write_json_pretty(&stats_out, &statistics)?;
        info!(path = %stats_out.display(), "wrote statistics");
    }

    if let Some(graphs_out) = graphs_out {
        let focus_run = match focus_run {
            Some(run) if run_ids.contains(&run) => run,
            Some(run) => bail!("focus run `{}` is not among the loaded runs", run),
            None => run_ids.last().cloned().unwrap_or_default(),
        };
        let pipeline = run_ids
            .iter()
            .map(|run_id| {
                let graph = pipeline_graph(records.iter().filter(|r| &r.run_id == run_id));
                (run_id.clone(), graph)
            })
            .collect();
        let hierarchical = hierarchical_graph(records.iter().filter(|r| r.run_id == focus_run));
        let graphs = GraphsFile {
            pipeline,
            focus_run,
            hierarchical,
        };
        write_json_pretty(&graphs_out, &graphs)?;
        info!(path = %graphs_out.display(), "wrote flow graphs");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate {
            executions,
            out,
            model,
            input_rate,
            output_rate,
        } => validate(
            &cli.test_cases,
            &executions,
            &out,
            model,
            TokenRates {
                input_per_million: input_rate,
                output_per_million: output_rate,
            },
        ),
        Command::Report {
            results,
            focus_run,
            stats_out,
            graphs_out,
        } => report(&cli.test_cases, &results, focus_run, stats_out, graphs_out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_separate_folders_keep_separate_ids() {
        let results = vec![
            PathBuf::from("run_a/results_deep_dive.json"),
            PathBuf::from("run_b/results_deep_dive.json"),
        ];
        assert_eq!(run_ids_for(&results).unwrap(), vec!["run_a", "run_b"]);
    }

    #[test]
    fn colliding_run_ids_are_rejected() {
        let results = vec![
            PathBuf::from("results_deep_dive.json"),
            PathBuf::from("results_deep_dive.json"),
        ];
        let err = run_ids_for(&results).unwrap_err();
        assert!(err.to_string().contains("already loaded"));
    }
}
