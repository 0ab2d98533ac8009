use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use indexmap::IndexMap;
use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::Display;

use crate::{
    config::Rank,
    tool::{classify::ClassifiedRecord, error_analysis::PrimaryError},
};

/// Record fields statistics can be grouped by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GroupField {
    Category,
    Type,
    Rank,
    RunId,
    Status,
    PrimaryError,
    ExpectedTool,
    ActualTool,
}

impl GroupField {
    pub fn value_of(self, record: &ClassifiedRecord) -> String {
        match self {
            GroupField::Category => record.category.clone(),
            GroupField::Type => record.test_type.clone(),
            GroupField::Rank => record.rank.clone(),
            GroupField::RunId => record.run_id.clone(),
            GroupField::Status => record.status().to_string(),
            GroupField::PrimaryError => record.primary_error().to_string(),
            GroupField::ExpectedTool => record.expected_tool().to_string(),
            GroupField::ActualTool => record.actual_tool().to_string(),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GroupStats {
    pub key: IndexMap<GroupField, String>,
    pub count: usize,
    pub passed: usize,
    pub pass_rate: f64,
    /// Mean latency in seconds.
    pub avg_latency: f64,
    pub total_cost: f64,
    /// Among failed records, the share that never produced valid JSON.
    pub json_fail_rate: f64,
    /// Among failed records, the share with valid JSON but the wrong function.
    pub logic_fail_rate: f64,
    pub error_counts: IndexMap<PrimaryError, usize>,
}

impl GroupStats {
    fn from_records(key: IndexMap<GroupField, String>, records: &[&ClassifiedRecord]) -> Self {
        let count = records.len();
        let passed = records.iter().filter(|r| r.passed()).count();
        let failed: Vec<&&ClassifiedRecord> = records.iter().filter(|r| !r.passed()).collect();
        let json_failures = failed.iter().filter(|r| !r.report().is_valid_json).count();
        let logic_failures = failed
            .iter()
            .filter(|r| r.report().is_valid_json && !r.report().checks.function_match)
            .count();
        let error_counts = PrimaryError::iter()
            .filter(|kind| *kind != PrimaryError::None)
            .map(|kind| {
                let n = failed.iter().filter(|r| r.primary_error() == kind).count();
                (kind, n)
            })
            .collect();
        GroupStats {
            key,
            count,
            passed,
            pass_rate: ratio(passed, count),
            avg_latency: if count == 0 {
                0.0
            } else {
                records.iter().map(|r| r.latency).sum::<f64>() / count as f64
            },
            total_cost: records.iter().map(|r| r.total_cost).sum(),
            json_fail_rate: ratio(json_failures, failed.len()),
            logic_fail_rate: ratio(logic_failures, failed.len()),
            error_counts,
        }
    }

    pub fn failed(&self) -> usize {
        self.count - self.passed
    }

    pub fn key_value(&self, field: GroupField) -> Option<&str> {
        self.key.get(&field).map(String::as_str)
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// One entry per distinct combination of `group_by` values, in lexicographic key order.
/// An empty `group_by` yields exactly one global entry, zeroed for empty input.
pub fn aggregate<'a>(
    records: impl IntoIterator<Item = &'a ClassifiedRecord>,
    group_by: &[GroupField],
) -> Vec<GroupStats> {
    let mut groups: BTreeMap<Vec<String>, Vec<&ClassifiedRecord>> = BTreeMap::new();
    for record in records {
        let key = group_by.iter().map(|field| field.value_of(record)).collect();
        groups.entry(key).or_default().push(record);
    }
    if group_by.is_empty() {
        let all = groups.remove(&Vec::<String>::new()).unwrap_or_default();
        return vec![GroupStats::from_records(IndexMap::new(), &all)];
    }
    groups
        .into_iter()
        .map(|(values, members)| {
            let key = group_by.iter().copied().zip(values).collect();
            GroupStats::from_records(key, &members)
        })
        .collect()
}

pub fn summarize<'a>(records: impl IntoIterator<Item = &'a ClassifiedRecord>) -> GroupStats {
    let members: Vec<&ClassifiedRecord> = records.into_iter().collect();
    GroupStats::from_records(IndexMap::new(), &members)
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TypeBreakdown {
    pub stats: GroupStats,
    pub ranks: Vec<GroupStats>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CategoryBreakdown {
    pub stats: GroupStats,
    pub types: Vec<TypeBreakdown>,
}

/// Global, then category, type and rank statistics, each level aggregated over
/// the records of its parent group.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct HierarchicalReport {
    pub global: GroupStats,
    pub categories: Vec<CategoryBreakdown>,
}

fn rank_position(rank: &str) -> usize {
    Rank::iter()
        .position(|known| known.to_string() == rank)
        .unwrap_or(usize::MAX)
}

fn members_of<'a>(
    records: &[&'a ClassifiedRecord],
    field: GroupField,
    value: Option<&str>,
) -> Vec<&'a ClassifiedRecord> {
    records
        .iter()
        .copied()
        .filter(|r| Some(field.value_of(r).as_str()) == value)
        .collect()
}

impl HierarchicalReport {
    pub fn build<'a>(records: impl IntoIterator<Item = &'a ClassifiedRecord>) -> Self {
        let records: Vec<&ClassifiedRecord> = records.into_iter().collect();
        let categories = aggregate(records.iter().copied(), &[GroupField::Category])
            .into_iter()
            .map(|category_stats| {
                let in_category = members_of(
                    &records,
                    GroupField::Category,
                    category_stats.key_value(GroupField::Category),
                );
                let types = aggregate(in_category.iter().copied(), &[GroupField::Type])
                    .into_iter()
                    .map(|type_stats| {
                        let in_type = members_of(
                            &in_category,
                            GroupField::Type,
                            type_stats.key_value(GroupField::Type),
                        );
                        let mut ranks = aggregate(in_type.iter().copied(), &[GroupField::Rank]);
                        ranks.sort_by_key(|r| {
                            rank_position(r.key_value(GroupField::Rank).unwrap_or_default())
                        });
                        TypeBreakdown {
                            stats: type_stats,
                            ranks,
                        }
                    })
                    .collect();
                CategoryBreakdown {
                    stats: category_stats,
                    types,
                }
            })
            .collect();
        HierarchicalReport {
            global: summarize(records.iter().copied()),
            categories,
        }
    }
}

impl fmt::Display for HierarchicalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(40);
        writeln!(f, "{}", rule)?;
        writeln!(f, "=== GLOBAL ACCURACY: {:.1}% ===", self.global.pass_rate * 100.0)?;
        writeln!(f, "{}", rule)?;
        for category in &self.categories {
            writeln!(
                f,
                "\n--- Category: {} (Acc: {:.1}%) ---",
                category.stats.key_value(GroupField::Category).unwrap_or_default(),
                category.stats.pass_rate * 100.0
            )?;
            for breakdown in &category.types {
                writeln!(
                    f,
                    "   [{}] Accuracy: {:.1}%",
                    breakdown.stats.key_value(GroupField::Type).unwrap_or_default(),
                    breakdown.stats.pass_rate * 100.0
                )?;
                for rank in &breakdown.ranks {
                    writeln!(
                        f,
                        "      > {}: {:.1}% ({} tests)",
                        rank.key_value(GroupField::Rank).unwrap_or_default(),
                        rank.pass_rate * 100.0,
                        rank.count
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Counts of actual tool (rows) against expected tool (columns) over a shared, sorted label set.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Every actual and expected tool label in `records`, sorted and deduplicated.
    pub fn labels_of<'a>(records: impl IntoIterator<Item = &'a ClassifiedRecord>) -> Vec<String> {
        records
            .into_iter()
            .flat_map(|r| [r.actual_tool().to_string(), r.expected_tool().to_string()])
            .collect::<BTreeSet<String>>()
            .into_iter()
            .collect()
    }

    pub fn build<'a>(records: impl IntoIterator<Item = &'a ClassifiedRecord>) -> Self {
        let records: Vec<&ClassifiedRecord> = records.into_iter().collect();
        let labels = Self::labels_of(records.iter().copied());
        Self::build_with_labels(labels, records)
    }

    /// Lays the counts out on `labels`, which may name tools absent from `records`.
    /// Labels missing from the set are added in sorted order.
    pub fn build_with_labels<'a>(
        labels: Vec<String>,
        records: impl IntoIterator<Item = &'a ClassifiedRecord>,
    ) -> Self {
        let records: Vec<&ClassifiedRecord> = records.into_iter().collect();
        let mut labels: BTreeSet<String> = labels.into_iter().collect();
        labels.extend(Self::labels_of(records.iter().copied()));
        let labels: Vec<String> = labels.into_iter().collect();
        let index: IndexMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();
        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for record in &records {
            let row = index[record.actual_tool()];
            let column = index[record.expected_tool()];
            counts[row][column] += 1;
        }
        ConfusionMatrix { labels, counts }
    }

    pub fn count(&self, actual: &str, expected: &str) -> usize {
        let row = self.labels.iter().position(|l| l == actual);
        let column = self.labels.iter().position(|l| l == expected);
        match (row, column) {
            (Some(row), Some(column)) => self.counts[row][column],
            _ => 0,
        }
    }
}

/// One confusion matrix per run id, in run id order, all on the label set of every run combined.
pub fn confusion_by_run(records: &[ClassifiedRecord]) -> IndexMap<String, ConfusionMatrix> {
    let labels = ConfusionMatrix::labels_of(records);
    let run_ids: BTreeSet<&str> = records.iter().map(|r| r.run_id.as_str()).collect();
    run_ids
        .into_iter()
        .map(|run_id| {
            let matrix = ConfusionMatrix::build_with_labels(
                labels.clone(),
                records.iter().filter(|r| r.run_id == run_id),
            );
            (run_id.to_string(), matrix)
        })
        .collect()
}

/// Everything the statistics file carries for a set of runs.
#[derive(Serialize, Clone, Debug)]
pub struct Statistics {
    pub runs: Vec<GroupStats>,
    pub by_run_category_type: Vec<GroupStats>,
    pub hierarchy: HierarchicalReport,
    pub confusion_matrices: IndexMap<String, ConfusionMatrix>,
}

pub fn pass_statistics(records: &[ClassifiedRecord]) -> Statistics {
    Statistics {
        runs: aggregate(records, &[GroupField::RunId]),
        by_run_category_type: aggregate(
            records,
            &[GroupField::RunId, GroupField::Category, GroupField::Type],
        ),
        hierarchy: HierarchicalReport::build(records),
        confusion_matrices: confusion_by_run(records),
    }
}
