use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::tool::classify::{ClassifiedRecord, StageFlags};

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowLink {
    pub source: usize,
    pub target: usize,
    pub value: usize,
}

/// Node labels plus weighted links between label indices.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowGraph {
    pub labels: Vec<String>,
    pub links: Vec<FlowLink>,
}

impl FlowGraph {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn weight(&self, source: &str, target: &str) -> usize {
        let index_of = |label: &str| self.labels.iter().position(|l| l == label);
        let (Some(source), Some(target)) = (index_of(source), index_of(target)) else {
            return 0;
        };
        self.links
            .iter()
            .filter(|link| link.source == source && link.target == target)
            .map(|link| link.value)
            .sum()
    }
}

pub const PIPELINE_LABELS: [&str; 11] = [
    "Start",
    "Bad JSON",
    "JSON OK",
    "Bad Schema",
    "Schema OK",
    "Hallucination",
    "Tool Valid",
    "Wrong Tool",
    "Tool OK",
    "Wrong Param",
    "PERFECT",
];

type StageFlag = fn(&StageFlags) -> bool;

/// Each stage splits the population that survived the previous one, from the
/// node it leaves to its (bad, ok) node pair.
const PIPELINE_STAGES: [(usize, StageFlag); 5] = [
    (0, |f| f.json_ok),
    (2, |f| f.schema_ok),
    (4, |f| f.no_hallucination),
    (6, |f| f.function_ok),
    (8, |f| f.param_ok),
];

pub fn pipeline_graph<'a>(records: impl IntoIterator<Item = &'a ClassifiedRecord>) -> FlowGraph {
    let mut surviving: Vec<StageFlags> = records.into_iter().map(|r| r.flags()).collect();
    if surviving.is_empty() {
        return FlowGraph::default();
    }
    let mut links = Vec::with_capacity(PIPELINE_STAGES.len() * 2);
    for (source, passes) in PIPELINE_STAGES {
        let (ok, bad): (Vec<StageFlags>, Vec<StageFlags>) =
            surviving.into_iter().partition(|flags| passes(flags));
        links.push(FlowLink {
            source,
            target: source + 1,
            value: bad.len(),
        });
        links.push(FlowLink {
            source,
            target: source + 2,
            value: ok.len(),
        });
        surviving = ok;
    }
    FlowGraph {
        labels: PIPELINE_LABELS.iter().map(|l| l.to_string()).collect(),
        links,
    }
}

/// Hands out one index per distinct label, in order of first appearance.
#[derive(Default)]
struct NodeIndex(IndexMap<String, usize>);

impl NodeIndex {
    fn get_or_insert(&mut self, label: &str) -> usize {
        if let Some(index) = self.0.get(label) {
            return *index;
        }
        let index = self.0.len();
        self.0.insert(label.to_string(), index);
        index
    }

    fn into_labels(self) -> Vec<String> {
        self.0.into_keys().collect()
    }
}

/// category → type → rank → PASS/FAIL. Labels are shared across levels, so a
/// rank called "Medium" is one node no matter how many types lead into it.
pub fn hierarchical_graph<'a>(
    records: impl IntoIterator<Item = &'a ClassifiedRecord>,
) -> FlowGraph {
    let mut counts: BTreeMap<[String; 4], usize> = BTreeMap::new();
    for record in records {
        let key = [
            record.category.clone(),
            record.test_type.clone(),
            record.rank.clone(),
            record.status().to_string(),
        ];
        *counts.entry(key).or_default() += 1;
    }
    let mut nodes = NodeIndex::default();
    let mut links = Vec::with_capacity(counts.len() * 3);
    for (path, count) in &counts {
        let indices: Vec<usize> = path.iter().map(|label| nodes.get_or_insert(label)).collect();
        for pair in indices.windows(2) {
            links.push(FlowLink {
                source: pair[0],
                target: pair[1],
                value: *count,
            });
        }
    }
    FlowGraph {
        labels: nodes.into_labels(),
        links,
    }
}
