pub mod classify;
pub mod error_analysis;
pub mod evaluate;
pub mod extract;
pub mod file_models;
pub mod flow_graph;
pub mod ground_truth;
pub mod passes;
pub mod text_metrics;
