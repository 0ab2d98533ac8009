pub mod pass_statistics;
pub mod pass_validate;
