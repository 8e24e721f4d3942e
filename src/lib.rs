pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod naming;
pub mod output;
pub mod planner;
pub mod prune;
pub mod results;
pub mod rewrite;
pub mod run_info;
