pub mod cli;
pub mod config;
pub mod data;
pub mod eval;
pub mod experiments;
pub mod model;
pub mod optimizer;
pub mod training;
