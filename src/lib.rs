// src/lib.rs — Library root for goalforge

pub mod cli;
pub mod core;
pub mod evaluator;
pub mod infra;
pub mod memory;
pub mod provider;
