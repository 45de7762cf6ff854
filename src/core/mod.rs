// src/core/mod.rs — Planning, routing and execution engine

pub mod cost;
pub mod council;
pub mod events;
pub mod executor;
pub mod graph;
pub mod orchestrator;
pub mod planner;
pub mod routing;
pub mod types;
