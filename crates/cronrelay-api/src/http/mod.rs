//! HTTP handlers and routing.

pub mod executions;
pub mod jobs;
pub mod master;
pub mod monitoring;
pub mod routes;
pub mod runner;
