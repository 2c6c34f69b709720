//! Hermes Indexer - Event-driven document indexing pipeline.
//!
//! Revisions committed by write-path collaborators flow through a
//! transactional outbox into a partitioned log, where a consumer matches
//! them against declarative rulesets and runs ordered processing steps.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
