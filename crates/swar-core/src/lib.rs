//! swar-core: Adaptive assessment engine.
//!
//! This crate defines the data model, answer validation, the rolling
//! performance model, difficulty routing and session scoring that the rest
//! of swar builds on. Nothing in here needs the network: the external
//! classifier is reached through a trait and is always optional.

pub mod classifier;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod performance;
pub mod report;
pub mod router;
pub mod scoring;
pub mod session;
pub mod similarity;
pub mod store;
pub mod traits;
pub mod validation;
