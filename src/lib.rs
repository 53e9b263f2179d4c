//! Support-ticket triage: TF-IDF features, model selection, cross-validated
//! tuning and a prediction API over frozen artifacts.

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
