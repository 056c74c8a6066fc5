//! Shared building blocks for the database administration gateway.
//!
//! - `config`: environment driven service configuration
//! - `errors`: the error taxonomy and its HTTP mapping
//! - `extract`: request extractors reporting through `errors`
//! - `middleware`: request tracing middleware
//! - `models`: connection, row-set and query models
//! - `response`: response bodies
//! - `utils`: SQL safety checks

pub mod config;
pub mod errors;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
