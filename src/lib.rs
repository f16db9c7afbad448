//! k6 load-test script generation from declarative YAML configurations.
//!
//! This crate provides tools to:
//! - Validate a declarative load-test configuration
//! - Generate randomized parameter values (integer, string, array, CSV, ...)
//! - Construct request URLs from generated parameters
//! - Emit a runnable k6 script and invoke the k6 engine

pub mod config;
pub mod csv;
pub mod error;
pub mod generator;
pub mod k6;
pub mod runner;
pub mod url_builder;

pub use config::{LoadTestConfig, Mode, Parameter, ParameterSpec};
pub use error::{Error, Result};
pub use generator::{GeneratedParameter, GeneratedValue, ParameterGenerator};
pub use k6::ScriptEmitter;
pub use runner::{k6_installed, RunOptions, Runner};
pub use url_builder::UrlBuilder;
