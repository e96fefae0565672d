//! dclient - a client CLI utility for Datasette instances
//!
//! This crate provides the core functionality for the `dclient` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`client`] - Blocking HTTP client for the Datasette JSON API
//! - [`config`] - Configuration files and instance/database/token resolution
//! - [`insert`] - Row readers, batching and type detection for bulk writes
//! - [`output`] - JSON, CSV, TSV and table rendering
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod insert;
pub mod output;

pub use error::{Error, Result};
