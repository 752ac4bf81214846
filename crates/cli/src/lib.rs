//! Command-line interface for chatdeck.
//!
//! This crate drives the realtime simulator from the terminal: it runs a
//! scripted session, prints the events it produces, and manages the
//! configuration file.

#![deny(missing_docs, unsafe_code)]

/// CLI command definitions and parsing.
pub mod commands;

/// CLI application entry point and configuration.
pub mod app;

/// Error types for CLI operations.
pub mod error;
