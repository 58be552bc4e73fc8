//! Core domain + application logic for quizscout.
//!
//! This crate is intentionally host-agnostic. The live document, the answers
//! API and the display surface live behind ports (traits) implemented in
//! adapter crates.

pub mod cache;
pub mod config;
pub mod document;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod normalize;
pub mod ports;
pub mod question;
pub mod scan;
pub mod session;
pub mod watch;

pub use errors::{Error, Result};
