//! # evcal Common Library
//!
//! Shared code for the evcal services:
//! - Database schema initialization and record models
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
