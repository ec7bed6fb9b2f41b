//! portcullis: request filter pipeline
//!
//! Ordered before/after request filters scoped globally, per HTTP method,
//! per path glob and per route, with a hot-reloadable configuration.

pub mod config;
pub mod domain;
pub mod service;
