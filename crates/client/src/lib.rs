//! Client code for cacheshell.
//!
//! This crate provides the HTTP fetch boundary and URL resolution helpers
//! used by the worker.

pub mod fetch;

pub use fetch::{Fetch, FetchConfig, FetchResponse, HttpFetcher};
