//! Shared fixtures for the integration tests and benchmarks of `lalrkit`.

pub mod grammars;
