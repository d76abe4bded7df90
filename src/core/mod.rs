//! Core domain: configuration, entities, state store and dry-run plans

pub mod config;
pub mod error;
pub mod iteration;
pub mod plan;
pub mod run;
pub mod store;
pub mod window;
