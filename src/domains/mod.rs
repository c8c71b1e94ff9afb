//! Domains module containing business logic organized by bounded contexts.
//!
//! The server exposes a single domain: blockchain tools.

pub mod tools;
