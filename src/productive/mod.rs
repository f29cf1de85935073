//! Productive.io API: wire types, client, pagination, relationship
//! resolution and per-kind formatting.

pub mod api_types;
pub mod cache;
pub mod client;
pub mod fetch;
pub mod format;
pub mod relationships;
pub mod resources;
pub mod types;

#[cfg(test)]
pub mod testing;
