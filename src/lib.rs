#![forbid(unsafe_code)]

//! Library side of trendtube: settings, the libsql-backed video store, the
//! YouTube client, the scrape pipeline, HTML rendering and the axum routes.
//! The `server` and `scrape` binaries are thin wrappers around these modules.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod routes;
pub mod store;
pub mod views;
pub mod youtube;

#[cfg(test)]
mod testing;
