//! # realm-import
//!
//! Imports Keycloak realm exports with a bounded pool of workers.
//!
//! Realms are applied first, then their clients and users are spread over
//! the pool. All workers share one admin token: when it expires, a single
//! renewal is performed and the new token reaches every worker before the
//! failed call is retried. Each submitted object yields exactly one
//! [`model::Outcome`] on the dispatcher's result stream.

pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod identity;
pub mod model;
pub mod telemetry;
