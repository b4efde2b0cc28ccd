//! docbridge HTTP Surface
//!
//! Actix-Web endpoints over a [`docbridge_query::QueryEngine`]:
//! - `POST /api/save`: upsert a record by key
//! - `GET /api/search`: filtered, sorted, paged find
//! - `GET /api/health`: store reachability
//! - `GET /` and `GET /metrics`: service metadata and Prometheus metrics

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod rest;

pub use rest::{build_app, ApiError, RestServer};
