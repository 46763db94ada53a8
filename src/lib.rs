//! Object position ingestion with zone enter/exit detection.
//!
//! Samples arrive from the [`transport`], are routed by object id through the
//! [`pipeline`] and update four things: the raw time series, the durable object
//! record, per-object zone [`membership`] (emitting zone [`events`]) and the
//! in-memory [`cache`] of active objects served by the [`api`].

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod geometry;
pub mod membership;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod transport;
pub mod zones;

pub use error::TrackingError;
