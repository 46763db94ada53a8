//! Domain models for zonetrack.
//!
//! # Core Concepts
//!
//! ## Durable Records
//!
//! - [`ObjectRecord`]: Last known position and status of every object ever seen.
//! - [`ZoneEvent`]: Append-only log of zone enters and exits. An enter gains a
//!   dwell `duration` once its matching exit is recorded.
//! - [`ObjectEvent`]: Appearance and disappearance bookkeeping.
//! - [`PositionPoint`]: One raw sample in the time-series store.
//!
//! ## Inputs
//!
//! - [`PositionSample`]: A decoded position report, immutable once received.
//! - [`ZoneDefinition`]: A zone as stored by its configuration source, validated
//!   into a [`Zone`] when loaded.

mod event;
mod object;
mod position;
mod zone;

pub use event::*;
pub use object::*;
pub use position::*;
pub use zone::*;
