//! The shared world for Synchro.
//!
//! A single actor task owns the [`SessionRegistry`](synchro_session::SessionRegistry)
//! and drives the periodic UPDATE broadcast with a
//! [`TickScheduler`](synchro_tick::TickScheduler).
//!
//! # Key types
//!
//! - [`spawn_world`]: starts the actor
//! - [`WorldHandle`]: send commands to the running actor
//! - [`WorldConfig`]: broadcast period, channel size, budget threshold
//! - [`WorldInfo`]: counters snapshot

mod config;
mod error;
mod world;

pub use config::WorldConfig;
pub use error::WorldError;
pub use world::{WorldHandle, WorldInfo, spawn_world};
