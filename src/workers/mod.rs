//! Built-in worker roles wired through the bus.
//!
//! Each role follows the same shape: endpoint constants, a `register`
//! function for the shared registry, a `runner` building the role
//! definition, a `manager` constructor, and an `install` function that
//! registers the backend command handlers delegating to the worker.

pub mod counter;
pub mod replays;
