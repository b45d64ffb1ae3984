//! Configuration model for taglock.
//!
//! This module defines the Config struct that represents `taglock.yaml`.
//! Unknown fields are ignored, omitted fields take defaults, and values are
//! validated on load.

mod model;
mod operations;


pub use model::Config;
