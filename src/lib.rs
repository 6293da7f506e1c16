//! Mood farm library crate: re-exports all modules for integration testing.
//!
//! The binary crate (`main.rs`) is the actual entry point.
//! This library crate exposes the same modules so that `tests/` integration
//! tests can drive the view's systems and resources without a window or GPU.

pub mod shared;
pub mod config;
pub mod input;
pub mod map;
pub mod scene;
pub mod garden;
pub mod viewport;
pub mod interaction;
pub mod overlay;
