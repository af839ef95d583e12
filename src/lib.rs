//! smartlist - windowed, incrementally searched record list
//!
//! This library provides the windowing engine, the fetch controller that
//! pages records into a list, and the record sources behind it.
//! The search endpoint binary is in `main.rs`.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod import;
pub mod list_state;
pub mod paths;
pub mod record;
pub mod server;
pub mod session;
pub mod source;
pub mod window;
