//! kboard - Kitchen production board
//!
//! This library provides the core functionality for kboard, including:
//! - Database operations and migrations
//! - Order, line, stage and display models
//! - Repository layer and the backing-store seams
//! - Stage pipeline, transitions and the board state
//! - SLA escalation timers and clock synchronisation
//! - Display filtering, product focus and tally
//! - Live updates from the push bus
//! - CLI command parsing and execution
//!
//! # Example
//!
//! ```no_run
//! use kboard::cli::run;
//!
//! fn main() {
//!     if let Err(e) = run() {
//!         eprintln!("Error: {}", e);
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub mod db;
pub mod models;
pub mod repo;
pub mod store;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod clock;
pub mod notice;
pub mod filter;
pub mod sla;
pub mod board;
pub mod session;
pub mod live;
pub mod cli;
pub mod utils;
