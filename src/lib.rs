//! Local-first personal time tracker. Projects, time entries and tags live in a single JSON
//! document, a timer tracks the entry being worked on, and an idle reminder nudges the user when
//! they have been busy for a while without tracking anything.
//!

pub mod cli;
pub mod config;
pub mod export;
pub mod idle;
pub mod notify;
pub mod report;
pub mod store;
pub mod timer;
pub mod utils;
