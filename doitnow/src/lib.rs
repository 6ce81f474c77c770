//! `DoItNow`: personal task tracker engine.
//!
//! The engine keeps a process-local mirror of one owner's remote task
//! collection, derives the displayed list from the active category and
//! time window, and governs task completion.

pub mod app;
pub mod config;
pub mod remote;
pub mod sync;
pub mod tasks;
