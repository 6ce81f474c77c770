//! Shared record schema for the `DoItNow` remote task collection.

pub mod codec;
pub mod task;
