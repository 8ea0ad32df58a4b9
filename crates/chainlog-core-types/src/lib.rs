//! Core types shared across chainlog facilities
//!
//! Canonical field keys and event names used by the error and logging
//! facilities and by every crate that emits structured events.

pub mod schema;
