//! Synchronization primitives for the hosted execution backend.
//!
//!   gate.rs — the park/wake handoff point under every frozen execution

pub mod gate;
