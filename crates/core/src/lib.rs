//! Core domain logic for the bramble platform.
//!
//! Everything in this crate is I/O free: token parsing and sealing,
//! handoff expiry rules, extension metadata, the block tree renderer,
//! and the storage traits the server crate implements. Side effects
//! live behind the traits defined here.

pub mod auth;
pub mod extension;
pub mod graph;
pub mod handoff;
pub mod storage;
