//! services/api/src/lib.rs
//!
//! The HTTP service around the muroja'ah progress ledger.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
