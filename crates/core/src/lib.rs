//! Liveshop Core - Shared types and reconciliation algorithms.
//!
//! This crate provides the pieces used across all Liveshop components:
//! - `admin` - Back-office service for live-selling sessions
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The algorithms here take rows that were already
//! loaded and return decisions the service persists.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, phones, and statuses
//! - [`session_index`] - Session codes ("A1") and comment claim extraction
//! - [`oversell`] - Running-sum oversell detection
//! - [`matching`] - Comment-to-product matching
//! - [`reconcile`] - Local vs TPOS order reconciliation

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod matching;
pub mod oversell;
pub mod reconcile;
pub mod session_index;
pub mod types;

pub use session_index::{Claim, SessionIndex, SessionIndexError};
pub use types::*;
