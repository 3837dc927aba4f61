//! # Workflows Module
//!
//! High-level entry points that tie the `core` and `engine` layers together
//! into complete analyses.
//!
//! ## Architecture
//!
//! - **Essential Dynamics** ([`dynamics`]) - The full pipeline from raw
//!   trajectory frames to ranked eigenpairs: memory admission, two
//!   superposition passes, out-of-core covariance accumulation, and
//!   eigensolver hand-off.

pub mod dynamics;
