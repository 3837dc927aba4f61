//! # Core Module
//!
//! This module provides the fundamental building blocks for trajectory
//! analysis in EssDyn, serving as the computational foundation of the library.
//!
//! ## Overview
//!
//! The core module implements the data structures and numerical routines every
//! essential-dynamics run is assembled from: elementwise vector arithmetic,
//! mass-weighted rigid-body superposition, streaming structure averaging, and
//! an out-of-core frame buffer that keeps arbitrarily long trajectories within
//! a bounded memory budget.
//!
//! ## Architecture
//!
//! - **Vector Arithmetic** ([`vecops`]) - Pure elementwise operations shared by
//!   the numerical routines
//! - **Superposition** ([`superpose`]) - Mass-weighted Kabsch alignment of a
//!   frame onto a fixed reference
//! - **Averaging** ([`mean`]) - Incremental mean structure over an unbounded
//!   frame stream
//! - **Frame Storage** ([`storage`]) - Block-based buffering with disk spill,
//!   restore, and transpose-on-demand
//! - **Collaborator Seams** ([`sources`]) - Traits for trajectory readers,
//!   topology providers, and eigensolvers
//! - **Error Handling** ([`error`]) - The crate-wide error taxonomy

pub mod error;
pub mod mean;
pub mod sources;
pub mod storage;
pub mod superpose;
pub mod vecops;
