//! # Engine Module
//!
//! This module owns the resource-aware parts of the essential-dynamics
//! pipeline: explicit analysis configuration, memory admission control and
//! block-size planning, the parallel covariance reduction over buffered
//! frames, and progress reporting.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Analysis parameters threaded explicitly
//!   through constructors, never ambient global state
//! - **Capacity Planning** ([`planner`]) - Memory estimation, admission
//!   control, and frame-store block sizing
//! - **Covariance Reduction** ([`covariance`]) - Lock-free parallel
//!   accumulation of the positional covariance matrix
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress events
//!   for embedding front-ends

pub mod config;
pub mod covariance;
pub mod planner;
pub mod progress;
