//! # EssDyn Core Library
//!
//! A library for extracting the essential dynamics of a biomolecule from a
//! molecular-dynamics trajectory. It aligns every trajectory frame onto a
//! common reference with a mass-weighted Kabsch fit, accumulates an average
//! structure, builds an atom-by-atom covariance matrix of positional
//! fluctuations with a bounded memory footprint, and hands ranked eigenpairs
//! to downstream flexibility-aware docking tools.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a
//! clear separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless vector arithmetic
//!   (`vecops`), the mass-weighted superimposer, the streaming average, the
//!   out-of-core frame storage with its injected spill capability, and the
//!   trait seams for external collaborators (trajectory readers, topology
//!   providers, eigensolvers).
//!
//! - **[`engine`]: The Logic Core.** This layer owns the resource-aware parts
//!   of the pipeline: capacity planning and memory admission control, the
//!   parallel covariance reduction over buffered frames, explicit analysis
//!   configuration, and progress reporting.
//!
//! - **[`workflows`]: The Public API.** The highest-level, user-facing layer.
//!   It ties `engine` and `core` together to execute the complete
//!   essential-dynamics procedure, from raw frames to ranked eigenpairs.

pub mod core;
pub mod engine;
pub mod workflows;
