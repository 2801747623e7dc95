//! # molreward Core Library
//!
//! Scoring components for reinforcement-learning driven de novo molecule design.
//! Each component turns a batch of candidate molecules into one desirability
//! score per molecule.
//!
//! ## Architectural Philosophy
//!
//! The library is split into three layers with a one-way dependency between them.
//!
//! - **[`core`]: The Foundation.** Stateless molecule models, SMILES/SDF I/O and
//!   the cheminformatics routines the components need: SMARTS matching,
//!   descriptors, distance-geometry embedding, alignment, feature maps and
//!   pharmacophores.
//!
//! - **[`scoring`]: The Components.** Parameter parsing, score transformations and
//!   the [`scoring::component::ScoreComponent`] implementations (physico-chemical
//!   properties, custom alerts, pharmacophore alignment) together with the factory
//!   that builds them from configuration.
//!
//! - **[`workflows`]: The Public API.** Runs a set of components over a batch of
//!   molecules with progress reporting and returns one summary per component.

pub mod core;
pub mod scoring;
pub mod workflows;
