//! # Geometry Module
//!
//! Three-dimensional structure generation and comparison for small molecules.
//!
//! ## Overview
//!
//! Conformers are produced by distance geometry: a [`bounds::BoundsMatrix`] of
//! pairwise lower/upper distance limits is derived from the molecular graph and
//! smoothed with the triangle inequality, random distances inside those limits
//! are embedded through the metric matrix, and the result is refined against
//! the bounds and then relaxed with a light force field. Conformers are compared
//! by RMSD after Kabsch superposition and overlaid on a reference molecule by an
//! alignment that pairs atoms with similar Crippen contributions.
//!
//! ## Key Components
//!
//! - [`bounds`] - Topological distance bounds and triangle smoothing
//! - [`embed`] - Distance-geometry embedding and the seeded [`embed::ConformerGenerator`]
//! - [`forcefield`] - Harmonic bond/angle terms with soft repulsion and a descent minimizer
//! - [`align`] - Kabsch superposition, symmetry-aware RMSD and contribution-guided alignment
//! - [`utils`] - Hydrogen placement, centroids and RMSD helpers

pub mod align;
pub mod bounds;
pub mod embed;
pub mod forcefield;
pub mod utils;
