//! # Chemistry Module
//!
//! Graph-level cheminformatics on [`Molecule`](crate::core::models::molecule::Molecule):
//! ring and aromaticity perception, the SMARTS query language with a
//! backtracking substructure matcher, and atom-additive descriptors.
//!
//! ## Key Components
//!
//! - [`rings`] - Smallest set of smallest rings and ring membership queries
//! - [`aromaticity`] - Hückel aromaticity perception for Kekulé structures
//! - [`smarts`] - SMARTS parsing into atom and bond query expressions
//! - [`matcher`] - Substructure search (`has_match`, `find_matches`, rooted matching)
//! - [`descriptors`] - Molecular weight and Lipinski donor count
//! - [`crippen`] - Wildman-Crippen per-atom logP and molar refractivity contributions

pub(crate) mod aromaticity;
pub mod crippen;
pub mod descriptors;
pub mod matcher;
pub mod rings;
pub mod smarts;
