//! # Core Module
//!
//! This module provides the cheminformatics toolkit that the scoring components
//! are built on: molecule representation, substructure search, descriptors, 3D
//! structure generation and pharmacophore handling.
//!
//! ## Overview
//!
//! Everything in `core` is stateless with respect to scoring. Functions take
//! molecules and parameters and return new values; the only mutation is the
//! attachment or in-place transformation of conformers on molecules the caller
//! owns.
//!
//! ## Architecture
//!
//! - **Molecular Representation** ([`models`]) - Elements, atoms, bonds, molecules and conformers
//! - **File I/O** ([`io`]) - SMILES parsing and MDL SD files
//! - **Chemistry** ([`chem`]) - Rings, aromaticity, SMARTS matching, descriptors, Crippen contributions
//! - **Geometry** ([`geometry`]) - Distance bounds, embedding, force field, alignment
//! - **Features** ([`features`]) - Pharmacophoric feature perception and feature maps
//! - **Pharmacophores** ([`pharmacophore`]) - Distance-constrained feature patterns, matching and embedding
//!
//! ## Scientific Foundation
//!
//! - **Distance geometry** for conformer generation from topological bounds
//! - **Crippen atom typing** for per-atom logP and molar refractivity contributions
//! - **Gaussian feature overlap** for scoring the fit of one feature set onto another

pub mod chem;
pub mod features;
pub mod geometry;
pub mod io;
pub mod models;
pub mod pharmacophore;
