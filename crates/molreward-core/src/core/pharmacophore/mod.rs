//! # Pharmacophore Module
//!
//! Distance-constrained feature patterns and their placement on candidate molecules.
//!
//! ## Overview
//!
//! A [`model::Pharmacophore`] is a small set of family-tagged feature points with
//! pairwise lower/upper distance bounds, typically cut out of a template ligand.
//! Mapping it onto a new molecule happens in three steps:
//!
//! 1. [`matching::match_features`] lists, for every pharmacophore feature, the
//!    molecule features of the same family.
//! 2. [`matching::all_matches`] keeps the combinations whose distances are
//!    compatible with the molecule's topological bounds, after merging the
//!    pharmacophore bounds in and re-smoothing.
//! 3. [`embedding::embed_pharmacophore`] generates 3D embeddings with the
//!    matched features held at the pharmacophore distances.
//!
//! ## Key Components
//!
//! - [`model`] - The pharmacophore and its lower-bound rule
//! - [`matching`] - Family matching and bound-consistent match enumeration
//! - [`embedding`] - Constrained embedding with a failure count
//! - [`error`] - [`error::PharmacophoreError`]

pub mod embedding;
pub mod error;
pub mod matching;
pub mod model;
