//! # Features Module
//!
//! Pharmacophoric feature perception and feature-map scoring.
//!
//! ## Overview
//!
//! A feature is a chemically meaningful group (hydrogen-bond donor, acceptor,
//! ionizable group, aromatic ring, hydrophobic patch) found by matching an
//! ordered list of SMARTS-based [`definitions::FeatureDefinition`]s against a
//! molecule. Placed in a conformer, each feature becomes a family-tagged point
//! at the centroid of its atoms. A [`feat_map::FeatMap`] built from reference
//! features scores another feature set by summing same-family overlaps.
//!
//! ## Key Components
//!
//! - [`family`] - The [`family::FeatureFamily`] enum
//! - [`definitions`] - Built-in definitions and TOML definition files
//! - [`factory`] - [`factory::FeatureFactory`] and the [`factory::Feature`] it produces
//! - [`feat_map`] - Gaussian-profile feature maps

pub mod definitions;
pub mod factory;
pub mod family;
pub mod feat_map;
