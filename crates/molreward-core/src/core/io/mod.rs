//! Provides input/output functionality for molecular formats.
//!
//! SMILES strings are the molecule exchange format of the scoring pipeline, while
//! MDL SD files carry 3D structures such as pharmacophore templates. Both produce
//! [`Molecule`](crate::core::models::molecule::Molecule) values with perceived
//! rings, aromaticity and hydrogen counts.

pub mod sdf;
pub mod smiles;
pub mod traits;
