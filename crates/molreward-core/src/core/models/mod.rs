//! # Core Models Module
//!
//! Fundamental data structures for representing small molecules.
//!
//! ## Overview
//!
//! A [`molecule::Molecule`] is an undirected graph of [`atom::Atom`]s joined by
//! [`topology::Bond`]s, with hydrogens usually stored as implicit counts on their
//! heavy atom. Each molecule carries perceived ring information and any number of
//! conformers (3D coordinate sets indexed like the atoms).
//!
//! ## Key Components
//!
//! - [`element`] - Static periodic table data (weights, valences, radii)
//! - [`atom`] - Atom representation with charge, aromaticity and hydrogen counts
//! - [`topology`] - Bond orders and bond connectivity
//! - [`molecule`] - The molecular graph, its builder and conformer storage
//!
//! ## Usage
//!
//! ```ignore
//! use molreward::core::models::{atom::Atom, molecule::MoleculeBuilder, topology::BondOrder};
//!
//! let mut builder = MoleculeBuilder::new().name("methanol");
//! let c = builder.add_atom(Atom::new(6));
//! let o = builder.add_atom(Atom::new(8));
//! builder.add_bond(c, o, BondOrder::Single)?;
//! let mol = builder.build();
//! assert_eq!(mol.total_hydrogens(c), 3);
//! ```

pub mod atom;
pub mod element;
pub mod molecule;
pub mod topology;
