use super::smarts::SmartsPattern;
use crate::core::models::molecule::Molecule;
use std::sync::LazyLock;

const HYDROGEN_WEIGHT: f64 = 1.008;

static LIPINSKI_DONOR: LazyLock<SmartsPattern> = LazyLock::new(|| {
    SmartsPattern::parse("[$([N;!H0;v3]),$([N;!H0;+1;v4]),$([O,S;H1;+0]),$([n;H1;+0])]")
        .expect("Lipinski donor pattern is a valid constant")
});

/// Average molecular weight in g/mol, implicit hydrogens included.
///
/// Atoms of unknown elements contribute nothing.
pub fn molecular_weight(mol: &Molecule) -> f64 {
    mol.atoms()
        .iter()
        .map(|atom| {
            let heavy = atom.element().map_or(0.0, |e| e.atomic_weight);
            heavy + atom.implicit_hydrogens as f64 * HYDROGEN_WEIGHT
        })
        .sum()
}

/// Number of Lipinski hydrogen-bond donor atoms (NH and OH/SH groups).
pub fn num_h_donors_lipinski(mol: &Molecule) -> usize {
    LIPINSKI_DONOR.find_matches(mol).len()
}

/// Number of heavy atoms.
pub fn heavy_atom_count(mol: &Molecule) -> usize {
    mol.heavy_atom_count()
}
