use super::smarts::{AtomPrimitive, BondPrimitive, SmartsPattern};
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use std::collections::HashSet;

/// A substructure match: `match[pattern_atom] = molecule_atom`.
pub type Match = Vec<usize>;

impl SmartsPattern {
    /// Whether the pattern occurs anywhere in the molecule.
    ///
    /// The empty pattern never matches.
    pub fn has_match(&self, mol: &Molecule) -> bool {
        let mut found = false;
        self.search(mol, None, &mut |_| {
            found = true;
            false
        });
        found
    }

    /// All matches whose atom sets differ, in discovery order.
    pub fn find_matches(&self, mol: &Molecule) -> Vec<Match> {
        let mut seen: HashSet<Vec<usize>> = HashSet::new();
        let mut matches = Vec::new();
        self.search(mol, None, &mut |mapping| {
            let mut key = mapping.to_vec();
            key.sort_unstable();
            if seen.insert(key) {
                matches.push(mapping.to_vec());
            }
            true
        });
        matches
    }

    /// Every mapping, including permutations over the same atoms.
    pub fn find_all_mappings(&self, mol: &Molecule) -> Vec<Match> {
        let mut matches = Vec::new();
        self.search(mol, None, &mut |mapping| {
            matches.push(mapping.to_vec());
            true
        });
        matches
    }

    /// Whether some match places the pattern's first atom on `atom`.
    pub fn matches_at(&self, mol: &Molecule, atom: usize) -> bool {
        let mut found = false;
        self.search(mol, Some(atom), &mut |_| {
            found = true;
            false
        });
        found
    }

    /// Backtracking search in plan order. `visit` returns `false` to stop.
    fn search(&self, mol: &Molecule, root: Option<usize>, visit: &mut dyn FnMut(&[usize]) -> bool) {
        if self.is_empty() || mol.atom_count() == 0 {
            return;
        }
        if root.is_some_and(|r| r >= mol.atom_count()) {
            return;
        }
        let mut state = SearchState {
            mapping: vec![usize::MAX; self.atom_count()],
            used: vec![false; mol.atom_count()],
            root,
        };
        self.extend(mol, 0, &mut state, visit);
    }

    fn extend(
        &self,
        mol: &Molecule,
        depth: usize,
        state: &mut SearchState,
        visit: &mut dyn FnMut(&[usize]) -> bool,
    ) -> bool {
        if depth == self.plan().len() {
            return visit(&state.mapping);
        }
        let step = self.plan()[depth];

        let candidates: Vec<usize> = match step.via {
            Some((anchor, _)) => mol.neighbors(state.mapping[anchor]).collect(),
            None if depth == 0 && state.root.is_some() => state.root.into_iter().collect(),
            None => (0..mol.atom_count()).collect(),
        };

        for candidate in candidates {
            if state.used[candidate] || !self.atom_matches(step.atom, mol, candidate) {
                continue;
            }
            if !self.bonds_consistent(step.atom, candidate, mol, state) {
                continue;
            }
            state.mapping[step.atom] = candidate;
            state.used[candidate] = true;
            let keep_going = self.extend(mol, depth + 1, state, visit);
            state.used[candidate] = false;
            state.mapping[step.atom] = usize::MAX;
            if !keep_going {
                return false;
            }
        }
        true
    }

    /// Checks every pattern bond from `pattern_atom` to an already placed atom.
    fn bonds_consistent(
        &self,
        pattern_atom: usize,
        candidate: usize,
        mol: &Molecule,
        state: &SearchState,
    ) -> bool {
        self.adjacency()[pattern_atom].iter().all(|&(other, pb)| {
            let placed = state.mapping[other];
            if placed == usize::MAX {
                return true;
            }
            match mol.bond_index_between(candidate, placed) {
                Some(bi) => self.bonds()[pb]
                    .expr
                    .evaluate(&|p| bond_primitive_matches(*p, mol, bi)),
                None => false,
            }
        })
    }

    fn atom_matches(&self, pattern_atom: usize, mol: &Molecule, atom: usize) -> bool {
        self.atoms()[pattern_atom].evaluate(&|p| atom_primitive_matches(p, mol, atom))
    }
}

struct SearchState {
    mapping: Vec<usize>,
    used: Vec<bool>,
    root: Option<usize>,
}

fn atom_primitive_matches(primitive: &AtomPrimitive, mol: &Molecule, idx: usize) -> bool {
    let Some(atom) = mol.atom(idx) else {
        return false;
    };
    let rings = mol.ring_info();
    match primitive {
        AtomPrimitive::Any => true,
        AtomPrimitive::Aromatic => atom.is_aromatic,
        AtomPrimitive::Aliphatic => !atom.is_aromatic,
        AtomPrimitive::Element {
            atomic_number,
            aromatic,
        } => {
            atom.atomic_number == *atomic_number
                && aromatic.is_none_or(|flag| atom.is_aromatic == flag)
        }
        AtomPrimitive::AtomicNumber(n) => atom.atomic_number == *n,
        AtomPrimitive::TotalHCount(n) => mol.total_hydrogens(idx) == *n as usize,
        AtomPrimitive::ImplicitHCount(None) => atom.implicit_hydrogens > 0,
        AtomPrimitive::ImplicitHCount(Some(n)) => atom.implicit_hydrogens == *n,
        AtomPrimitive::Degree(n) => mol.degree(idx) == *n as usize,
        AtomPrimitive::TotalConnections(n) => {
            mol.degree(idx) + atom.implicit_hydrogens as usize == *n as usize
        }
        AtomPrimitive::Valence(n) => mol.total_valence(idx) == *n,
        AtomPrimitive::RingMembership(None) | AtomPrimitive::RingSize(None) => {
            rings.is_atom_in_ring(idx)
        }
        AtomPrimitive::RingMembership(Some(n)) => rings.num_atom_rings(idx) == *n as usize,
        AtomPrimitive::RingSize(Some(0)) => !rings.is_atom_in_ring(idx),
        AtomPrimitive::RingSize(Some(n)) => rings.min_atom_ring_size(idx) == Some(*n as usize),
        AtomPrimitive::RingConnectivity(expected) => {
            let ring_bonds = mol
                .neighbor_bonds(idx)
                .iter()
                .filter(|&&(_, bi)| rings.is_bond_in_ring(bi))
                .count();
            match expected {
                Some(n) => ring_bonds == *n as usize,
                None => ring_bonds > 0,
            }
        }
        AtomPrimitive::Charge(c) => atom.formal_charge == *c,
        AtomPrimitive::Isotope(i) => atom.isotope == Some(*i),
        AtomPrimitive::Recursive(pattern) => pattern.matches_at(mol, idx),
    }
}

fn bond_primitive_matches(primitive: BondPrimitive, mol: &Molecule, bond: usize) -> bool {
    let order = mol.bonds()[bond].order;
    match primitive {
        BondPrimitive::Implicit => matches!(order, BondOrder::Single | BondOrder::Aromatic),
        BondPrimitive::Single => order == BondOrder::Single,
        BondPrimitive::Double => order == BondOrder::Double,
        BondPrimitive::Triple => order == BondOrder::Triple,
        BondPrimitive::Aromatic => order == BondOrder::Aromatic,
        BondPrimitive::Any => true,
        BondPrimitive::Ring => mol.ring_info().is_bond_in_ring(bond),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles::parse_smiles;

    fn count(smarts: &str, smiles: &str) -> usize {
        let pattern = SmartsPattern::parse(smarts).unwrap();
        let mol = parse_smiles(smiles).unwrap();
        pattern.find_matches(&mol).len()
    }

    #[test]
    fn empty_pattern_never_matches() {
        let pattern = SmartsPattern::parse("").unwrap();
        let mol = parse_smiles("CCO").unwrap();
        assert!(!pattern.has_match(&mol));
        assert!(pattern.find_matches(&mol).is_empty());
    }

    #[test]
    fn simple_patterns_count_unique_matches() {
        assert_eq!(count("O", "OCCO"), 2);
        assert_eq!(count("CO", "OCCO"), 2);
        assert_eq!(count("C=O", "CC(=O)O"), 1);
        assert_eq!(count("[OX2H]", "CC(=O)O"), 1);
        assert_eq!(count("c", "c1ccccc1C"), 6);
        assert_eq!(count("C", "c1ccccc1C"), 1);
    }

    #[test]
    fn symmetric_patterns_report_one_match_per_atom_set() {
        let pattern = SmartsPattern::parse("c1ccccc1").unwrap();
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(pattern.find_matches(&mol).len(), 1);
        assert_eq!(pattern.find_all_mappings(&mol).len(), 12);
    }

    #[test]
    fn implicit_bond_matches_single_and_aromatic_only() {
        assert_eq!(count("CC", "C=C"), 0);
        assert_eq!(count("C~C", "C=C"), 1);
        assert_eq!(count("cc", "c1ccccc1"), 6);
    }

    #[test]
    fn ring_queries_distinguish_chain_atoms() {
        assert_eq!(count("[R]", "C1CC1CC"), 3);
        assert_eq!(count("[R0]", "C1CC1CC"), 2);
        assert_eq!(count("[r3]", "C1CC1CC1CCCCC1"), 3);
        assert_eq!(count("C@C", "C1CC1CC"), 3);
        assert_eq!(count("C!@C", "C1CC1CC"), 2);
        assert_eq!(count("[x2]", "C1CC1C"), 3);
        assert_eq!(count("[x2]", "CC"), 0);
    }

    #[test]
    fn hydrogen_degree_and_valence_primitives() {
        assert_eq!(count("[CH3]", "CC(C)C"), 3);
        assert_eq!(count("[D3]", "CC(C)C"), 1);
        assert_eq!(count("[X4]", "CC(C)C"), 4);
        assert_eq!(count("[N;v3]", "CN"), 1);
        assert_eq!(count("[N;+1;v4]", "C[NH3+]"), 1);
        assert_eq!(count("[h2]", "CCO"), 1);
    }

    #[test]
    fn recursive_smarts_constrains_environment() {
        let acid_oxygen = "[$([OH]C=O)]";
        assert_eq!(count(acid_oxygen, "CC(=O)O"), 1);
        assert_eq!(count(acid_oxygen, "CCO"), 0);
        assert_eq!(count("[$(C=O)]", "CC(=O)OC"), 1);
    }

    #[test]
    fn disconnected_patterns_need_all_components() {
        assert_eq!(count("O.N", "OCCN"), 1);
        assert_eq!(count("O.N", "OCCO"), 0);
    }

    #[test]
    fn matches_at_roots_the_first_atom() {
        let pattern = SmartsPattern::parse("OC=O").unwrap();
        let mol = parse_smiles("CC(=O)O").unwrap();
        assert!(pattern.matches_at(&mol, 3));
        // The carbonyl oxygen is double bonded, so it cannot take the hydroxyl slot.
        assert!(!pattern.matches_at(&mol, 2));
        assert!(!pattern.matches_at(&mol, 0));
        assert!(!pattern.matches_at(&mol, 99));
    }
}
