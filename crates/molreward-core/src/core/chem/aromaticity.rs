use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use tracing::trace;

/// Marks Hückel-aromatic rings of a Kekulé structure as aromatic.
///
/// Every SSSR ring is judged on its own from the original bond orders: each ring
/// atom must donate a known number of pi electrons and the total must satisfy
/// 4n + 2. Rings that already carry aromatic bonds throughout are left as read.
pub(crate) fn perceive(mol: &mut Molecule) {
    let rings: Vec<(Vec<usize>, Vec<usize>)> = mol
        .ring_info()
        .atom_rings()
        .iter()
        .cloned()
        .zip(mol.ring_info().bond_rings().iter().cloned())
        .collect();

    let aromatic_rings: Vec<usize> = rings
        .iter()
        .enumerate()
        .filter(|(_, (atoms, bonds))| {
            let already = bonds
                .iter()
                .all(|&b| mol.bonds()[b].order == BondOrder::Aromatic);
            already || is_huckel_ring(mol, atoms)
        })
        .map(|(i, _)| i)
        .collect();

    for ring in aromatic_rings {
        let (atoms, bonds) = &rings[ring];
        trace!(ring_size = atoms.len(), "Perceived aromatic ring");
        for &a in atoms {
            // Hydrogen counts were derived from the Kekulé form; freeze them.
            let atom = &mut mol.atoms_mut()[a];
            atom.is_aromatic = true;
            atom.no_implicit = true;
        }
        for &b in bonds {
            mol.bonds_mut()[b].order = BondOrder::Aromatic;
        }
    }
}

fn is_huckel_ring(mol: &Molecule, ring: &[usize]) -> bool {
    let mut electrons = 0u32;
    for &atom in ring {
        match pi_electrons(mol, atom) {
            Some(e) => electrons += e,
            None => return false,
        }
    }
    electrons % 4 == 2
}

/// Pi electrons an atom contributes to a ring it belongs to, or `None` when the
/// atom cannot be part of an aromatic ring (sp3 carbon, triple bonds, ...).
fn pi_electrons(mol: &Molecule, idx: usize) -> Option<u32> {
    let atom = mol.atom(idx)?;
    let mut double_partner = None;
    for &(neighbor, bi) in mol.neighbor_bonds(idx) {
        match mol.bonds()[bi].order {
            BondOrder::Double => double_partner = Some(neighbor),
            BondOrder::Triple => return None,
            BondOrder::Aromatic => return Some(lone_pair_donor(mol, idx).unwrap_or(1)),
            BondOrder::Single => {}
        }
    }

    if let Some(partner) = double_partner {
        if mol.ring_info().is_atom_in_ring(partner) {
            return Some(1);
        }
        // Exocyclic C=O, C=N, C=S leave an empty p orbital; exocyclic C=C does not.
        return match mol.atom(partner)?.atomic_number {
            7 | 8 | 16 => Some(0),
            _ => None,
        };
    }

    match (atom.atomic_number, atom.formal_charge) {
        (6, -1) => Some(2),
        (6, 1) | (5, 0) => Some(0),
        _ => lone_pair_donor(mol, idx),
    }
}

/// Two-electron donors: pyrrole-type N/P and furan/thiophene-type O/S/Se.
fn lone_pair_donor(mol: &Molecule, idx: usize) -> Option<u32> {
    let atom = mol.atom(idx)?;
    let connections = mol.degree(idx) + atom.implicit_hydrogens as usize;
    match (atom.atomic_number, atom.formal_charge) {
        (7 | 15, 0) if connections == 3 => Some(2),
        (8 | 16 | 34, 0) if connections == 2 => Some(2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::core::io::smiles::parse_smiles;
    use crate::core::models::topology::BondOrder;

    fn aromatic_count(smiles: &str) -> usize {
        let mol = parse_smiles(smiles).unwrap();
        mol.atoms().iter().filter(|a| a.is_aromatic).count()
    }

    #[test]
    fn kekule_benzene_is_aromatized() {
        let mol = parse_smiles("C1=CC=CC=C1").unwrap();
        assert!(mol.atoms().iter().all(|a| a.is_aromatic));
        assert!(mol.bonds().iter().all(|b| b.order == BondOrder::Aromatic));
        assert!(mol.atoms().iter().all(|a| a.implicit_hydrogens == 1));
    }

    #[test]
    fn five_membered_heteroaromatics_are_perceived() {
        assert_eq!(aromatic_count("C1=CNC=C1"), 5);
        let pyrrole = parse_smiles("C1=CNC=C1").unwrap();
        assert_eq!(pyrrole.total_valence(2), 3);
        assert_eq!(pyrrole.total_hydrogens(2), 1);
        assert_eq!(aromatic_count("C1=COC=C1"), 5);
        assert_eq!(aromatic_count("C1=CSC=C1"), 5);
    }

    #[test]
    fn pyridone_with_exocyclic_carbonyl_is_aromatic() {
        assert_eq!(aromatic_count("O=C1C=CC=CN1"), 6);
    }

    #[test]
    fn non_aromatic_rings_are_left_alone() {
        assert_eq!(aromatic_count("C1CCCCC1"), 0);
        assert_eq!(aromatic_count("C1=CCC=C1"), 0);
        assert_eq!(aromatic_count("C1=CC=CC=CC=C1"), 0);
    }

    #[test]
    fn kekule_naphthalene_aromatizes_both_rings() {
        assert_eq!(aromatic_count("C1=CC=C2C=CC=CC2=C1"), 10);
    }
}
