use super::smarts::SmartsPattern;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use std::sync::LazyLock;
use tracing::warn;

/// Per-atom Wildman-Crippen contribution to logP and molar refractivity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CrippenContribution {
    pub log_p: f64,
    pub mr: f64,
}

impl CrippenContribution {
    const fn new(log_p: f64, mr: f64) -> Self {
        Self { log_p, mr }
    }
}

struct AtomType {
    label: &'static str,
    pattern: SmartsPattern,
    contribution: CrippenContribution,
}

/// Heavy-atom types, tried in order; the first pattern rooted at the atom wins.
const HEAVY_ATOM_TYPES: &[(&str, &str, f64, f64)] = &[
    ("C1", "[CH4]", 0.1441, 2.503),
    ("C1", "[CH3]C", 0.1441, 2.503),
    ("C1", "[CH2](C)C", 0.1441, 2.503),
    ("C2", "[CH](C)(C)C", 0.0, 2.433),
    ("C2", "[C](C)(C)(C)C", 0.0, 2.433),
    ("C3", "[CH3][N,O,P,S,F,Cl,Br,I]", -0.2035, 2.753),
    ("C3", "[CH2X4]([N,O,P,S,F,Cl,Br,I])[A;!#1]", -0.2035, 2.753),
    ("C4", "[CH1X4]([N,O,P,S,F,Cl,Br,I])[A;!#1][A;!#1]", -0.2051, 2.731),
    ("C4", "[CH0X4]([N,O,P,S,F,Cl,Br,I])([A;!#1])([A;!#1])[A;!#1]", -0.2051, 2.731),
    ("C5", "[C]=[!C;A;!#1]", -0.2783, 5.007),
    ("C6", "[CH2]=C", 0.1551, 3.513),
    ("C6", "[CH1](=C)[A;!#1]", 0.1551, 3.513),
    ("C6", "[CH0](=C)([A;!#1])[A;!#1]", 0.1551, 3.513),
    ("C6", "[C](=C)=C", 0.1551, 3.513),
    ("C7", "[CX2]#[A;!#1]", 0.0017, 3.888),
    ("C8", "[CH3]c", 0.08452, 2.464),
    ("C9", "[CH3]a", -0.1444, 2.412),
    ("C10", "[CH2X4]a", -0.0516, 2.488),
    ("C11", "[CHX4]a", 0.1193, 2.582),
    ("C12", "[CH0X4]a", -0.0967, 2.576),
    ("C13", "[cH0]-[A;!C;!N;!O;!S;!F;!Cl;!Br;!I;!#1]", -0.5443, 4.041),
    ("C14", "[c][#9]", 0.0, 3.257),
    ("C15", "[c][#17]", 0.245, 3.564),
    ("C16", "[c][#35]", 0.198, 3.18),
    ("C17", "[c][#53]", 0.0, 3.104),
    ("C18", "[cH]", 0.1581, 3.35),
    ("C19", "[c](:a)(:a):a", 0.2955, 4.346),
    ("C20", "[c](:a)(:a)-a", 0.2713, 3.904),
    ("C21", "[c](:a)(:a)-C", 0.136, 3.509),
    ("C22", "[c](:a)(:a)-N", 0.4619, 3.067),
    ("C23", "[c](:a)(:a)-O", 0.5437, 3.853),
    ("C24", "[c](:a)(:a)-S", 0.1893, 2.673),
    ("C25", "[c](:a)(:a)=[C,N,O]", -0.8186, 3.135),
    ("C26", "[C](=C)(a)[A;!#1]", 0.264, 4.305),
    ("C26", "[C](=C)(c)a", 0.264, 4.305),
    ("C26", "[CH1](=C)a", 0.264, 4.305),
    ("C26", "[C]=c", 0.264, 4.305),
    ("C27", "[CX4][A;!C;!N;!O;!P;!S;!F;!Cl;!Br;!I;!#1]", 0.2148, 2.693),
    ("CS", "[#6]", 0.08129, 3.243),
    ("N1", "[NH2+0][A;!#1]", -1.019, 2.262),
    ("N2", "[NH+0]([A;!#1])[A;!#1]", -0.7096, 2.173),
    ("N3", "[NH2+0]a", -1.027, 2.827),
    ("N4", "[NH+0](a)[A;!#1]", -0.5188, 3.0),
    ("N5", "[NH+0](a)a", 0.08387, 1.757),
    ("N6", "[N+0]([A;!#1])([A;!#1])[A;!#1]", -0.3187, 2.428),
    ("N7", "[N+0](a)([A;!#1])[A;!#1]", -0.4458, 2.5),
    ("N8", "[N+0](a)(a)[A;!#1]", 0.01508, 2.7),
    ("N9", "[N+0]#[A;!#1]", -0.4806, 2.134),
    ("N10", "[NH0+0]=[A;!#1]", -0.4806, 2.134),
    ("N11", "[n+0]", -0.4806, 2.134),
    ("N12", "[n+,n-]", -0.3239, 2.202),
    ("N13", "[NH0+]([A;!#1])([A;!#1])([A;!#1])[A;!#1]", -0.3187, 2.428),
    ("N14", "[N+,N-]", -0.4806, 2.134),
    ("NS", "[#7]", -0.4806, 2.134),
    ("O1", "[o]", 0.1552, 1.08),
    ("O2", "[OH,OH2]", -0.2893, 0.8238),
    ("O3", "[O]([A;!#1])[A;!#1]", -0.0684, 1.085),
    ("O4", "[O](a)[A;!#1]", -0.4195, 1.182),
    ("O4", "[O](a)a", -0.4195, 1.182),
    ("O5", "[O]=[#7,#8]", 0.0335, 3.367),
    ("O5", "[OX1;-][#7]", 0.0335, 3.367),
    ("O6", "[OX1;-][#16]", -0.3339, 0.7774),
    ("O8", "[O]=c", 0.1788, 3.135),
    ("O9", "[O]=[CH]C", -0.1526, 0.0),
    ("O9", "O=C(C)C", -0.1526, 0.0),
    ("O10", "O=C([C,c])[a]", 0.1129, 0.2215),
    ("O11", "O=C([!C;!c])", 0.4833, 0.389),
    ("O12", "[O-1]C(=O)", -1.326, 0.0),
    ("O7", "[OX1;-]", -1.189, 0.0),
    ("OS", "[#8]", -0.1188, 0.6865),
    ("F", "[#9]", 0.4202, 1.108),
    ("Cl", "[#17]", 0.6895, 5.853),
    ("Br", "[#35]", 0.8456, 8.927),
    ("I", "[#53]", 0.8857, 14.02),
    ("P", "[#15]", 0.8612, 6.92),
    ("S1", "[S-0]", 0.6482, 7.591),
    ("S2", "[S-,S-2,S+,S+2]", -0.0024, 7.365),
    ("S3", "[s]", 0.6237, 6.691),
    ("Me", "*", 0.0, 0.0),
];

const HYDROCARBON_H: CrippenContribution = CrippenContribution::new(0.123, 1.057);
const ALCOHOL_H: CrippenContribution = CrippenContribution::new(-0.2677, 1.395);
const AMINE_H: CrippenContribution = CrippenContribution::new(0.2142, 0.9627);
const ACID_H: CrippenContribution = CrippenContribution::new(0.298, 1.805);
const OTHER_H: CrippenContribution = CrippenContribution::new(0.1125, 1.112);

static ATOM_TYPES: LazyLock<Vec<AtomType>> = LazyLock::new(|| {
    HEAVY_ATOM_TYPES
        .iter()
        .filter_map(|&(label, smarts, log_p, mr)| match SmartsPattern::parse(smarts) {
            Ok(pattern) => Some(AtomType {
                label,
                pattern,
                contribution: CrippenContribution::new(log_p, mr),
            }),
            Err(e) => {
                warn!(label, smarts, error = %e, "Skipping unparsable Crippen atom type");
                None
            }
        })
        .collect()
});

/// Computes per-atom Crippen contributions.
///
/// Hydrogens stored as implicit counts add their contribution to the heavy
/// atom that carries them, so the result always has one entry per atom.
pub fn crippen_contributions(mol: &Molecule) -> Vec<CrippenContribution> {
    (0..mol.atom_count())
        .map(|idx| {
            let Some(atom) = mol.atom(idx) else {
                return CrippenContribution::default();
            };
            if atom.is_hydrogen() {
                return match mol.neighbors(idx).next() {
                    Some(parent) => hydrogen_contribution(mol, parent),
                    None => HYDROCARBON_H,
                };
            }
            let mut contribution = heavy_atom_type(mol, idx)
                .map(|t| t.contribution)
                .unwrap_or_default();
            let h = hydrogen_contribution(mol, idx);
            let implicit = atom.implicit_hydrogens as f64;
            contribution.log_p += implicit * h.log_p;
            contribution.mr += implicit * h.mr;
            contribution
        })
        .collect()
}

/// The Crippen type label assigned to an atom (`"H"` for hydrogens).
pub fn atom_type_label(mol: &Molecule, idx: usize) -> Option<&'static str> {
    let atom = mol.atom(idx)?;
    if atom.is_hydrogen() {
        return Some("H");
    }
    heavy_atom_type(mol, idx).map(|t| t.label)
}

/// Wildman-Crippen logP: the sum of per-atom contributions.
pub fn crippen_log_p(mol: &Molecule) -> f64 {
    crippen_contributions(mol).iter().map(|c| c.log_p).sum()
}

fn heavy_atom_type(mol: &Molecule, idx: usize) -> Option<&'static AtomType> {
    ATOM_TYPES.iter().find(|t| t.pattern.matches_at(mol, idx))
}

fn hydrogen_contribution(mol: &Molecule, parent: usize) -> CrippenContribution {
    let Some(atom) = mol.atom(parent) else {
        return OTHER_H;
    };
    match atom.atomic_number {
        6 => HYDROCARBON_H,
        7 => AMINE_H,
        8 if is_acidic_oxygen(mol, parent) => ACID_H,
        8 => ALCOHOL_H,
        _ => OTHER_H,
    }
}

/// Hydroxyl oxygen on a carbon that carries a double bond (acids, enols).
fn is_acidic_oxygen(mol: &Molecule, oxygen: usize) -> bool {
    mol.neighbors(oxygen)
        .filter(|&n| mol.atom(n).is_some_and(|a| a.atomic_number == 6))
        .any(|carbon| {
            mol.neighbor_bonds(carbon).iter().any(|&(other, bi)| {
                other != oxygen
                    && mol.bonds()[bi].order == BondOrder::Double
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles::parse_smiles;

    #[test]
    fn every_atom_type_pattern_parses() {
        assert_eq!(ATOM_TYPES.len(), HEAVY_ATOM_TYPES.len());
    }

    #[test]
    fn types_are_assigned_first_match_wins() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(atom_type_label(&mol, 0), Some("C1"));
        assert_eq!(atom_type_label(&mol, 1), Some("C3"));
        assert_eq!(atom_type_label(&mol, 2), Some("O2"));

        let toluene = parse_smiles("Cc1ccccc1").unwrap();
        assert_eq!(atom_type_label(&toluene, 0), Some("C8"));
        assert_eq!(atom_type_label(&toluene, 1), Some("C21"));
        assert_eq!(atom_type_label(&toluene, 2), Some("C18"));
    }

    #[test]
    fn implicit_and_explicit_hydrogens_give_the_same_total() {
        let mol = parse_smiles("CC(=O)Nc1ccccc1").unwrap();
        let with_h = mol.with_explicit_hydrogens();
        let implicit_total = crippen_log_p(&mol);
        let explicit_total = crippen_log_p(&with_h);
        assert!((implicit_total - explicit_total).abs() < 1e-9);
        assert_eq!(crippen_contributions(&with_h).len(), with_h.atom_count());
    }

    #[test]
    fn log_p_orders_simple_molecules_sensibly() {
        let hexane = crippen_log_p(&parse_smiles("CCCCCC").unwrap());
        let hexanol = crippen_log_p(&parse_smiles("CCCCCCO").unwrap());
        let benzene = crippen_log_p(&parse_smiles("c1ccccc1").unwrap());
        assert!(hexane > hexanol);
        assert!((benzene - 6.0 * (0.1581 + 0.123)).abs() < 1e-9);
    }
}
