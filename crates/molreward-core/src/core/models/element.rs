use phf::{Map, phf_map};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Static per-element data used by valence handling, descriptors and geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    /// The atomic number (0 is the SMILES/SMARTS dummy atom `*`).
    pub atomic_number: u8,
    /// The element symbol with standard capitalization.
    pub symbol: &'static str,
    /// The standard average atomic weight in g/mol.
    pub atomic_weight: f64,
    /// Allowed neutral valences, lowest first. Empty means no implicit hydrogens.
    pub valences: &'static [u8],
    /// Single-bond covalent radius in Angstroms.
    pub covalent_radius: f64,
    /// Van der Waals radius in Angstroms.
    pub vdw_radius: f64,
}

static ELEMENTS: &[Element] = &[
    Element { atomic_number: 0, symbol: "*", atomic_weight: 0.0, valences: &[], covalent_radius: 0.76, vdw_radius: 1.70 },
    Element { atomic_number: 1, symbol: "H", atomic_weight: 1.008, valences: &[1], covalent_radius: 0.31, vdw_radius: 1.20 },
    Element { atomic_number: 2, symbol: "He", atomic_weight: 4.003, valences: &[], covalent_radius: 0.28, vdw_radius: 1.40 },
    Element { atomic_number: 3, symbol: "Li", atomic_weight: 6.941, valences: &[1], covalent_radius: 1.28, vdw_radius: 1.82 },
    Element { atomic_number: 4, symbol: "Be", atomic_weight: 9.012, valences: &[2], covalent_radius: 0.96, vdw_radius: 1.53 },
    Element { atomic_number: 5, symbol: "B", atomic_weight: 10.812, valences: &[3], covalent_radius: 0.84, vdw_radius: 1.92 },
    Element { atomic_number: 6, symbol: "C", atomic_weight: 12.011, valences: &[4], covalent_radius: 0.76, vdw_radius: 1.70 },
    Element { atomic_number: 7, symbol: "N", atomic_weight: 14.007, valences: &[3, 5], covalent_radius: 0.71, vdw_radius: 1.55 },
    Element { atomic_number: 8, symbol: "O", atomic_weight: 15.999, valences: &[2], covalent_radius: 0.66, vdw_radius: 1.52 },
    Element { atomic_number: 9, symbol: "F", atomic_weight: 18.998, valences: &[1], covalent_radius: 0.57, vdw_radius: 1.47 },
    Element { atomic_number: 10, symbol: "Ne", atomic_weight: 20.180, valences: &[], covalent_radius: 0.58, vdw_radius: 1.54 },
    Element { atomic_number: 11, symbol: "Na", atomic_weight: 22.990, valences: &[1], covalent_radius: 1.66, vdw_radius: 2.27 },
    Element { atomic_number: 12, symbol: "Mg", atomic_weight: 24.305, valences: &[2], covalent_radius: 1.41, vdw_radius: 1.73 },
    Element { atomic_number: 13, symbol: "Al", atomic_weight: 26.982, valences: &[3], covalent_radius: 1.21, vdw_radius: 1.84 },
    Element { atomic_number: 14, symbol: "Si", atomic_weight: 28.086, valences: &[4], covalent_radius: 1.11, vdw_radius: 2.10 },
    Element { atomic_number: 15, symbol: "P", atomic_weight: 30.974, valences: &[3, 5], covalent_radius: 1.07, vdw_radius: 1.80 },
    Element { atomic_number: 16, symbol: "S", atomic_weight: 32.067, valences: &[2, 4, 6], covalent_radius: 1.05, vdw_radius: 1.80 },
    Element { atomic_number: 17, symbol: "Cl", atomic_weight: 35.453, valences: &[1], covalent_radius: 1.02, vdw_radius: 1.75 },
    Element { atomic_number: 18, symbol: "Ar", atomic_weight: 39.948, valences: &[], covalent_radius: 1.06, vdw_radius: 1.88 },
    Element { atomic_number: 19, symbol: "K", atomic_weight: 39.098, valences: &[1], covalent_radius: 2.03, vdw_radius: 2.75 },
    Element { atomic_number: 20, symbol: "Ca", atomic_weight: 40.078, valences: &[2], covalent_radius: 1.76, vdw_radius: 2.31 },
    Element { atomic_number: 26, symbol: "Fe", atomic_weight: 55.845, valences: &[], covalent_radius: 1.32, vdw_radius: 2.00 },
    Element { atomic_number: 29, symbol: "Cu", atomic_weight: 63.546, valences: &[], covalent_radius: 1.32, vdw_radius: 1.40 },
    Element { atomic_number: 30, symbol: "Zn", atomic_weight: 65.390, valences: &[], covalent_radius: 1.22, vdw_radius: 1.39 },
    Element { atomic_number: 33, symbol: "As", atomic_weight: 74.922, valences: &[3, 5], covalent_radius: 1.19, vdw_radius: 1.85 },
    Element { atomic_number: 34, symbol: "Se", atomic_weight: 78.960, valences: &[2, 4, 6], covalent_radius: 1.20, vdw_radius: 1.90 },
    Element { atomic_number: 35, symbol: "Br", atomic_weight: 79.904, valences: &[1], covalent_radius: 1.20, vdw_radius: 1.85 },
    Element { atomic_number: 53, symbol: "I", atomic_weight: 126.904, valences: &[1], covalent_radius: 1.39, vdw_radius: 1.98 },
];

static SYMBOL_TO_NUMBER: Map<&'static str, u8> = phf_map! {
    "*" => 0, "H" => 1, "He" => 2, "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7,
    "O" => 8, "F" => 9, "Ne" => 10, "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14,
    "P" => 15, "S" => 16, "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Fe" => 26,
    "Cu" => 29, "Zn" => 30, "As" => 33, "Se" => 34, "Br" => 35, "I" => 53,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown element symbol: '{0}'")]
pub struct UnknownElementError(pub String);

impl Element {
    /// Looks up an element by atomic number.
    pub fn from_atomic_number(atomic_number: u8) -> Option<&'static Element> {
        ELEMENTS.iter().find(|e| e.atomic_number == atomic_number)
    }

    /// Looks up an element by its case-sensitive symbol (`"Cl"`, not `"CL"`).
    pub fn from_symbol(symbol: &str) -> Option<&'static Element> {
        SYMBOL_TO_NUMBER
            .get(symbol)
            .and_then(|&n| Self::from_atomic_number(n))
    }

    /// Whether this element is a hydrogen.
    pub fn is_hydrogen(&self) -> bool {
        self.atomic_number == 1
    }

    /// The valences accessible to the element carrying `formal_charge`.
    ///
    /// Group 15/16 cations gain valence (ammonium N is tetravalent), anions lose it;
    /// for every other element any charge reduces the valence.
    pub fn charged_valences(&self, formal_charge: i8) -> Vec<u8> {
        let shift_up = matches!(self.atomic_number, 7 | 8 | 15 | 16 | 33 | 34);
        self.valences
            .iter()
            .filter_map(|&v| {
                let v = v as i16;
                let adjusted = if shift_up {
                    v + formal_charge as i16
                } else {
                    v - (formal_charge as i16).abs()
                };
                (adjusted >= 0).then_some(adjusted as u8)
            })
            .collect()
    }
}

impl FromStr for &'static Element {
    type Err = UnknownElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Element::from_symbol(s).ok_or_else(|| UnknownElementError(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_symbol_and_number_agree() {
        for symbol in ["H", "C", "N", "O", "Cl", "Br", "Se"] {
            let by_symbol = Element::from_symbol(symbol).unwrap();
            let by_number = Element::from_atomic_number(by_symbol.atomic_number).unwrap();
            assert_eq!(by_symbol, by_number);
            assert_eq!(by_symbol.symbol, symbol);
        }
    }

    #[test]
    fn symbol_lookup_is_case_sensitive() {
        assert!(Element::from_symbol("CL").is_none());
        assert!(Element::from_symbol("cl").is_none());
        assert!("Xx".parse::<&'static Element>().is_err());
    }

    #[test]
    fn charged_valences_follow_group_rules() {
        let n = Element::from_symbol("N").unwrap();
        assert_eq!(n.charged_valences(0), vec![3, 5]);
        assert_eq!(n.charged_valences(1), vec![4, 6]);
        let o = Element::from_symbol("O").unwrap();
        assert_eq!(o.charged_valences(-1), vec![1]);
        let c = Element::from_symbol("C").unwrap();
        assert_eq!(c.charged_valences(-1), vec![3]);
        assert_eq!(c.charged_valences(1), vec![3]);
    }

    #[test]
    fn display_prints_symbol() {
        assert_eq!(Element::from_atomic_number(17).unwrap().to_string(), "Cl");
    }
}
