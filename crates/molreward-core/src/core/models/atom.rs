use super::element::Element;

/// Represents an atom in a molecular graph.
///
/// Hydrogens may be stored either as explicit atoms (graph nodes) or as the
/// `implicit_hydrogens` count of their heavy atom. Most scoring works on the
/// implicit form; explicit hydrogens are added only where 3D geometry needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The atomic number (0 for the dummy atom `*`).
    pub atomic_number: u8,
    /// The formal charge in elementary charge units.
    pub formal_charge: i8,
    /// The isotope mass number, if specified in the input.
    pub isotope: Option<u16>,
    /// Whether the atom is part of an aromatic system.
    pub is_aromatic: bool,
    /// Number of hydrogens attached to this atom that are not graph nodes.
    pub implicit_hydrogens: u8,
    /// When set, `implicit_hydrogens` was fixed by the input and is never recomputed
    /// from the valence model (bracket atoms in SMILES, hydrogens folded from files).
    pub no_implicit: bool,
}

impl Atom {
    /// Creates a neutral, non-aromatic atom with no attached hydrogens.
    ///
    /// # Arguments
    ///
    /// * `atomic_number` - The atomic number of the element.
    pub fn new(atomic_number: u8) -> Self {
        Self {
            atomic_number,
            formal_charge: 0,
            isotope: None,
            is_aromatic: false,
            implicit_hydrogens: 0,
            no_implicit: false,
        }
    }

    /// Returns the static element data, if the element is known.
    pub fn element(&self) -> Option<&'static Element> {
        Element::from_atomic_number(self.atomic_number)
    }

    /// Returns the element symbol, or `"?"` for unknown elements.
    pub fn symbol(&self) -> &'static str {
        self.element().map(|e| e.symbol).unwrap_or("?")
    }

    pub fn is_hydrogen(&self) -> bool {
        self.atomic_number == 1
    }

    pub fn covalent_radius(&self) -> f64 {
        self.element().map(|e| e.covalent_radius).unwrap_or(0.76)
    }

    pub fn vdw_radius(&self) -> f64 {
        self.element().map(|e| e.vdw_radius).unwrap_or(1.70)
    }
}
