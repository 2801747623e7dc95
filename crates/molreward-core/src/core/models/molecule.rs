use super::atom::Atom;
use super::topology::{Bond, BondOrder};
use crate::core::chem::aromaticity;
use crate::core::chem::rings::RingInfo;
use crate::core::geometry::utils::hydrogen_positions;
use nalgebra::Point3;
use thiserror::Error;

/// One 3D arrangement of a molecule's atoms, indexed like the atoms.
pub type Conformer = Vec<Point3<f64>>;

const HYDROGEN_BOND_LENGTH: f64 = 1.09;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoleculeError {
    #[error("Atom index {0} is out of range")]
    AtomIndexOutOfRange(usize),
    #[error("Conformer has {found} positions but the molecule has {expected} atoms")]
    ConformerSizeMismatch { expected: usize, found: usize },
    #[error("Conformer {0} does not exist")]
    ConformerNotFound(usize),
}

/// A molecular graph with ring information and zero or more conformers.
///
/// Molecules are assembled through [`MoleculeBuilder`], which perceives rings,
/// assigns implicit hydrogens and perceives aromaticity once. After that the
/// graph is immutable; only the conformer set can change.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    /// `adjacency[atom] = [(neighbor, bond_index), ...]`
    adjacency: Vec<Vec<(usize, usize)>>,
    rings: RingInfo,
    conformers: Vec<Conformer>,
}

impl Molecule {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn heavy_atom_count(&self) -> usize {
        self.atoms.iter().filter(|a| !a.is_hydrogen()).count()
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, idx: usize) -> Option<&Atom> {
        self.atoms.get(idx)
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    /// Neighbors of an atom with the index of the connecting bond.
    pub fn neighbor_bonds(&self, idx: usize) -> &[(usize, usize)] {
        self.adjacency.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn neighbors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        self.neighbor_bonds(idx).iter().map(|&(n, _)| n)
    }

    /// Number of explicit graph connections (explicit hydrogens included).
    pub fn degree(&self, idx: usize) -> usize {
        self.neighbor_bonds(idx).len()
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.neighbor_bonds(a)
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, bi)| &self.bonds[bi])
    }

    pub fn bond_index_between(&self, a: usize, b: usize) -> Option<usize> {
        self.neighbor_bonds(a)
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, bi)| bi)
    }

    /// Hydrogens attached as explicit graph nodes.
    pub fn explicit_hydrogen_count(&self, idx: usize) -> usize {
        self.neighbors(idx)
            .filter(|&n| self.atoms[n].is_hydrogen())
            .count()
    }

    /// All hydrogens attached to an atom, implicit and explicit.
    pub fn total_hydrogens(&self, idx: usize) -> usize {
        self.atoms
            .get(idx)
            .map(|a| a.implicit_hydrogens as usize + self.explicit_hydrogen_count(idx))
            .unwrap_or(0)
    }

    /// Sum of bond orders around an atom, aromatic bonds counting 1.5.
    pub fn bond_order_sum(&self, idx: usize) -> f64 {
        self.neighbor_bonds(idx)
            .iter()
            .map(|&(_, bi)| self.bonds[bi].order.as_f64())
            .sum()
    }

    /// Valence from explicit bonds and input-fixed hydrogens.
    ///
    /// Aromatic atoms whose fractional bond sum overshoots an allowed valence are
    /// snapped down to it, so pyrrole-type nitrogens report 3 rather than 4.
    pub fn explicit_valence(&self, idx: usize) -> u8 {
        let Some(atom) = self.atoms.get(idx) else {
            return 0;
        };
        let mut accum = self.bond_order_sum(idx);
        if atom.no_implicit {
            accum += atom.implicit_hydrogens as f64;
        }
        if atom.is_aromatic {
            if let Some(element) = atom.element() {
                let valences = element.charged_valences(atom.formal_charge);
                if let Some(&lowest) = valences.first() {
                    if accum > lowest as f64 {
                        let mut snapped = lowest as f64;
                        for &v in &valences {
                            if v as f64 > accum {
                                break;
                            }
                            snapped = v as f64;
                        }
                        if accum - snapped <= 1.5 {
                            accum = snapped;
                        }
                    }
                }
            }
        }
        (accum + 0.1).round() as u8
    }

    /// Explicit valence plus implicit hydrogens.
    pub fn total_valence(&self, idx: usize) -> u8 {
        match self.atoms.get(idx) {
            Some(atom) if !atom.no_implicit => {
                self.explicit_valence(idx) + atom.implicit_hydrogens
            }
            Some(_) => self.explicit_valence(idx),
            None => 0,
        }
    }

    pub fn ring_info(&self) -> &RingInfo {
        &self.rings
    }

    pub fn conformers(&self) -> &[Conformer] {
        &self.conformers
    }

    pub fn conformer(&self, id: usize) -> Option<&Conformer> {
        self.conformers.get(id)
    }

    pub fn conformer_mut(&mut self, id: usize) -> Option<&mut Conformer> {
        self.conformers.get_mut(id)
    }

    /// Appends a conformer and returns its id.
    pub fn add_conformer(&mut self, conformer: Conformer) -> Result<usize, MoleculeError> {
        if conformer.len() != self.atoms.len() {
            return Err(MoleculeError::ConformerSizeMismatch {
                expected: self.atoms.len(),
                found: conformer.len(),
            });
        }
        self.conformers.push(conformer);
        Ok(self.conformers.len() - 1)
    }

    pub fn clear_conformers(&mut self) {
        self.conformers.clear();
    }

    /// Returns a copy in which every implicit hydrogen is an explicit atom.
    ///
    /// Heavy atoms keep their indices; hydrogens are appended after them. When
    /// conformers exist, hydrogen positions are generated from the local geometry
    /// of their parent atom.
    pub fn with_explicit_hydrogens(&self) -> Molecule {
        let mut atoms = self.atoms.clone();
        let mut bonds = self.bonds.clone();
        let mut parents = Vec::new();

        for (idx, atom) in self.atoms.iter().enumerate() {
            for _ in 0..atom.implicit_hydrogens {
                let h_idx = atoms.len();
                let mut hydrogen = Atom::new(1);
                hydrogen.no_implicit = true;
                atoms.push(hydrogen);
                bonds.push(Bond::new(idx, h_idx, BondOrder::Single));
                parents.push(idx);
            }
            atoms[idx].implicit_hydrogens = 0;
            atoms[idx].no_implicit = true;
        }

        let conformers = self
            .conformers
            .iter()
            .map(|conf| {
                let mut positions = conf.clone();
                let mut cursor = 0;
                while cursor < parents.len() {
                    let parent = parents[cursor];
                    let count = parents[cursor..]
                        .iter()
                        .take_while(|&&p| p == parent)
                        .count();
                    let heavy_neighbors: Vec<_> =
                        self.neighbors(parent).map(|n| conf[n]).collect();
                    positions.extend(hydrogen_positions(
                        &conf[parent],
                        &heavy_neighbors,
                        count,
                        HYDROGEN_BOND_LENGTH,
                    ));
                    cursor += count;
                }
                positions
            })
            .collect();

        let mut mol = Molecule::assemble(self.name.clone(), atoms, bonds);
        mol.conformers = conformers;
        mol
    }

    /// Returns a copy with hydrogen atoms folded into their heavy atom's count.
    ///
    /// Only hydrogens bonded to exactly one heavy atom are folded; molecular
    /// hydrogen and bridging hydrogens stay explicit.
    pub fn without_explicit_hydrogens(&self) -> Molecule {
        let removable: Vec<bool> = self
            .atoms
            .iter()
            .enumerate()
            .map(|(idx, atom)| {
                atom.is_hydrogen()
                    && atom.isotope.is_none()
                    && self.degree(idx) == 1
                    && self.neighbors(idx).all(|n| !self.atoms[n].is_hydrogen())
            })
            .collect();

        let mut remap = vec![usize::MAX; self.atoms.len()];
        let mut atoms = Vec::with_capacity(self.atoms.len());
        for (idx, atom) in self.atoms.iter().enumerate() {
            if !removable[idx] {
                remap[idx] = atoms.len();
                atoms.push(atom.clone());
            }
        }
        for (idx, _) in self.atoms.iter().enumerate().filter(|(i, _)| removable[*i]) {
            if let Some(parent) = self.neighbors(idx).next() {
                let heavy = &mut atoms[remap[parent]];
                heavy.implicit_hydrogens += 1;
                heavy.no_implicit = true;
            }
        }
        let bonds = self
            .bonds
            .iter()
            .filter(|b| !removable[b.atom1] && !removable[b.atom2])
            .map(|b| Bond::new(remap[b.atom1], remap[b.atom2], b.order))
            .collect();
        let conformers = self
            .conformers
            .iter()
            .map(|conf| {
                conf.iter()
                    .enumerate()
                    .filter(|(i, _)| !removable[*i])
                    .map(|(_, p)| *p)
                    .collect()
            })
            .collect();

        let mut mol = Molecule::assemble(self.name.clone(), atoms, bonds);
        mol.conformers = conformers;
        mol
    }

    /// Builds adjacency and ring data without touching atom or bond flags.
    fn assemble(name: String, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Molecule {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        let rings = RingInfo::perceive(atoms.len(), &bonds, &adjacency);
        Molecule {
            name,
            atoms,
            bonds,
            adjacency,
            rings,
            conformers: Vec::new(),
        }
    }

    fn assign_implicit_hydrogens(&mut self) {
        for idx in 0..self.atoms.len() {
            if self.atoms[idx].no_implicit {
                continue;
            }
            let explicit = self.explicit_valence(idx);
            let atom = &self.atoms[idx];
            let implicit = atom
                .element()
                .map(|e| e.charged_valences(atom.formal_charge))
                .and_then(|valences| valences.into_iter().find(|&v| v >= explicit))
                .map(|target| target - explicit)
                .unwrap_or(0);
            self.atoms[idx].implicit_hydrogens = implicit;
        }
    }

    pub(crate) fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub(crate) fn bonds_mut(&mut self) -> &mut [Bond] {
        &mut self.bonds
    }
}

/// Incrementally assembles a [`Molecule`].
#[derive(Debug, Default)]
pub struct MoleculeBuilder {
    name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    positions: Vec<Option<Point3<f64>>>,
}

impl MoleculeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Adds an atom and returns its index.
    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.positions.push(None);
        self.atoms.len() - 1
    }

    /// Adds an atom with a 3D position and returns its index.
    pub fn add_atom_at(&mut self, atom: Atom, position: Point3<f64>) -> usize {
        self.atoms.push(atom);
        self.positions.push(Some(position));
        self.atoms.len() - 1
    }

    pub fn atom_mut(&mut self, idx: usize) -> Option<&mut Atom> {
        self.atoms.get_mut(idx)
    }

    /// Adds a bond between two existing atoms.
    ///
    /// Adding a bond that already exists succeeds without creating a duplicate.
    pub fn add_bond(&mut self, a: usize, b: usize, order: BondOrder) -> Result<(), MoleculeError> {
        if a >= self.atoms.len() {
            return Err(MoleculeError::AtomIndexOutOfRange(a));
        }
        if b >= self.atoms.len() || a == b {
            return Err(MoleculeError::AtomIndexOutOfRange(b));
        }
        if self
            .bonds
            .iter()
            .any(|bond| bond.contains(a) && bond.contains(b))
        {
            return Ok(());
        }
        self.bonds.push(Bond::new(a, b, order));
        Ok(())
    }

    /// Finalizes the molecule: perceives rings, assigns implicit hydrogens and
    /// perceives aromaticity. A conformer is attached when every atom has a position.
    pub fn build(self) -> Molecule {
        let MoleculeBuilder {
            name,
            atoms,
            bonds,
            positions,
        } = self;
        let mut mol = Molecule::assemble(name, atoms, bonds);

        for bi in 0..mol.bonds.len() {
            if mol.bonds[bi].order == BondOrder::Aromatic && !mol.rings.is_bond_in_ring(bi) {
                mol.bonds[bi].order = BondOrder::Single;
            }
        }
        for idx in 0..mol.atoms.len() {
            let has_aromatic_bond = mol
                .neighbor_bonds(idx)
                .iter()
                .any(|&(_, bi)| mol.bonds[bi].order == BondOrder::Aromatic);
            mol.atoms[idx].is_aromatic = has_aromatic_bond;
        }

        mol.assign_implicit_hydrogens();
        aromaticity::perceive(&mut mol);

        if !positions.is_empty() && positions.iter().all(Option::is_some) {
            mol.conformers
                .push(positions.into_iter().flatten().collect());
        }
        mol
    }
}
