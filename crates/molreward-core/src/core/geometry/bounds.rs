use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use itertools::Itertools;
use nalgebra::{DMatrix, Vector3};
use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use thiserror::Error;

/// Upper bound assigned to pairs with no geometric constraint.
pub const DEFAULT_UPPER: f64 = 1000.0;

const BOND_TOLERANCE: f64 = 0.01;
const ANGLE_TOLERANCE: f64 = 0.04;
const TORSION_TOLERANCE: f64 = 0.06;
const VDW_SCALE: f64 = 0.5;
const SMOOTHING_TOLERANCE: f64 = 1e-6;
const TETRAHEDRAL_ANGLE: f64 = 109.471_220_634_490_7;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Triangle smoothing failed: lower bound exceeds upper bound between points {0} and {1}")]
    Infeasible(usize, usize),
}

/// Pairwise lower/upper distance bounds between points.
///
/// Upper bounds live in the upper triangle (`i < j`) and lower bounds in the
/// lower triangle, so one square matrix holds both.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsMatrix {
    data: DMatrix<f64>,
}

impl BoundsMatrix {
    /// Creates an unconstrained matrix: lower 0, upper [`DEFAULT_UPPER`].
    pub fn new(size: usize) -> Self {
        let data = DMatrix::from_fn(size, size, |i, j| if i < j { DEFAULT_UPPER } else { 0.0 });
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn upper(&self, i: usize, j: usize) -> f64 {
        match i.cmp(&j) {
            std::cmp::Ordering::Less => self.data[(i, j)],
            std::cmp::Ordering::Greater => self.data[(j, i)],
            std::cmp::Ordering::Equal => 0.0,
        }
    }

    pub fn lower(&self, i: usize, j: usize) -> f64 {
        match i.cmp(&j) {
            std::cmp::Ordering::Less => self.data[(j, i)],
            std::cmp::Ordering::Greater => self.data[(i, j)],
            std::cmp::Ordering::Equal => 0.0,
        }
    }

    pub fn set_upper(&mut self, i: usize, j: usize, value: f64) {
        if i != j {
            self.data[(i.min(j), i.max(j))] = value;
        }
    }

    pub fn set_lower(&mut self, i: usize, j: usize, value: f64) {
        if i != j {
            self.data[(i.max(j), i.min(j))] = value;
        }
    }

    pub fn set_bounds(&mut self, i: usize, j: usize, lower: f64, upper: f64) {
        self.set_lower(i, j, lower);
        self.set_upper(i, j, upper);
    }

    /// Returns a copy with `extra` unconstrained points appended.
    pub fn expanded(&self, extra: usize) -> BoundsMatrix {
        let n = self.len();
        let mut expanded = BoundsMatrix::new(n + extra);
        expanded.data.view_mut((0, 0), (n, n)).copy_from(&self.data);
        expanded
    }

    /// Tightens all bounds with the triangle inequality (Floyd-Warshall order).
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError::Infeasible`] when some lower bound ends up above
    /// its upper bound, meaning no embedding can satisfy the matrix.
    pub fn smooth(&mut self) -> Result<(), BoundsError> {
        let n = self.len();
        for k in 0..n {
            for i in 0..n {
                if i == k {
                    continue;
                }
                let u_ik = self.upper(i, k);
                let l_ik = self.lower(i, k);
                for j in (i + 1)..n {
                    if j == k {
                        continue;
                    }
                    let u_kj = self.upper(k, j);
                    let l_kj = self.lower(k, j);

                    let through_k = u_ik + u_kj;
                    if self.data[(i, j)] > through_k {
                        self.data[(i, j)] = through_k;
                    }
                    let lower = (l_ik - u_kj).max(l_kj - u_ik);
                    if self.data[(j, i)] < lower {
                        self.data[(j, i)] = lower;
                    }
                    if self.data[(j, i)] - self.data[(i, j)] > SMOOTHING_TOLERANCE {
                        return Err(BoundsError::Infeasible(i, j));
                    }
                }
            }
        }
        Ok(())
    }

    /// Largest amount by which a set of coordinates violates the bounds.
    pub fn max_violation(&self, coords: &[nalgebra::Point3<f64>]) -> f64 {
        let n = self.len().min(coords.len());
        let mut worst = 0.0f64;
        for i in 0..n {
            for j in (i + 1)..n {
                let d = (coords[i] - coords[j]).norm();
                worst = worst
                    .max(d - self.upper(i, j))
                    .max(self.lower(i, j) - d);
            }
        }
        worst
    }
}

/// Computes the smoothed topological bounds matrix of a molecule.
///
/// Bonded pairs get the ideal bond length, 1-3 pairs the distance implied by
/// the ideal valence angle, 1-4 pairs the range between the cis and trans
/// torsions, and all other pairs a scaled van der Waals lower bound.
///
/// # Errors
///
/// Returns [`BoundsError::Infeasible`] if triangle smoothing fails.
pub fn molecule_bounds(mol: &Molecule) -> Result<BoundsMatrix, BoundsError> {
    let n = mol.atom_count();
    let mut bounds = BoundsMatrix::new(n);
    let topo = topological_distances(mol);

    for (bi, bond) in mol.bonds().iter().enumerate() {
        let d = ideal_bond_length(mol, bi);
        bounds.set_bounds(bond.atom1, bond.atom2, d - BOND_TOLERANCE, d + BOND_TOLERANCE);
    }

    let mut ranges: HashMap<(usize, usize), (f64, f64)> = HashMap::new();
    let mut widen = |i: usize, j: usize, lo: f64, hi: f64| {
        let entry = ranges.entry((i.min(j), i.max(j))).or_insert((lo, hi));
        entry.0 = entry.0.min(lo);
        entry.1 = entry.1.max(hi);
    };

    for center in 0..n {
        let neighbors: Vec<usize> = mol.neighbors(center).collect();
        for (&i, &j) in neighbors.iter().tuple_combinations() {
            if topo[i][j] != 2 {
                continue;
            }
            let d = law_of_cosines(
                pair_length(mol, i, center),
                pair_length(mol, center, j),
                ideal_angle(mol, i, center, j),
            );
            widen(i, j, d - ANGLE_TOLERANCE, d + ANGLE_TOLERANCE);
        }
    }

    for bond in mol.bonds() {
        for (a, b) in [(bond.atom1, bond.atom2), (bond.atom2, bond.atom1)] {
            for i in mol.neighbors(a).filter(|&i| i != b) {
                for j in mol.neighbors(b).filter(|&j| j != a) {
                    if i == j || topo[i][j] != 3 {
                        continue;
                    }
                    let (cis, trans) = torsion_range(
                        pair_length(mol, i, a),
                        pair_length(mol, a, b),
                        pair_length(mol, b, j),
                        ideal_angle(mol, i, a, b),
                        ideal_angle(mol, a, b, j),
                    );
                    widen(i, j, cis - TORSION_TOLERANCE, trans + TORSION_TOLERANCE);
                }
            }
        }
    }

    for ((i, j), (lo, hi)) in ranges {
        bounds.set_bounds(i, j, lo.max(0.0), hi);
    }

    for (i, j) in (0..n).tuple_combinations() {
        if topo[i][j] > 3 {
            let vdw = mol.atoms()[i].vdw_radius() + mol.atoms()[j].vdw_radius();
            bounds.set_lower(i, j, VDW_SCALE * vdw);
        }
    }

    bounds.smooth()?;
    Ok(bounds)
}

/// Ideal length of a bond from covalent radii, shortened for multiple bonds.
pub(crate) fn ideal_bond_length(mol: &Molecule, bond_idx: usize) -> f64 {
    let bond = &mol.bonds()[bond_idx];
    let radii = mol.atoms()[bond.atom1].covalent_radius() + mol.atoms()[bond.atom2].covalent_radius();
    radii
        - match bond.order {
            BondOrder::Single => 0.0,
            BondOrder::Aromatic => 0.1,
            BondOrder::Double => 0.2,
            BondOrder::Triple => 0.34,
        }
}

/// Ideal valence angle `i-center-j` in radians.
///
/// Atoms of a common three-, four- or five-membered ring take the planar
/// polygon angle; otherwise the angle follows the center's hybridization.
pub(crate) fn ideal_angle(mol: &Molecule, i: usize, center: usize, j: usize) -> f64 {
    let small_ring = mol
        .ring_info()
        .atom_rings()
        .iter()
        .filter(|ring| ring.len() <= 5)
        .filter(|ring| ring.contains(&i) && ring.contains(&center) && ring.contains(&j))
        .map(Vec::len)
        .min();
    if let Some(size) = small_ring {
        return (size as f64 - 2.0) * PI / size as f64;
    }

    let atom = &mol.atoms()[center];
    let (doubles, triples) = mol
        .neighbor_bonds(center)
        .iter()
        .fold((0, 0), |(d, t), &(_, bi)| match mol.bonds()[bi].order {
            BondOrder::Double => (d + 1, t),
            BondOrder::Triple => (d, t + 1),
            _ => (d, t),
        });

    let degrees = if triples > 0 || doubles >= 2 {
        180.0
    } else if doubles == 1 || atom.is_aromatic {
        120.0
    } else {
        TETRAHEDRAL_ANGLE
    };
    degrees.to_radians()
}

fn pair_length(mol: &Molecule, a: usize, b: usize) -> f64 {
    mol.bond_index_between(a, b)
        .map(|bi| ideal_bond_length(mol, bi))
        .unwrap_or_else(|| mol.atoms()[a].covalent_radius() + mol.atoms()[b].covalent_radius())
}

fn law_of_cosines(a: f64, b: f64, angle: f64) -> f64 {
    (a * a + b * b - 2.0 * a * b * angle.cos()).max(0.0).sqrt()
}

/// Distances between the ends of `i-a-b-j` at torsion 0 and 180 degrees.
fn torsion_range(l1: f64, l2: f64, l3: f64, theta1: f64, theta2: f64) -> (f64, f64) {
    let i = Vector3::new(l1 * theta1.cos(), l1 * theta1.sin(), 0.0);
    let at = |phi: f64| {
        let j = Vector3::new(
            l2 - l3 * theta2.cos(),
            l3 * theta2.sin() * phi.cos(),
            l3 * theta2.sin() * phi.sin(),
        );
        (j - i).norm()
    };
    let (cis, trans) = (at(0.0), at(PI));
    (cis.min(trans), cis.max(trans))
}

/// Bond-count distances between all atom pairs; `usize::MAX` when disconnected.
pub(crate) fn topological_distances(mol: &Molecule) -> Vec<Vec<usize>> {
    let n = mol.atom_count();
    let mut distances = vec![vec![usize::MAX; n]; n];
    for start in 0..n {
        let row = &mut distances[start];
        row[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            let next = row[current] + 1;
            for neighbor in mol.neighbors(current) {
                if row[neighbor] == usize::MAX {
                    row[neighbor] = next;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    distances
}
