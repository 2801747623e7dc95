use super::bounds::{ideal_angle, ideal_bond_length, topological_distances};
use crate::core::models::molecule::Molecule;
use itertools::Itertools;
use nalgebra::{Point3, Vector3};
use tracing::trace;

const BOND_FORCE_CONSTANT: f64 = 350.0;
const ANGLE_FORCE_CONSTANT: f64 = 60.0;
const REPULSION_FORCE_CONSTANT: f64 = 10.0;
const REPULSION_SCALE: f64 = 0.7;

pub const DEFAULT_MAX_ITERATIONS: usize = 500;

#[inline]
pub fn harmonic_bond(dist: f64, r0: f64, k: f64) -> f64 {
    k * (dist - r0).powi(2)
}

#[inline]
pub fn harmonic_angle(theta: f64, theta0: f64, k: f64) -> f64 {
    k * (theta - theta0).powi(2)
}

#[inline]
pub fn soft_repulsion(dist: f64, r_min: f64, k: f64) -> f64 {
    if dist >= r_min {
        0.0
    } else {
        k * (r_min - dist).powi(2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct BondTerm {
    i: usize,
    j: usize,
    r0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AngleTerm {
    i: usize,
    center: usize,
    j: usize,
    theta0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RepulsionTerm {
    i: usize,
    j: usize,
    r_min: f64,
}

/// A light molecular-mechanics force field used to clean up embedded geometries.
///
/// Harmonic bond and angle terms pull toward the same ideal values the bounds
/// matrix is built from; pairs more than three bonds apart repel softly when
/// closer than a scaled van der Waals contact.
#[derive(Debug, Clone, Default)]
pub struct ForceField {
    bonds: Vec<BondTerm>,
    angles: Vec<AngleTerm>,
    repulsions: Vec<RepulsionTerm>,
}

impl ForceField {
    pub fn new(mol: &Molecule) -> Self {
        let bonds = mol
            .bonds()
            .iter()
            .enumerate()
            .map(|(bi, bond)| BondTerm {
                i: bond.atom1,
                j: bond.atom2,
                r0: ideal_bond_length(mol, bi),
            })
            .collect();

        let mut angles = Vec::new();
        for center in 0..mol.atom_count() {
            let neighbors: Vec<usize> = mol.neighbors(center).collect();
            for (&i, &j) in neighbors.iter().tuple_combinations() {
                angles.push(AngleTerm {
                    i,
                    center,
                    j,
                    theta0: ideal_angle(mol, i, center, j),
                });
            }
        }

        let topo = topological_distances(mol);
        let repulsions = (0..mol.atom_count())
            .tuple_combinations()
            .filter(|&(i, j)| topo[i][j] > 3)
            .map(|(i, j)| RepulsionTerm {
                i,
                j,
                r_min: REPULSION_SCALE
                    * (mol.atoms()[i].vdw_radius() + mol.atoms()[j].vdw_radius()),
            })
            .collect();

        Self {
            bonds,
            angles,
            repulsions,
        }
    }

    pub fn energy(&self, coords: &[Point3<f64>]) -> f64 {
        self.energy_and_gradient(coords).0
    }

    /// Total energy together with its gradient with respect to every coordinate.
    pub fn energy_and_gradient(&self, coords: &[Point3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let mut energy = 0.0;
        let mut gradient = vec![Vector3::zeros(); coords.len()];

        for term in &self.bonds {
            let delta = coords[term.i] - coords[term.j];
            let dist = delta.norm();
            energy += harmonic_bond(dist, term.r0, BOND_FORCE_CONSTANT);
            if dist > 1e-8 {
                let g = delta * (2.0 * BOND_FORCE_CONSTANT * (dist - term.r0) / dist);
                gradient[term.i] += g;
                gradient[term.j] -= g;
            }
        }

        for term in &self.angles {
            let u = coords[term.i] - coords[term.center];
            let v = coords[term.j] - coords[term.center];
            let (nu, nv) = (u.norm(), v.norm());
            if nu < 1e-8 || nv < 1e-8 {
                continue;
            }
            let cos = (u.dot(&v) / (nu * nv)).clamp(-1.0, 1.0);
            let theta = cos.acos();
            energy += harmonic_angle(theta, term.theta0, ANGLE_FORCE_CONSTANT);

            let sin = theta.sin();
            if sin < 1e-8 {
                continue;
            }
            let prefactor = -2.0 * ANGLE_FORCE_CONSTANT * (theta - term.theta0) / sin;
            let d_cos_du = v / (nu * nv) - u * (cos / (nu * nu));
            let d_cos_dv = u / (nu * nv) - v * (cos / (nv * nv));
            let gi = d_cos_du * prefactor;
            let gj = d_cos_dv * prefactor;
            gradient[term.i] += gi;
            gradient[term.j] += gj;
            gradient[term.center] -= gi + gj;
        }

        for term in &self.repulsions {
            let delta = coords[term.i] - coords[term.j];
            let dist = delta.norm();
            if dist >= term.r_min {
                continue;
            }
            energy += soft_repulsion(dist, term.r_min, REPULSION_FORCE_CONSTANT);
            if dist > 1e-8 {
                let g = delta * (-2.0 * REPULSION_FORCE_CONSTANT * (term.r_min - dist) / dist);
                gradient[term.i] += g;
                gradient[term.j] -= g;
            }
        }

        (energy, gradient)
    }

    /// Minimizes the energy in place and returns the final energy.
    pub fn minimize(&self, coords: &mut [Point3<f64>], max_iterations: usize) -> f64 {
        descend(coords, max_iterations, |c| self.energy_and_gradient(c))
    }
}

/// Steepest descent with an adaptive step: grown after an accepted move, halved
/// after a rejected one. Returns the final objective value.
pub(crate) fn descend<F>(coords: &mut [Point3<f64>], max_iterations: usize, objective: F) -> f64
where
    F: Fn(&[Point3<f64>]) -> (f64, Vec<Vector3<f64>>),
{
    let (mut value, mut gradient) = objective(coords);
    let mut step = 0.01;
    let mut trial = coords.to_vec();

    for iteration in 0..max_iterations {
        let grad_norm = gradient.iter().map(|g| g.norm_squared()).sum::<f64>().sqrt();
        if grad_norm < 1e-6 || step < 1e-12 {
            trace!(iteration, value, "Minimization converged");
            break;
        }
        let scale = step / grad_norm.max(1.0);
        for ((t, c), g) in trial.iter_mut().zip(coords.iter()).zip(&gradient) {
            *t = c - g * scale;
        }
        let (trial_value, trial_gradient) = objective(&trial);
        if trial_value < value {
            coords.copy_from_slice(&trial);
            value = trial_value;
            gradient = trial_gradient;
            step *= 1.2;
        } else {
            step *= 0.5;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles::parse_smiles;

    #[test]
    fn potentials_are_zero_at_their_minimum() {
        assert_eq!(harmonic_bond(1.5, 1.5, 100.0), 0.0);
        assert_eq!(harmonic_angle(2.0, 2.0, 100.0), 0.0);
        assert_eq!(soft_repulsion(3.0, 2.0, 10.0), 0.0);
        assert!(soft_repulsion(1.0, 2.0, 10.0) > 0.0);
    }

    #[test]
    fn minimize_restores_a_stretched_bond() {
        let mol = parse_smiles("CC").unwrap();
        let ff = ForceField::new(&mol);
        let mut coords = vec![Point3::origin(), Point3::new(2.5, 0.0, 0.0)];
        let before = ff.energy(&coords);
        let after = ff.minimize(&mut coords, 2000);
        assert!(after < before);
        assert!(((coords[0] - coords[1]).norm() - 1.52).abs() < 0.01);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mol = parse_smiles("CCO").unwrap();
        let ff = ForceField::new(&mol);
        let coords = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.4, 0.3, 0.1),
            Point3::new(2.1, 1.5, -0.2),
        ];
        let (_, gradient) = ff.energy_and_gradient(&coords);
        let h = 1e-6;
        for atom in 0..coords.len() {
            for axis in 0..3 {
                let mut plus = coords.clone();
                let mut minus = coords.clone();
                plus[atom][axis] += h;
                minus[atom][axis] -= h;
                let numeric = (ff.energy(&plus) - ff.energy(&minus)) / (2.0 * h);
                assert!((numeric - gradient[atom][axis]).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn distant_atoms_get_repulsion_terms_only() {
        let ff = ForceField::new(&parse_smiles("CCCCC").unwrap());
        assert_eq!(ff.bonds.len(), 4);
        assert_eq!(ff.angles.len(), 3);
        assert_eq!(ff.repulsions.len(), 1);
    }
}
