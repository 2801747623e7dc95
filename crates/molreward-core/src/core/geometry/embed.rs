use super::bounds::{BoundsError, BoundsMatrix, DEFAULT_UPPER, molecule_bounds};
use super::forcefield::{DEFAULT_MAX_ITERATIONS, ForceField, descend};
use crate::core::models::molecule::{Conformer, Molecule, MoleculeError};
use nalgebra::{DMatrix, Point3, SymmetricEigen, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, instrument, trace};

const DEFAULT_SEED: u64 = 42;
const ATTEMPTS_PER_CONFORMER: usize = 10;
const REFINE_ITERATIONS: usize = 400;
const WEIGHTED_PAIR_FACTOR: f64 = 5.0;
const EIGENVALUE_EPSILON: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmbedError {
    #[error("Bounds matrix is infeasible: {0}")]
    Bounds(#[from] BoundsError),
    #[error("Metric matrix has {found} positive eigenvalues, {required} are required")]
    DegenerateMetric { found: usize, required: usize },
    #[error("Embedding produced non-finite coordinates")]
    NonFinite,
    #[error("No embedding succeeded after {0} attempts")]
    AttemptsExhausted(usize),
    #[error("Failed to attach conformer: {0}")]
    Molecule(#[from] MoleculeError),
}

/// Embeds the points of a bounds matrix in 3D by distance geometry.
///
/// A trial distance is drawn uniformly inside each pair's bounds, the metric
/// matrix of those distances is diagonalized and its three leading eigenpairs
/// give initial coordinates. The coordinates are then refined by minimizing
/// the bound-violation error, with pairs between `weighted` points counted
/// more heavily.
///
/// # Arguments
///
/// * `bounds` - Smoothed bounds matrix of the points to embed.
/// * `weighted` - Points whose mutual bounds should be favored during refinement.
/// * `rng` - Random source for the trial distances.
///
/// # Errors
///
/// Returns [`EmbedError::DegenerateMetric`] when the metric matrix has fewer
/// positive eigenvalues than the point set has dimensions (at most three), and
/// [`EmbedError::NonFinite`] if refinement diverges.
#[instrument(level = "trace", skip_all, fields(points = bounds.len()))]
pub fn embed_points(
    bounds: &BoundsMatrix,
    weighted: &[usize],
    rng: &mut impl Rng,
) -> Result<Vec<Point3<f64>>, EmbedError> {
    let n = bounds.len();
    if n <= 1 {
        return Ok(vec![Point3::origin(); n]);
    }

    let mut distances = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let (lower, upper) = (bounds.lower(i, j), bounds.upper(i, j));
            let d = if upper > lower {
                rng.gen_range(lower..upper)
            } else {
                lower
            };
            distances[(i, j)] = d;
            distances[(j, i)] = d;
        }
    }

    let mut coords = metric_coordinates(&distances)?;

    let weighted: HashSet<usize> = weighted.iter().copied().collect();
    descend(&mut coords, REFINE_ITERATIONS, |c| {
        violation_error(bounds, &weighted, c)
    });

    if coords.iter().any(|p| p.coords.iter().any(|v| !v.is_finite())) {
        return Err(EmbedError::NonFinite);
    }
    Ok(coords)
}

fn metric_coordinates(distances: &DMatrix<f64>) -> Result<Vec<Point3<f64>>, EmbedError> {
    let n = distances.nrows();
    let nf = n as f64;
    let squared = distances.map(|d| d * d);

    let total: f64 = (0..n)
        .flat_map(|j| ((j + 1)..n).map(move |k| (j, k)))
        .map(|(j, k)| squared[(j, k)])
        .sum();
    let d0: Vec<f64> = (0..n)
        .map(|i| squared.row(i).sum() / nf - total / (nf * nf))
        .collect();

    let metric = DMatrix::from_fn(n, n, |i, j| 0.5 * (d0[i] + d0[j] - squared[(i, j)]));
    let eigen = SymmetricEigen::new(metric);

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let leading: Vec<usize> = order.into_iter().take(3).collect();

    let required = (n - 1).min(3);
    let found = leading
        .iter()
        .filter(|&&k| eigen.eigenvalues[k] > EIGENVALUE_EPSILON)
        .count();
    if found < required {
        return Err(EmbedError::DegenerateMetric { found, required });
    }

    Ok((0..n)
        .map(|i| {
            let mut p = [0.0; 3];
            for (axis, &k) in leading.iter().enumerate() {
                let lambda = eigen.eigenvalues[k];
                if lambda > EIGENVALUE_EPSILON {
                    p[axis] = lambda.sqrt() * eigen.eigenvectors[(i, k)];
                }
            }
            Point3::new(p[0], p[1], p[2])
        })
        .collect())
}

/// Squared relative violation of every pair's bounds, with gradient.
fn violation_error(
    bounds: &BoundsMatrix,
    weighted: &HashSet<usize>,
    coords: &[Point3<f64>],
) -> (f64, Vec<Vector3<f64>>) {
    let n = coords.len();
    let mut error = 0.0;
    let mut gradient = vec![Vector3::zeros(); n];

    for i in 0..n {
        for j in (i + 1)..n {
            let weight = if weighted.contains(&i) && weighted.contains(&j) {
                WEIGHTED_PAIR_FACTOR
            } else {
                1.0
            };
            let delta = coords[i] - coords[j];
            let d2 = delta.norm_squared();
            let upper = bounds.upper(i, j);
            let lower = bounds.lower(i, j);

            if upper < DEFAULT_UPPER && d2 > upper * upper {
                let u2 = upper * upper;
                let value = d2 / u2 - 1.0;
                error += weight * value * value;
                let g = delta * (4.0 * weight * value / u2);
                gradient[i] += g;
                gradient[j] -= g;
            } else if lower > 0.0 && d2 < lower * lower {
                let l2 = lower * lower;
                let denom = l2 + d2;
                let value = 2.0 * l2 / denom - 1.0;
                error += weight * value * value;
                let g = delta * (-8.0 * weight * value * l2 / (denom * denom));
                gradient[i] += g;
                gradient[j] -= g;
            }
        }
    }
    (error, gradient)
}

/// Deterministic conformer generation from a fixed seed.
///
/// Each conformer is a distance-geometry embedding of the molecule's
/// topological bounds, cleaned up with the [`ForceField`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConformerGenerator {
    seed: u64,
}

impl Default for ConformerGenerator {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
        }
    }
}

impl ConformerGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generates up to `count` conformers.
    ///
    /// Failed attempts are retried, up to ten per requested conformer.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Bounds`] if the molecule's bounds are infeasible
    /// and [`EmbedError::AttemptsExhausted`] if not a single attempt succeeded.
    #[instrument(level = "debug", skip(self, mol), fields(atoms = mol.atom_count(), seed = self.seed))]
    pub fn generate(&self, mol: &Molecule, count: usize) -> Result<Vec<Conformer>, EmbedError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let bounds = molecule_bounds(mol)?;
        let forcefield = ForceField::new(mol);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let max_attempts = count * ATTEMPTS_PER_CONFORMER;
        let mut conformers = Vec::with_capacity(count);
        let mut attempts = 0;
        while conformers.len() < count && attempts < max_attempts {
            attempts += 1;
            match embed_points(&bounds, &[], &mut rng) {
                Ok(mut coords) => {
                    forcefield.minimize(&mut coords, DEFAULT_MAX_ITERATIONS);
                    conformers.push(coords);
                }
                Err(e) => trace!(attempt = attempts, error = %e, "Embedding attempt failed"),
            }
        }

        if conformers.is_empty() {
            return Err(EmbedError::AttemptsExhausted(attempts));
        }
        if conformers.len() < count {
            debug!(
                generated = conformers.len(),
                requested = count,
                "Fewer conformers generated than requested"
            );
        }
        Ok(conformers)
    }

    /// Replaces the molecule's conformers with `count` freshly generated ones and
    /// returns how many were attached.
    pub fn embed_into(&self, mol: &mut Molecule, count: usize) -> Result<usize, EmbedError> {
        let conformers = self.generate(mol, count)?;
        mol.clear_conformers();
        for conformer in conformers {
            mol.add_conformer(conformer)?;
        }
        Ok(mol.conformers().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles::parse_smiles;

    #[test]
    fn embedding_respects_bond_bounds() {
        let mol = parse_smiles("CCCCO").unwrap();
        let bounds = molecule_bounds(&mol).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let coords = embed_points(&bounds, &[], &mut rng).unwrap();
        assert_eq!(coords.len(), 5);
        for bond in mol.bonds() {
            let d = (coords[bond.atom1] - coords[bond.atom2]).norm();
            assert!((d - 1.5).abs() < 0.3, "bond length {d}");
        }
    }

    #[test]
    fn single_point_embeds_at_origin() {
        let bounds = BoundsMatrix::new(1);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(embed_points(&bounds, &[], &mut rng).unwrap(), vec![Point3::origin()]);
    }

    #[test]
    fn coincident_points_are_a_degenerate_metric() {
        let mut bounds = BoundsMatrix::new(4);
        for i in 0..4 {
            for j in (i + 1)..4 {
                bounds.set_bounds(i, j, 0.0, 0.0);
            }
        }
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            embed_points(&bounds, &[], &mut rng),
            Err(EmbedError::DegenerateMetric { .. })
        ));
    }

    #[test]
    fn generator_is_deterministic_for_a_seed() {
        let mol = parse_smiles("CC(=O)Nc1ccccc1").unwrap();
        let a = ConformerGenerator::new(42).generate(&mol, 2).unwrap();
        let b = ConformerGenerator::new(42).generate(&mol, 2).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn embed_into_replaces_conformers() {
        let mut mol = parse_smiles("OCCO").unwrap().with_explicit_hydrogens();
        let attached = ConformerGenerator::default()
            .embed_into(&mut mol, 3)
            .unwrap();
        assert_eq!(attached, 3);
        assert_eq!(mol.conformers().len(), 3);
        assert_eq!(mol.conformers()[0].len(), mol.atom_count());
    }

    #[test]
    fn zero_conformers_requested_is_not_an_error() {
        let mol = parse_smiles("C").unwrap();
        assert!(ConformerGenerator::default().generate(&mol, 0).unwrap().is_empty());
    }
}
