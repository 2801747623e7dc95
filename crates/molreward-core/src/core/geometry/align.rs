use super::utils::calculate_rmsd;
use crate::core::chem::crippen::CrippenContribution;
use crate::core::models::molecule::Molecule;
use nalgebra::{Matrix3, Point3, Rotation3, SymmetricEigen, Vector3};
use thiserror::Error;
use tracing::{instrument, trace};

const MIN_PAIRS: usize = 3;
const PAIR_CUTOFF: f64 = 3.0;
const PAIR_WIDTH: f64 = 1.0;
const LOG_P_SCALE: f64 = 0.5;
const MR_SCALE: f64 = 2.0;
const MAX_REFINEMENTS: usize = 20;
const AUTOMORPHISM_LIMIT: usize = 1000;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignError {
    #[error("Point sets differ in size: {0} vs {1}")]
    SizeMismatch(usize, usize),
    #[error("Cannot align empty point sets")]
    Empty,
    #[error("At least {MIN_PAIRS} corresponding atom pairs are required, found {0}")]
    TooFewPairs(usize),
    #[error("Singular value decomposition did not converge")]
    Decomposition,
    #[error("Conformer {0} does not exist")]
    MissingConformer(usize),
    #[error("Expected {expected} atomic contributions, found {found}")]
    ContributionMismatch { expected: usize, found: usize },
}

/// A proper rotation followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self {
            rotation: Rotation3::identity(),
            translation: Vector3::zeros(),
        }
    }
}

impl RigidTransform {
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.rotation * point + self.translation
    }

    pub fn apply_all(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// Rotation about `from` followed by a move of `from` onto `to`.
    fn about(rotation: Rotation3<f64>, from: &Point3<f64>, to: &Point3<f64>) -> Self {
        Self {
            rotation,
            translation: to.coords - rotation * from.coords,
        }
    }
}

/// Optimal superposition of `mobile` onto `reference` (Kabsch algorithm).
///
/// # Arguments
///
/// * `mobile` - Points to be moved.
/// * `reference` - Target points, paired with `mobile` by index.
/// * `weights` - Optional per-pair weights; uniform when `None`.
///
/// # Errors
///
/// Returns [`AlignError::SizeMismatch`] or [`AlignError::Empty`] for unusable
/// inputs and [`AlignError::Decomposition`] if the SVD fails.
pub fn kabsch(
    mobile: &[Point3<f64>],
    reference: &[Point3<f64>],
    weights: Option<&[f64]>,
) -> Result<RigidTransform, AlignError> {
    if mobile.len() != reference.len() {
        return Err(AlignError::SizeMismatch(mobile.len(), reference.len()));
    }
    if mobile.is_empty() {
        return Err(AlignError::Empty);
    }
    let weight = |i: usize| weights.and_then(|w| w.get(i).copied()).unwrap_or(1.0);
    let total: f64 = (0..mobile.len()).map(weight).sum();
    if total <= 0.0 {
        return Err(AlignError::Empty);
    }

    let center = |points: &[Point3<f64>]| {
        let sum: Vector3<f64> = points
            .iter()
            .enumerate()
            .map(|(i, p)| p.coords * weight(i))
            .sum();
        Point3::from(sum / total)
    };
    let mobile_center = center(mobile);
    let reference_center = center(reference);

    let mut covariance = Matrix3::zeros();
    for (i, (m, r)) in mobile.iter().zip(reference).enumerate() {
        covariance += (m - mobile_center) * (r - reference_center).transpose() * weight(i);
    }

    let svd = covariance.svd(true, true);
    let u = svd.u.ok_or(AlignError::Decomposition)?;
    let v_t = svd.v_t.ok_or(AlignError::Decomposition)?;
    let v = v_t.transpose();
    let d = (v * u.transpose()).determinant().signum();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d));
    let rotation = Rotation3::from_matrix_unchecked(v * correction * u.transpose());

    Ok(RigidTransform::about(
        rotation,
        &mobile_center,
        &reference_center,
    ))
}

/// RMSD of two point sets after optimal superposition.
pub fn aligned_rmsd(mobile: &[Point3<f64>], reference: &[Point3<f64>]) -> Result<f64, AlignError> {
    let transform = kabsch(mobile, reference, None)?;
    calculate_rmsd(&transform.apply_all(mobile), reference).ok_or(AlignError::Empty)
}

/// Lowest aligned RMSD between two conformers of one molecule over its
/// symmetry-equivalent atom orderings.
///
/// # Errors
///
/// Returns [`AlignError::MissingConformer`] if either conformer id is invalid.
pub fn best_rms(mol: &Molecule, probe_id: usize, reference_id: usize) -> Result<f64, AlignError> {
    let probe = mol
        .conformer(probe_id)
        .ok_or(AlignError::MissingConformer(probe_id))?;
    let reference = mol
        .conformer(reference_id)
        .ok_or(AlignError::MissingConformer(reference_id))?;
    best_rms_between(mol, probe, reference)
}

/// [`best_rms`] for two coordinate sets indexed like `mol`'s atoms.
pub fn best_rms_between(
    mol: &Molecule,
    probe: &[Point3<f64>],
    reference: &[Point3<f64>],
) -> Result<f64, AlignError> {
    if probe.len() != reference.len() {
        return Err(AlignError::SizeMismatch(probe.len(), reference.len()));
    }
    let mut best = aligned_rmsd(probe, reference)?;
    for mapping in automorphisms(mol, AUTOMORPHISM_LIMIT) {
        let permuted: Vec<Point3<f64>> = mapping.iter().map(|&m| probe[m]).collect();
        best = best.min(aligned_rmsd(&permuted, reference)?);
    }
    Ok(best)
}

/// Graph automorphisms of `mol`, as `mapping[atom] = image`, at most `limit`.
///
/// Atoms only map onto atoms with the same element, charge, aromaticity,
/// degree and hydrogen count, and bonds must keep their order.
pub fn automorphisms(mol: &Molecule, limit: usize) -> Vec<Vec<usize>> {
    let n = mol.atom_count();
    let mut found = Vec::new();
    if n == 0 {
        return found;
    }
    let order = traversal_order(mol);
    let mut mapping = vec![usize::MAX; n];
    let mut used = vec![false; n];
    extend_automorphism(mol, &order, 0, &mut mapping, &mut used, &mut found, limit);
    found
}

fn traversal_order(mol: &Molecule) -> Vec<usize> {
    let n = mol.atom_count();
    let mut seen = vec![false; n];
    let mut order = Vec::with_capacity(n);
    for start in 0..n {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        let mut queue = std::collections::VecDeque::from([start]);
        while let Some(atom) = queue.pop_front() {
            order.push(atom);
            for neighbor in mol.neighbors(atom) {
                if !seen[neighbor] {
                    seen[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }
    order
}

fn atoms_equivalent(mol: &Molecule, a: usize, b: usize) -> bool {
    let (x, y) = (&mol.atoms()[a], &mol.atoms()[b]);
    x.atomic_number == y.atomic_number
        && x.formal_charge == y.formal_charge
        && x.is_aromatic == y.is_aromatic
        && x.implicit_hydrogens == y.implicit_hydrogens
        && mol.degree(a) == mol.degree(b)
}

fn extend_automorphism(
    mol: &Molecule,
    order: &[usize],
    depth: usize,
    mapping: &mut Vec<usize>,
    used: &mut Vec<bool>,
    found: &mut Vec<Vec<usize>>,
    limit: usize,
) {
    if found.len() >= limit {
        return;
    }
    if depth == order.len() {
        found.push(mapping.clone());
        return;
    }
    let atom = order[depth];
    for candidate in 0..mol.atom_count() {
        if used[candidate] || !atoms_equivalent(mol, atom, candidate) {
            continue;
        }
        let mapped_neighbors = mol
            .neighbor_bonds(atom)
            .iter()
            .filter(|&&(nb, _)| mapping[nb] != usize::MAX)
            .count();
        let consistent = mol.neighbor_bonds(atom).iter().all(|&(nb, bi)| {
            let image = mapping[nb];
            image == usize::MAX
                || mol
                    .bond_between(candidate, image)
                    .is_some_and(|b| b.order == mol.bonds()[bi].order)
        });
        let candidate_mapped = mol.neighbors(candidate).filter(|&nb| used[nb]).count();
        if !consistent || candidate_mapped != mapped_neighbors {
            continue;
        }

        mapping[atom] = candidate;
        used[candidate] = true;
        extend_automorphism(mol, order, depth + 1, mapping, used, found, limit);
        used[candidate] = false;
        mapping[atom] = usize::MAX;
        if found.len() >= limit {
            return;
        }
    }
}

/// Result of a contribution-guided alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct ContribAlignment {
    pub transform: RigidTransform,
    /// Sum of pair scores of the final correspondence.
    pub score: f64,
    /// RMSD over the final corresponding atom pairs.
    pub rmsd: f64,
    /// `(probe_atom, reference_atom)` pairs of the final correspondence.
    pub pairs: Vec<(usize, usize)>,
}

/// Aligns a probe conformer onto a reference conformer using per-atom
/// Crippen contributions to decide which atoms should overlap.
///
/// Both heavy-atom sets are centered and their principal axes matched, giving
/// four proper starting orientations plus the unrotated one. From each start
/// a greedy correspondence is built (pairs within the cutoff ranked by
/// contribution similarity and distance) and refined by weighted Kabsch
/// superposition until it stops changing. The best-scoring start wins and is
/// applied to every atom of the probe conformer in place.
///
/// # Errors
///
/// Returns [`AlignError::TooFewPairs`] if no start reaches three pairs, and
/// [`AlignError::MissingConformer`] / [`AlignError::ContributionMismatch`]
/// for inconsistent inputs.
#[instrument(level = "trace", skip_all, fields(probe_id, reference_id))]
pub fn align_by_contributions(
    probe: &mut Molecule,
    probe_id: usize,
    probe_contribs: &[CrippenContribution],
    reference: &Molecule,
    reference_id: usize,
    reference_contribs: &[CrippenContribution],
) -> Result<ContribAlignment, AlignError> {
    if probe_contribs.len() != probe.atom_count() {
        return Err(AlignError::ContributionMismatch {
            expected: probe.atom_count(),
            found: probe_contribs.len(),
        });
    }
    if reference_contribs.len() != reference.atom_count() {
        return Err(AlignError::ContributionMismatch {
            expected: reference.atom_count(),
            found: reference_contribs.len(),
        });
    }
    let probe_conf = probe
        .conformer(probe_id)
        .ok_or(AlignError::MissingConformer(probe_id))?;
    let reference_conf = reference
        .conformer(reference_id)
        .ok_or(AlignError::MissingConformer(reference_id))?;

    let probe_atoms = heavy_atoms(probe);
    let reference_atoms = heavy_atoms(reference);
    if probe_atoms.len() < MIN_PAIRS || reference_atoms.len() < MIN_PAIRS {
        return Err(AlignError::TooFewPairs(
            probe_atoms.len().min(reference_atoms.len()),
        ));
    }

    let probe_points: Vec<Point3<f64>> = probe_atoms.iter().map(|&i| probe_conf[i]).collect();
    let reference_points: Vec<Point3<f64>> =
        reference_atoms.iter().map(|&i| reference_conf[i]).collect();

    let similarity: Vec<Vec<f64>> = probe_atoms
        .iter()
        .map(|&p| {
            reference_atoms
                .iter()
                .map(|&r| contribution_similarity(&probe_contribs[p], &reference_contribs[r]))
                .collect()
        })
        .collect();

    let mut best: Option<(RigidTransform, f64, Vec<(usize, usize)>)> = None;
    let mut most_pairs = 0;
    for start in starting_transforms(&probe_points, &reference_points) {
        let mut transform = start;
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut score = 0.0;
        for _ in 0..MAX_REFINEMENTS {
            let moved = transform.apply_all(&probe_points);
            let (next_pairs, next_score) = greedy_pairs(&moved, &reference_points, &similarity);
            most_pairs = most_pairs.max(next_pairs.len());
            if next_pairs.len() < MIN_PAIRS {
                pairs.clear();
                break;
            }
            let converged = next_pairs == pairs;
            pairs = next_pairs;
            score = next_score;
            if converged {
                break;
            }
            let mobile: Vec<Point3<f64>> = pairs.iter().map(|&(p, _)| probe_points[p]).collect();
            let target: Vec<Point3<f64>> =
                pairs.iter().map(|&(_, r)| reference_points[r]).collect();
            let weights: Vec<f64> = pairs.iter().map(|&(p, r)| similarity[p][r]).collect();
            transform = kabsch(&mobile, &target, Some(&weights))?;
        }
        if pairs.len() >= MIN_PAIRS && best.as_ref().is_none_or(|(_, s, _)| score > *s) {
            best = Some((transform, score, pairs));
        }
    }

    let Some((transform, score, pairs)) = best else {
        return Err(AlignError::TooFewPairs(most_pairs));
    };

    let moved: Vec<Point3<f64>> = pairs
        .iter()
        .map(|&(p, _)| transform.apply(&probe_points[p]))
        .collect();
    let target: Vec<Point3<f64>> = pairs.iter().map(|&(_, r)| reference_points[r]).collect();
    let rmsd = calculate_rmsd(&moved, &target).unwrap_or(0.0);
    let pairs: Vec<(usize, usize)> = pairs
        .into_iter()
        .map(|(p, r)| (probe_atoms[p], reference_atoms[r]))
        .collect();
    trace!(score, rmsd, pairs = pairs.len(), "Contribution alignment finished");

    if let Some(conf) = probe.conformer_mut(probe_id) {
        for point in conf.iter_mut() {
            *point = transform.apply(point);
        }
    }

    Ok(ContribAlignment {
        transform,
        score,
        rmsd,
        pairs,
    })
}

fn heavy_atoms(mol: &Molecule) -> Vec<usize> {
    (0..mol.atom_count())
        .filter(|&i| !mol.atoms()[i].is_hydrogen())
        .collect()
}

fn contribution_similarity(a: &CrippenContribution, b: &CrippenContribution) -> f64 {
    (-(a.log_p - b.log_p).abs() / LOG_P_SCALE).exp() * (-(a.mr - b.mr).abs() / MR_SCALE).exp()
}

/// Unique pairs taken best first by `similarity * exp(-d² / width)`.
fn greedy_pairs(
    probe: &[Point3<f64>],
    reference: &[Point3<f64>],
    similarity: &[Vec<f64>],
) -> (Vec<(usize, usize)>, f64) {
    let mut candidates: Vec<(f64, usize, usize)> = Vec::new();
    for (p, pp) in probe.iter().enumerate() {
        for (r, rp) in reference.iter().enumerate() {
            let d2 = (pp - rp).norm_squared();
            if d2 < PAIR_CUTOFF * PAIR_CUTOFF {
                candidates.push((similarity[p][r] * (-d2 / PAIR_WIDTH).exp(), p, r));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    let mut probe_used = vec![false; probe.len()];
    let mut reference_used = vec![false; reference.len()];
    let mut pairs = Vec::new();
    let mut score = 0.0;
    for (value, p, r) in candidates {
        if probe_used[p] || reference_used[r] {
            continue;
        }
        probe_used[p] = true;
        reference_used[r] = true;
        pairs.push((p, r));
        score += value;
    }
    pairs.sort_unstable();
    (pairs, score)
}

fn principal_axes(points: &[Point3<f64>], center: &Point3<f64>) -> Matrix3<f64> {
    let mut covariance = Matrix3::zeros();
    for p in points {
        let d = p - center;
        covariance += d * d.transpose();
    }
    let eigen = SymmetricEigen::new(covariance);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let mut axes = Matrix3::from_columns(&[
        eigen.eigenvectors.column(order[0]).into_owned(),
        eigen.eigenvectors.column(order[1]).into_owned(),
        eigen.eigenvectors.column(order[2]).into_owned(),
    ]);
    if axes.determinant() < 0.0 {
        let flipped = -axes.column(2);
        axes.set_column(2, &flipped);
    }
    axes
}

fn starting_transforms(probe: &[Point3<f64>], reference: &[Point3<f64>]) -> Vec<RigidTransform> {
    let (Some(probe_center), Some(reference_center)) = (
        super::utils::centroid(probe),
        super::utils::centroid(reference),
    ) else {
        return Vec::new();
    };
    let probe_axes = principal_axes(probe, &probe_center);
    let reference_axes = principal_axes(reference, &reference_center);

    let mut starts = vec![RigidTransform::about(
        Rotation3::identity(),
        &probe_center,
        &reference_center,
    )];
    for (s1, s2) in [(1.0, 1.0), (1.0, -1.0), (-1.0, 1.0), (-1.0, -1.0)] {
        let signs = Matrix3::from_diagonal(&Vector3::new(s1, s2, s1 * s2));
        let rotation =
            Rotation3::from_matrix_unchecked(reference_axes * signs * probe_axes.transpose());
        starts.push(RigidTransform::about(
            rotation,
            &probe_center,
            &reference_center,
        ));
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chem::crippen::crippen_contributions;
    use crate::core::io::smiles::parse_smiles;

    fn sample_points() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(2.0, 1.4, 0.0),
            Point3::new(3.5, 1.5, 0.6),
            Point3::new(4.1, 2.9, 0.2),
        ]
    }

    fn rotated(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        let transform = RigidTransform {
            rotation: Rotation3::from_euler_angles(0.3, -1.1, 2.0),
            translation: Vector3::new(5.0, -2.0, 1.0),
        };
        transform.apply_all(points)
    }

    #[test]
    fn kabsch_recovers_a_rigid_motion() {
        let reference = sample_points();
        let mobile = rotated(&reference);
        let transform = kabsch(&mobile, &reference, None).unwrap();
        let aligned = transform.apply_all(&mobile);
        assert!(calculate_rmsd(&aligned, &reference).unwrap() < 1e-8);
        assert!((transform.rotation.matrix().determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn kabsch_rejects_mismatched_inputs() {
        let points = sample_points();
        assert_eq!(
            kabsch(&points[..2], &points, None),
            Err(AlignError::SizeMismatch(2, 5))
        );
        assert_eq!(kabsch(&[], &[], None), Err(AlignError::Empty));
    }

    #[test]
    fn aligned_rmsd_is_zero_for_rigid_copies() {
        let reference = sample_points();
        assert!(aligned_rmsd(&rotated(&reference), &reference).unwrap() < 1e-8);
    }

    #[test]
    fn best_rms_accounts_for_symmetry() {
        let mut mol = parse_smiles("CC(C)(C)O").unwrap();
        let conf = vec![
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(-0.5, 1.4, 0.0),
            Point3::new(-0.5, -0.7, 1.2),
            Point3::new(-0.5, -0.7, -1.2),
        ];
        let mut swapped = conf.clone();
        swapped.swap(0, 2);
        mol.add_conformer(conf).unwrap();
        mol.add_conformer(swapped).unwrap();
        assert!(best_rms(&mol, 0, 1).unwrap() < 1e-6);
        assert_eq!(best_rms(&mol, 0, 5), Err(AlignError::MissingConformer(5)));
    }

    #[test]
    fn automorphisms_of_benzene() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(automorphisms(&mol, 100).len(), 12);
        assert_eq!(automorphisms(&mol, 5).len(), 5);
        let ethanol = parse_smiles("CCO").unwrap();
        assert_eq!(automorphisms(&ethanol, 100).len(), 1);
    }

    #[test]
    fn contribution_alignment_superimposes_a_moved_copy() {
        let mut reference = parse_smiles("CCCCO").unwrap();
        reference.add_conformer(sample_points()).unwrap();
        let mut probe = reference.clone();
        probe.clear_conformers();
        probe.add_conformer(rotated(&sample_points())).unwrap();

        let contribs = crippen_contributions(&reference);
        let result =
            align_by_contributions(&mut probe, 0, &contribs, &reference, 0, &contribs).unwrap();
        assert!(result.rmsd < 1e-3);
        assert_eq!(result.pairs.len(), 5);
        let aligned = probe.conformer(0).unwrap();
        assert!(calculate_rmsd(aligned, reference.conformer(0).unwrap()).unwrap() < 1e-3);
    }

    #[test]
    fn contribution_alignment_needs_three_heavy_atoms() {
        let mut reference = parse_smiles("CO").unwrap();
        reference
            .add_conformer(vec![Point3::origin(), Point3::new(1.4, 0.0, 0.0)])
            .unwrap();
        let mut probe = reference.clone();
        let contribs = crippen_contributions(&reference);
        assert_eq!(
            align_by_contributions(&mut probe, 0, &contribs, &reference, 0, &contribs),
            Err(AlignError::TooFewPairs(2))
        );
    }
}
