use super::error::PharmacophoreError;
use super::matching::{PharmacophoreMatch, constrained_bounds};
use super::model::Pharmacophore;
use crate::core::geometry::bounds::{BoundsMatrix, molecule_bounds};
use crate::core::geometry::embed::embed_points;
use crate::core::geometry::utils::centroid;
use crate::core::models::molecule::{Conformer, Molecule};
use itertools::Itertools;
use nalgebra::Point3;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, instrument, trace};

/// Slack allowed on the core distances of an embedding before it counts as failed.
const CORE_TOLERANCE: f64 = 0.5;

/// Result of embedding a molecule under the constraints of one match.
#[derive(Debug, Clone)]
pub struct PharmacophoreEmbedding {
    /// Smoothed molecule bounds including the pharmacophore constraints, or
    /// the plain molecule bounds if the constraints were infeasible.
    pub bounds: BoundsMatrix,
    /// Successful embeddings, one coordinate per molecule atom.
    pub conformers: Vec<Conformer>,
    /// Number of attempts that did not produce an acceptable embedding.
    pub failures: usize,
}

/// Embeds `mol` `count` times with the matched features pinned to the
/// pharmacophore distances.
///
/// Attempt `i` draws from a generator seeded with `i * 10 + 1`, so the
/// outcome depends only on the inputs. An attempt fails if embedding fails or
/// the resulting feature centroids stray from the core bounds by more than
/// half an angstrom.
///
/// # Errors
///
/// Returns [`PharmacophoreError::Bounds`] if the molecule's own bounds are
/// infeasible. Infeasible pharmacophore constraints are not an error: every
/// attempt is then counted as failed.
#[instrument(level = "debug", skip_all, fields(atoms = mol.atom_count(), count))]
pub fn embed_pharmacophore(
    mol: &Molecule,
    matched: &PharmacophoreMatch,
    pharmacophore: &Pharmacophore,
    count: usize,
) -> Result<PharmacophoreEmbedding, PharmacophoreError> {
    let bounds = molecule_bounds(mol)?;
    let groups = matched.atom_groups();
    let (constrained, representatives) = match constrained_bounds(&bounds, &groups, pharmacophore) {
        Ok(result) => result,
        Err(e) => {
            debug!(error = %e, "Pharmacophore constraints are infeasible for this match");
            return Ok(PharmacophoreEmbedding {
                bounds,
                conformers: Vec::new(),
                failures: count,
            });
        }
    };

    let atom_count = mol.atom_count();
    let mut conformers = Vec::with_capacity(count);
    let mut failures = 0;
    for attempt in 0..count {
        let mut rng = StdRng::seed_from_u64(attempt as u64 * 10 + 1);
        match embed_points(&constrained, &representatives, &mut rng) {
            Ok(mut coords) => {
                coords.truncate(atom_count);
                if satisfies_core(&coords, &groups, pharmacophore) {
                    conformers.push(coords);
                } else {
                    trace!(attempt, "Embedding violates the pharmacophore distances");
                    failures += 1;
                }
            }
            Err(e) => {
                trace!(attempt, error = %e, "Constrained embedding failed");
                failures += 1;
            }
        }
    }

    debug!(
        embedded = conformers.len(),
        failures, "Finished constrained embedding"
    );
    Ok(PharmacophoreEmbedding {
        bounds: constrained,
        conformers,
        failures,
    })
}

fn satisfies_core(coords: &[Point3<f64>], groups: &[Vec<usize>], pharmacophore: &Pharmacophore) -> bool {
    let Some(positions) = groups
        .iter()
        .map(|group| {
            let members: Vec<_> = group.iter().filter_map(|&idx| coords.get(idx).copied()).collect();
            centroid(&members)
        })
        .collect::<Option<Vec<_>>>()
    else {
        return false;
    };
    (0..positions.len()).tuple_combinations().all(|(i, j)| {
        let d = (positions[i] - positions[j]).norm();
        d <= pharmacophore.upper_bound(i, j) + CORE_TOLERANCE
            && d >= pharmacophore.lower_bound(i, j) - CORE_TOLERANCE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::factory::{FeatureFactory, PlacedFeature};
    use crate::core::features::family::FeatureFamily;
    use crate::core::io::smiles::parse_smiles;
    use crate::core::pharmacophore::matching::{all_matches, match_features};
    use crate::core::pharmacophore::model::LowerBoundMode;

    fn hydroxyl_core(distance: f64) -> Pharmacophore {
        let features = [
            PlacedFeature {
                family: FeatureFamily::Donor,
                position: Point3::origin(),
            },
            PlacedFeature {
                family: FeatureFamily::Donor,
                position: Point3::new(distance, 0.0, 0.0),
            },
        ];
        Pharmacophore::from_template(&features, &[0, 1], 1.0, 1.0, LowerBoundMode::Clamped).unwrap()
    }

    fn first_match(mol: &Molecule, core: &Pharmacophore) -> PharmacophoreMatch {
        let features = FeatureFactory::builtin().features_for(mol);
        let candidates = match_features(core, &features).unwrap();
        let bounds = molecule_bounds(mol).unwrap();
        all_matches(core, &candidates, &bounds).remove(0)
    }

    #[test]
    fn embeddings_place_the_matched_features_at_core_distances() {
        let mol = parse_smiles("OCCCCCCO").unwrap();
        let core = hydroxyl_core(6.0);
        let matched = first_match(&mol, &core);

        let result = embed_pharmacophore(&mol, &matched, &core, 3).unwrap();
        assert!(result.failures < 3);
        assert_eq!(result.conformers.len() + result.failures, 3);
        let (a, b) = (matched.features()[0].atom_ids[0], matched.features()[1].atom_ids[0]);
        for conformer in &result.conformers {
            assert_eq!(conformer.len(), mol.atom_count());
            let d = (conformer[a] - conformer[b]).norm();
            assert!(d > 5.0 - CORE_TOLERANCE && d < 7.0 + CORE_TOLERANCE, "distance {d}");
        }
    }

    #[test]
    fn embedding_is_deterministic() {
        let mol = parse_smiles("OCCCCCCO").unwrap();
        let core = hydroxyl_core(6.0);
        let matched = first_match(&mol, &core);
        let first = embed_pharmacophore(&mol, &matched, &core, 2).unwrap();
        let second = embed_pharmacophore(&mol, &matched, &core, 2).unwrap();
        assert_eq!(first.conformers, second.conformers);
        assert_eq!(first.failures, second.failures);
    }

    #[test]
    fn infeasible_constraints_fail_every_attempt() {
        let mol = parse_smiles("OCCCCCCO").unwrap();
        let core = hydroxyl_core(6.0);
        let matched = first_match(&mol, &core);
        let too_far = hydroxyl_core(30.0);

        let result = embed_pharmacophore(&mol, &matched, &too_far, 4).unwrap();
        assert_eq!(result.failures, 4);
        assert!(result.conformers.is_empty());
        assert_eq!(result.bounds.len(), mol.atom_count());
    }
}
