use super::model::Pharmacophore;
use crate::core::features::factory::Feature;
use crate::core::geometry::bounds::{BoundsError, BoundsMatrix};
use itertools::Itertools;
use tracing::{debug, trace};

/// Upper bound between a group's centroid point and each group member, as a
/// fraction of the group's largest member-member upper bound.
const CENTROID_SPAN_FACTOR: f64 = 0.6;

/// One molecule feature assigned to each pharmacophore feature, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PharmacophoreMatch {
    features: Vec<Feature>,
}

impl PharmacophoreMatch {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Atom ids of each matched feature.
    pub fn atom_groups(&self) -> Vec<Vec<usize>> {
        self.features.iter().map(|f| f.atom_ids.clone()).collect()
    }
}

/// Candidate molecule features for every pharmacophore feature, by family.
///
/// Returns `None` when some pharmacophore feature has no candidate at all.
pub fn match_features(pharmacophore: &Pharmacophore, features: &[Feature]) -> Option<Vec<Vec<Feature>>> {
    let candidates: Vec<Vec<Feature>> = pharmacophore
        .families()
        .map(|family| {
            features
                .iter()
                .filter(|f| f.family == family)
                .cloned()
                .collect::<Vec<_>>()
        })
        .collect();
    if candidates.iter().any(Vec::is_empty) {
        trace!("A pharmacophore feature has no candidate on the molecule");
        return None;
    }
    Some(candidates)
}

/// Every combination of candidates that is consistent with both the
/// pharmacophore bounds and the molecule's own distance bounds.
///
/// Combinations first pass a coarse screen on the first atom of each
/// feature; survivors have their pairwise pharmacophore bounds merged into a
/// copy of the molecule bounds, which must then smooth without conflict.
pub fn all_matches(
    pharmacophore: &Pharmacophore,
    candidates: &[Vec<Feature>],
    bounds: &BoundsMatrix,
) -> Vec<PharmacophoreMatch> {
    if candidates.len() != pharmacophore.len() || candidates.is_empty() {
        return Vec::new();
    }

    let mut screened_out = 0usize;
    let mut matches = Vec::new();
    for choice in candidates
        .iter()
        .map(|list| 0..list.len())
        .multi_cartesian_product()
    {
        let selected: Vec<&Feature> = choice
            .iter()
            .enumerate()
            .map(|(slot, &pick)| &candidates[slot][pick])
            .collect();
        if !coarse_screen(pharmacophore, &selected, bounds) {
            screened_out += 1;
            continue;
        }
        let groups: Vec<Vec<usize>> = selected.iter().map(|f| f.atom_ids.clone()).collect();
        if constrained_bounds(bounds, &groups, pharmacophore).is_err() {
            screened_out += 1;
            continue;
        }
        matches.push(PharmacophoreMatch::new(
            selected.into_iter().cloned().collect(),
        ));
    }
    debug!(
        accepted = matches.len(),
        rejected = screened_out,
        "Enumerated pharmacophore matches"
    );
    matches
}

fn coarse_screen(pharmacophore: &Pharmacophore, selected: &[&Feature], bounds: &BoundsMatrix) -> bool {
    (0..selected.len()).tuple_combinations().all(|(i, j)| {
        let (Some(&a), Some(&b)) = (selected[i].atom_ids.first(), selected[j].atom_ids.first())
        else {
            return false;
        };
        bounds.lower(a, b) < pharmacophore.upper_bound(i, j)
            && bounds.upper(a, b) > pharmacophore.lower_bound(i, j)
    })
}

/// Merges pharmacophore bounds into a copy of the molecule bounds.
///
/// Single-atom features are represented by their atom. Multi-atom features
/// get an extra point standing for their centroid, loosely tied to each
/// member. Returns the smoothed matrix and the representative point of every
/// feature.
pub(crate) fn constrained_bounds(
    bounds: &BoundsMatrix,
    groups: &[Vec<usize>],
    pharmacophore: &Pharmacophore,
) -> Result<(BoundsMatrix, Vec<usize>), BoundsError> {
    let extra = groups.iter().filter(|g| g.len() != 1).count();
    let mut augmented = bounds.expanded(extra);

    let mut next_point = bounds.len();
    let mut representatives = Vec::with_capacity(groups.len());
    for group in groups {
        if let [atom] = group.as_slice() {
            representatives.push(*atom);
            continue;
        }
        let point = next_point;
        next_point += 1;
        let span = group
            .iter()
            .tuple_combinations()
            .map(|(&a, &b)| bounds.upper(a, b))
            .fold(0.0, f64::max);
        for &member in group {
            augmented.set_bounds(point, member, 0.0, CENTROID_SPAN_FACTOR * span);
        }
        representatives.push(point);
    }

    for (i, j) in (0..groups.len()).tuple_combinations() {
        let (a, b) = (representatives[i], representatives[j]);
        let lower = pharmacophore.lower_bound(i, j).max(0.0);
        let upper = pharmacophore.upper_bound(i, j);
        if a == b {
            if lower > 0.0 {
                return Err(BoundsError::Infeasible(a, b));
            }
            continue;
        }
        let merged_lower = augmented.lower(a, b).max(lower);
        let merged_upper = augmented.upper(a, b).min(upper);
        if merged_lower > merged_upper {
            return Err(BoundsError::Infeasible(a, b));
        }
        augmented.set_bounds(a, b, merged_lower, merged_upper);
    }

    augmented.smooth()?;
    Ok((augmented, representatives))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::factory::{FeatureFactory, PlacedFeature};
    use crate::core::features::family::FeatureFamily;
    use crate::core::geometry::bounds::molecule_bounds;
    use crate::core::io::smiles::parse_smiles;
    use crate::core::models::molecule::Molecule;
    use crate::core::pharmacophore::model::LowerBoundMode;
    use nalgebra::Point3;

    fn donor_pair(distance: f64, d_lower: f64, d_upper: f64) -> Pharmacophore {
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
        Pharmacophore::from_template(&features, &[0, 1], d_lower, d_upper, LowerBoundMode::Clamped)
            .unwrap()
    }

    fn setup(smiles: &str) -> (Molecule, Vec<Feature>, BoundsMatrix) {
        let mol = parse_smiles(smiles).unwrap();
        let features = FeatureFactory::builtin().features_for(&mol);
        let bounds = molecule_bounds(&mol).unwrap();
        (mol, features, bounds)
    }

    #[test]
    fn match_features_requires_every_family() {
        let (_, features, _) = setup("CCCC");
        assert!(match_features(&donor_pair(5.0, 0.5, 1.5), &features).is_none());

        let (_, features, _) = setup("OCCCCO");
        let candidates = match_features(&donor_pair(5.0, 0.5, 1.5), &features).unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.len() == 2));
    }

    #[test]
    fn all_matches_keeps_geometrically_consistent_pairs() {
        let (_, features, bounds) = setup("OCCCCCCO");
        let core = donor_pair(6.0, 1.0, 1.5);
        let candidates = match_features(&core, &features).unwrap();
        let matches = all_matches(&core, &candidates, &bounds);
        // Both orderings of the two hydroxyls fit; a feature paired with itself does not.
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.features()[0] != m.features()[1]));
    }

    #[test]
    fn all_matches_rejects_impossible_distances() {
        let (_, features, bounds) = setup("OCCCCCCO");
        let too_close = donor_pair(0.2, 0.1, 0.2);
        let candidates = match_features(&too_close, &features).unwrap();
        assert!(all_matches(&too_close, &candidates, &bounds).is_empty());

        let too_far = donor_pair(40.0, 0.5, 1.5);
        let candidates = match_features(&too_far, &features).unwrap();
        assert!(all_matches(&too_far, &candidates, &bounds).is_empty());
    }

    #[test]
    fn ring_features_get_a_centroid_point() {
        let (_, features, bounds) = setup("c1ccccc1CCO");
        let ring = features
            .iter()
            .find(|f| f.family == FeatureFamily::Aromatic)
            .unwrap();
        let donor = features
            .iter()
            .find(|f| f.family == FeatureFamily::Donor)
            .unwrap();
        let core = Pharmacophore::from_template(
            &[
                PlacedFeature {
                    family: FeatureFamily::Aromatic,
                    position: Point3::origin(),
                },
                PlacedFeature {
                    family: FeatureFamily::Donor,
                    position: Point3::new(4.5, 0.0, 0.0),
                },
            ],
            &[0, 1],
            1.0,
            1.5,
            LowerBoundMode::Original,
        )
        .unwrap();
        let groups = vec![ring.atom_ids.clone(), donor.atom_ids.clone()];
        let (augmented, reps) = constrained_bounds(&bounds, &groups, &core).unwrap();
        assert_eq!(augmented.len(), bounds.len() + 1);
        assert_eq!(reps, vec![bounds.len(), donor.atom_ids[0]]);
        assert!(augmented.upper(reps[0], reps[1]) <= 6.0 + 1e-9);
    }
}
