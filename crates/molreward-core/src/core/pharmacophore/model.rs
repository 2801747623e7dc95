use super::error::PharmacophoreError;
use crate::core::features::factory::PlacedFeature;
use crate::core::features::family::FeatureFamily;
use crate::core::geometry::bounds::DEFAULT_UPPER;
use itertools::Itertools;
use serde::Deserialize;
use tracing::debug;

/// How the lower distance bound of a pharmacophore pair is derived from the
/// observed distance and the lower tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowerBoundMode {
    /// `min(dist - d_lower, 0)`: never positive, so pairs only have an upper limit.
    #[default]
    Original,
    /// `max(dist - d_lower, 0)`: a real lower limit.
    Clamped,
}

impl LowerBoundMode {
    pub fn lower_bound(self, dist: f64, d_lower: f64) -> f64 {
        match self {
            LowerBoundMode::Original => (dist - d_lower).min(0.0),
            LowerBoundMode::Clamped => (dist - d_lower).max(0.0),
        }
    }
}

/// Feature points with pairwise lower/upper distance bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Pharmacophore {
    features: Vec<PlacedFeature>,
    lower: Vec<Vec<f64>>,
    upper: Vec<Vec<f64>>,
}

impl Pharmacophore {
    /// An unconstrained pharmacophore over `features`.
    pub fn new(features: Vec<PlacedFeature>) -> Self {
        let n = features.len();
        Self {
            features,
            lower: vec![vec![0.0; n]; n],
            upper: (0..n)
                .map(|i| (0..n).map(|j| if i == j { 0.0 } else { DEFAULT_UPPER }).collect())
                .collect(),
        }
    }

    /// Builds a pharmacophore core from selected template features.
    ///
    /// Indices past the end of `features` are dropped. Every pair of selected
    /// features gets upper bound `dist + d_upper` and a lower bound from `mode`.
    ///
    /// # Arguments
    ///
    /// * `features` - All template features, positioned in the template conformer.
    /// * `indices` - Indices into `features` defining the core.
    /// * `d_lower` - Lower distance tolerance.
    /// * `d_upper` - Upper distance tolerance.
    /// * `mode` - Lower-bound rule.
    ///
    /// # Errors
    ///
    /// Returns [`PharmacophoreError::TooFewFeatures`] if fewer than two valid
    /// indices remain.
    pub fn from_template(
        features: &[PlacedFeature],
        indices: &[usize],
        d_lower: f64,
        d_upper: f64,
        mode: LowerBoundMode,
    ) -> Result<Self, PharmacophoreError> {
        let selected: Vec<PlacedFeature> = indices
            .iter()
            .filter_map(|&idx| features.get(idx).copied())
            .collect();
        if selected.len() < indices.len() {
            debug!(
                requested = indices.len(),
                kept = selected.len(),
                "Dropped out-of-range pharmacophore indices"
            );
        }
        if selected.len() < 2 {
            return Err(PharmacophoreError::TooFewFeatures {
                found: selected.len(),
            });
        }

        let mut pharmacophore = Pharmacophore::new(selected);
        for (i, j) in (0..pharmacophore.len()).tuple_combinations() {
            let dist = (pharmacophore.features[i].position - pharmacophore.features[j].position).norm();
            pharmacophore.set_lower_bound(i, j, mode.lower_bound(dist, d_lower));
            pharmacophore.set_upper_bound(i, j, dist + d_upper);
        }
        Ok(pharmacophore)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[PlacedFeature] {
        &self.features
    }

    pub fn families(&self) -> impl Iterator<Item = FeatureFamily> + '_ {
        self.features.iter().map(|f| f.family)
    }

    pub fn lower_bound(&self, i: usize, j: usize) -> f64 {
        self.lower[i][j]
    }

    pub fn upper_bound(&self, i: usize, j: usize) -> f64 {
        self.upper[i][j]
    }

    pub fn set_lower_bound(&mut self, i: usize, j: usize, value: f64) {
        self.lower[i][j] = value;
        self.lower[j][i] = value;
    }

    pub fn set_upper_bound(&mut self, i: usize, j: usize, value: f64) {
        self.upper[i][j] = value;
        self.upper[j][i] = value;
    }
}
