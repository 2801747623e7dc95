use super::factory::PlacedFeature;
use serde::Deserialize;
use thiserror::Error;

/// Shape of a reference feature's contribution as a function of distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatProfile {
    #[default]
    Gaussian,
    Triangle,
    Box,
}

/// Per-family feature-map scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FeatMapParams {
    /// Pairs farther apart than this do not interact.
    pub radius: f64,
    pub width: f64,
    pub profile: FeatProfile,
}

impl Default for FeatMapParams {
    fn default() -> Self {
        Self {
            radius: 2.5,
            width: 1.0,
            profile: FeatProfile::Gaussian,
        }
    }
}

impl FeatMapParams {
    /// Overlap of two same-family features `dist` apart.
    pub fn overlap(&self, dist: f64) -> f64 {
        if dist > self.radius {
            return 0.0;
        }
        match self.profile {
            FeatProfile::Gaussian => (-dist * dist / self.width).exp(),
            FeatProfile::Triangle => (1.0 - dist / self.width).max(0.0),
            FeatProfile::Box => 1.0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeatMapError {
    #[error("Feature map has no features to normalize by")]
    Empty,
}

/// A set of unit-weight reference features that scores how well other
/// feature sets overlap it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatMap {
    features: Vec<PlacedFeature>,
    params: FeatMapParams,
}

impl FeatMap {
    pub fn new(features: Vec<PlacedFeature>, params: FeatMapParams) -> Self {
        Self { features, params }
    }

    /// A map scored with the default Gaussian profile.
    pub fn uniform(features: Vec<PlacedFeature>) -> Self {
        Self::new(features, FeatMapParams::default())
    }

    pub fn params(&self) -> &FeatMapParams {
        &self.params
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn features(&self) -> &[PlacedFeature] {
        &self.features
    }

    /// Overlap of one feature with every same-family reference feature.
    pub fn score_feature(&self, feature: &PlacedFeature) -> f64 {
        self.features
            .iter()
            .filter(|reference| reference.family == feature.family)
            .map(|reference| self.params.overlap((reference.position - feature.position).norm()))
            .sum()
    }

    /// Summed overlap of a feature list with the map.
    pub fn score_features(&self, features: &[PlacedFeature]) -> f64 {
        features.iter().map(|f| self.score_feature(f)).sum()
    }

    /// [`score_features`](Self::score_features) divided by the number of
    /// reference features.
    ///
    /// # Errors
    ///
    /// Returns [`FeatMapError::Empty`] for a map without features.
    pub fn normalized_score(&self, features: &[PlacedFeature]) -> Result<f64, FeatMapError> {
        if self.features.is_empty() {
            return Err(FeatMapError::Empty);
        }
        Ok(self.score_features(features) / self.features.len() as f64)
    }
}
