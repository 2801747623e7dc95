use crate::core::geometry::bounds::BoundsError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PharmacophoreError {
    #[error("A pharmacophore needs at least 2 features, found {found}")]
    TooFewFeatures { found: usize },

    #[error("Molecule bounds are infeasible: {source}")]
    Bounds {
        #[from]
        source: BoundsError,
    },
}
