use crate::core::features::definitions::DefinitionError;
use crate::core::io::sdf::SdfError;
use crate::core::pharmacophore::error::PharmacophoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("Unknown component type '{0}'")]
    UnknownComponent(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid value for parameter '{key}': {source}")]
    InvalidParameter {
        key: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid parameter '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid reward weights {weights:?}: {reason}")]
    RewardWeights {
        weights: [f64; 4],
        reason: &'static str,
    },

    #[error("Failed to read template molecule from {path:?}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: SdfError,
    },

    #[error("Template molecule has no 3D coordinates")]
    TemplateWithoutCoordinates,

    #[error("Failed to load feature definitions: {source}")]
    Definitions {
        #[from]
        source: DefinitionError,
    },

    #[error("Failed to build pharmacophore: {source}")]
    Pharmacophore {
        #[from]
        source: PharmacophoreError,
    },
}
