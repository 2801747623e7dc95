use super::error::ComponentError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Configuration of one scoring component.
///
/// `specific_parameters` holds the options that only make sense for a given
/// component type; the component reads them once when it is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentParameters {
    pub component_type: String,
    /// Display name; empty means the component is labelled by its type.
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// SMILES or SMARTS strings, depending on the component.
    #[serde(default)]
    pub smiles: Vec<String>,
    #[serde(default)]
    pub specific_parameters: toml::Table,
}

fn default_weight() -> f64 {
    1.0
}

impl ComponentParameters {
    pub fn new(component_type: impl Into<String>) -> Self {
        let component_type = component_type.into();
        Self {
            component_type,
            name: String::new(),
            weight: default_weight(),
            smiles: Vec::new(),
            specific_parameters: toml::Table::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The name if one was given, otherwise the component type.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.component_type
        } else {
            &self.name
        }
    }

    pub fn with_smiles(mut self, smiles: Vec<String>) -> Self {
        self.smiles = smiles;
        self
    }

    pub fn with_specific(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.specific_parameters.insert(key.into(), value.into());
        self
    }

    /// Reads a required specific parameter.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::MissingParameter`] if `key` is absent and
    /// [`ComponentError::InvalidParameter`] if its value has the wrong shape.
    pub fn specific<T: DeserializeOwned>(&self, key: &str) -> Result<T, ComponentError> {
        self.specific_opt(key)?
            .ok_or_else(|| ComponentError::MissingParameter(key.to_string()))
    }

    /// Reads an optional specific parameter.
    pub fn specific_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ComponentError> {
        self.specific_parameters
            .get(key)
            .map(|value| {
                value
                    .clone()
                    .try_into()
                    .map_err(|source| ComponentError::InvalidParameter {
                        key: key.to_string(),
                        source,
                    })
            })
            .transpose()
    }

    /// Reads an optional specific parameter, falling back to `default`.
    pub fn specific_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ComponentError> {
        Ok(self.specific_opt(key)?.unwrap_or(default))
    }
}
