use crate::error::{CliError, Result};
use molreward::scoring::parameters::ComponentParameters;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Specific parameters holding file paths, resolved against the directory of
/// the configuration file when relative.
const PATH_PARAMETERS: [&str; 2] = ["template_mol_file", "feature_definitions"];

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct ScoringConfig {
    #[serde(rename = "component", default)]
    pub components: Vec<ComponentParameters>,
}

impl ScoringConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading scoring configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        let mut config: ScoringConfig = toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        if config.components.is_empty() {
            return Err(CliError::Config(
                "At least one `[[component]]` table is required.".to_string(),
            ));
        }
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        for component in &mut self.components {
            for key in PATH_PARAMETERS {
                let Some(toml::Value::String(value)) = component.specific_parameters.get_mut(key) else {
                    continue;
                };
                if Path::new(value.as_str()).is_relative() {
                    *value = base.join(value.as_str()).to_string_lossy().into_owned();
                }
            }
        }
    }

    /// Column label of each component: its name, or its type when unnamed.
    pub fn labels(&self) -> Vec<String> {
        self.components.iter().map(|c| c.label().to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn loads_components_and_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scoring.toml");
        fs::write(
            &path,
            r#"
            [[component]]
            component_type = "custom_alerts"
            name = "alerts"
            smiles = ["[N+](=O)[O-]"]

            [[component]]
            component_type = "pharmacophore_align"
            [component.specific_parameters]
            template_mol_file = "templates/ligand.sdf"
            feature_definitions = "/abs/features.toml"
            "#,
        )
        .unwrap();

        let config = ScoringConfig::from_file(&path).unwrap();
        assert_eq!(config.components.len(), 2);
        assert_eq!(config.labels(), vec!["alerts", "pharmacophore_align"]);
        let specific = &config.components[1].specific_parameters;
        assert_eq!(
            specific["template_mol_file"].as_str().unwrap(),
            dir.path().join("templates/ligand.sdf").to_string_lossy()
        );
        assert_eq!(specific["feature_definitions"].as_str().unwrap(), "/abs/features.toml");
    }

    #[test]
    fn empty_configuration_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.toml");
        fs::write(&path, "").unwrap();
        assert!(matches!(ScoringConfig::from_file(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn unknown_top_level_keys_are_parse_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "components = []\n").unwrap();
        assert!(matches!(
            ScoringConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }
}
