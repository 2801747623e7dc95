use super::component::ScoreComponent;
use super::parameters::ComponentParameters;
use crate::core::chem::smarts::SmartsPattern;
use crate::core::models::molecule::Molecule;
use tracing::debug;

/// Flags molecules containing any of a list of unwanted substructures.
///
/// A molecule scores 0 if it matches at least one alert and 1 otherwise.
/// Alerts come from the `smiles` list of the parameters as SMARTS; an empty
/// list stands for a single empty alert, which never matches.
#[derive(Debug, Clone)]
pub struct CustomAlertsComponent {
    parameters: ComponentParameters,
    alerts: Vec<SmartsPattern>,
}

impl CustomAlertsComponent {
    pub fn new(parameters: ComponentParameters) -> Self {
        let sources = if parameters.smiles.is_empty() {
            vec![String::new()]
        } else {
            parameters.smiles.clone()
        };
        let alerts = sources
            .iter()
            .filter_map(|smarts| match SmartsPattern::parse(smarts) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    debug!(smarts = %smarts, error = %e, "Skipping malformed alert pattern");
                    None
                }
            })
            .collect();
        Self { parameters, alerts }
    }

    pub fn alerts(&self) -> &[SmartsPattern] {
        &self.alerts
    }
}

impl ScoreComponent for CustomAlertsComponent {
    fn parameters(&self) -> &ComponentParameters {
        &self.parameters
    }

    fn component_type(&self) -> &'static str {
        "custom_alerts"
    }

    fn score_molecule(&self, molecule: &Molecule) -> f64 {
        if self.alerts.iter().any(|alert| alert.has_match(molecule)) {
            0.0
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles::parse_smiles;

    fn batch() -> Vec<Molecule> {
        ["CC(=O)Cl", "c1ccccc1O", "CC[N+](=O)[O-]", "CCCC"]
            .iter()
            .map(|s| parse_smiles(s).unwrap())
            .collect()
    }

    fn component(alerts: &[&str]) -> CustomAlertsComponent {
        CustomAlertsComponent::new(
            ComponentParameters::new("custom_alerts")
                .with_smiles(alerts.iter().map(|s| s.to_string()).collect()),
        )
    }

    #[test]
    fn any_matching_alert_scores_zero() {
        let summary = component(&["C(=O)Cl", "[N+](=O)[O-]"]).calculate_score(&batch());
        assert_eq!(summary.total_score, vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn default_alert_list_passes_everything() {
        let summary = component(&[]).calculate_score(&batch());
        assert_eq!(summary.total_score, vec![1.0; 4]);
    }

    #[test]
    fn malformed_patterns_are_skipped() {
        let alerts = component(&["[C", "c1ccccc1"]);
        assert_eq!(alerts.alerts().len(), 1);
        let summary = alerts.calculate_score(&batch());
        assert_eq!(summary.total_score, vec![1.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn alerts_with_out_of_range_numbers_are_skipped() {
        let many_plus = format!("[C{}]", "+".repeat(130));
        let alerts = component(&[many_plus.as_str(), "[C+200]", "[#300]", "C(=O)Cl"]);
        assert_eq!(alerts.alerts().len(), 1);
        let summary = alerts.calculate_score(&batch());
        assert_eq!(summary.total_score, vec![0.0, 1.0, 1.0, 1.0]);
    }
}
