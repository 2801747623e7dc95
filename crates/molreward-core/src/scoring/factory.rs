use super::component::ScoreComponent;
use super::custom_alerts::CustomAlertsComponent;
use super::error::ComponentError;
use super::parameters::ComponentParameters;
use super::pharmacophore_align::PharmacophoreAlignComponent;
use super::physchem::{PhysChemComponent, PhysChemProperty};
use tracing::debug;

/// Every `component_type` the factory understands.
pub const COMPONENT_TYPES: [&str; 4] = [
    "molecular_weight",
    "num_hbd_lipinski",
    "custom_alerts",
    "pharmacophore_align",
];

/// Builds the component named by `parameters.component_type`.
///
/// # Errors
///
/// Returns [`ComponentError::UnknownComponent`] for an unrecognized type and
/// propagates any construction error of the component itself.
pub fn build_component(parameters: ComponentParameters) -> Result<Box<dyn ScoreComponent>, ComponentError> {
    debug!(
        component_type = %parameters.component_type,
        label = parameters.label(),
        "Building scoring component"
    );
    let component: Box<dyn ScoreComponent> = match parameters.component_type.as_str() {
        "molecular_weight" => Box::new(PhysChemComponent::new(
            parameters,
            PhysChemProperty::MolecularWeight,
        )?),
        "num_hbd_lipinski" => Box::new(PhysChemComponent::new(
            parameters,
            PhysChemProperty::NumHbdLipinski,
        )?),
        "custom_alerts" => Box::new(CustomAlertsComponent::new(parameters)),
        "pharmacophore_align" => Box::new(PharmacophoreAlignComponent::new(parameters)?),
        other => return Err(ComponentError::UnknownComponent(other.to_string())),
    };
    Ok(component)
}

/// Builds one component per parameter set, in order.
pub fn build_components(
    parameters: impl IntoIterator<Item = ComponentParameters>,
) -> Result<Vec<Box<dyn ScoreComponent>>, ComponentError> {
    parameters.into_iter().map(build_component).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_graph_only_components() {
        for component_type in ["molecular_weight", "num_hbd_lipinski", "custom_alerts"] {
            let component = build_component(ComponentParameters::new(component_type)).unwrap();
            assert_eq!(component.component_type(), component_type);
            assert!(COMPONENT_TYPES.contains(&component_type));
        }
    }

    #[test]
    fn builds_components_in_order() {
        let components = build_components([
            ComponentParameters::new("custom_alerts"),
            ComponentParameters::new("molecular_weight"),
        ])
        .unwrap();
        let types: Vec<_> = components.iter().map(|c| c.component_type()).collect();
        assert_eq!(types, vec!["custom_alerts", "molecular_weight"]);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(matches!(
            build_component(ComponentParameters::new("qed_score")),
            Err(ComponentError::UnknownComponent(name)) if name == "qed_score"
        ));
    }

    #[test]
    fn pharmacophore_component_needs_its_parameters() {
        assert!(matches!(
            build_component(ComponentParameters::new("pharmacophore_align")),
            Err(ComponentError::MissingParameter(_))
        ));
    }
}
