use super::component::ScoreComponent;
use super::error::ComponentError;
use super::parameters::ComponentParameters;
use super::transform::Transformation;
use crate::core::chem::descriptors;
use crate::core::models::molecule::Molecule;
use tracing::debug;

/// A molecular property computed directly from the molecular graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysChemProperty {
    MolecularWeight,
    NumHbdLipinski,
}

impl PhysChemProperty {
    pub fn component_type(self) -> &'static str {
        match self {
            Self::MolecularWeight => "molecular_weight",
            Self::NumHbdLipinski => "num_hbd_lipinski",
        }
    }

    pub fn compute(self, mol: &Molecule) -> f64 {
        match self {
            Self::MolecularWeight => descriptors::molecular_weight(mol),
            Self::NumHbdLipinski => descriptors::num_h_donors_lipinski(mol) as f64,
        }
    }
}

/// Scores molecules by one physico-chemical property passed through the
/// configured [`Transformation`].
#[derive(Debug, Clone)]
pub struct PhysChemComponent {
    parameters: ComponentParameters,
    property: PhysChemProperty,
    transformation: Transformation,
}

impl PhysChemComponent {
    /// # Errors
    ///
    /// Returns an error if the `transformation` parameter is malformed.
    pub fn new(parameters: ComponentParameters, property: PhysChemProperty) -> Result<Self, ComponentError> {
        let transformation = Transformation::from_parameters(&parameters)?;
        debug!(
            property = property.component_type(),
            ?transformation,
            "Built physico-chemical component"
        );
        Ok(Self {
            parameters,
            property,
            transformation,
        })
    }

    pub fn property(&self) -> PhysChemProperty {
        self.property
    }
}

impl ScoreComponent for PhysChemComponent {
    fn parameters(&self) -> &ComponentParameters {
        &self.parameters
    }

    fn component_type(&self) -> &'static str {
        self.property.component_type()
    }

    fn score_molecule(&self, molecule: &Molecule) -> f64 {
        self.transformation.apply(self.property.compute(molecule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles::parse_smiles;

    fn molecules(smiles: &[&str]) -> Vec<Molecule> {
        smiles.iter().map(|s| parse_smiles(s).unwrap()).collect()
    }

    #[test]
    fn molecular_weight_scores_in_input_order() {
        let component = PhysChemComponent::new(
            ComponentParameters::new("molecular_weight"),
            PhysChemProperty::MolecularWeight,
        )
        .unwrap();
        let summary = component.calculate_score(&molecules(&["O", "CCO", "C"]));
        assert_eq!(summary.len(), 3);
        assert!((summary.total_score[0] - 18.015).abs() < 0.01);
        assert!((summary.total_score[1] - 46.069).abs() < 0.01);
        assert!((summary.total_score[2] - 16.043).abs() < 0.01);
        assert_eq!(summary.parameters.component_type, "molecular_weight");
    }

    #[test]
    fn hbd_counts_nh_and_oh_groups() {
        let component = PhysChemComponent::new(
            ComponentParameters::new("num_hbd_lipinski"),
            PhysChemProperty::NumHbdLipinski,
        )
        .unwrap();
        let summary = component.calculate_score(&molecules(&["OCCN", "CCOC", "c1cc[nH]c1"]));
        assert_eq!(summary.total_score, vec![2.0, 0.0, 1.0]);
        assert_eq!(component.component_type(), "num_hbd_lipinski");
    }

    #[test]
    fn transformation_is_applied() {
        let mut transformation = toml::Table::new();
        transformation.insert("transformation_type".into(), "right_step".into());
        transformation.insert("low".into(), 1.5.into());
        let params = ComponentParameters::new("num_hbd_lipinski")
            .with_specific("transformation", transformation);
        let component = PhysChemComponent::new(params, PhysChemProperty::NumHbdLipinski).unwrap();
        let summary = component.calculate_score(&molecules(&["OCCO", "CCO"]));
        assert_eq!(summary.total_score, vec![1.0, 0.0]);
    }

    #[test]
    fn empty_batch_gives_empty_summary() {
        let component = PhysChemComponent::new(
            ComponentParameters::new("molecular_weight"),
            PhysChemProperty::MolecularWeight,
        )
        .unwrap();
        assert!(component.calculate_score(&[]).is_empty());
    }
}
