use super::definitions::{DefinitionError, FeatureDefinition, builtin_definitions, load_definitions};
use super::family::FeatureFamily;
use crate::core::geometry::utils::centroid;
use crate::core::models::molecule::Molecule;
use nalgebra::Point3;
use std::path::Path;
use tracing::trace;

/// A feature found on a molecule: the atoms of one definition match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub family: FeatureFamily,
    /// Name of the definition that produced the feature.
    pub kind: String,
    /// Matched atoms, in pattern order.
    pub atom_ids: Vec<usize>,
}

/// A feature reduced to its family and a position in space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedFeature {
    pub family: FeatureFamily,
    pub position: Point3<f64>,
}

impl Feature {
    /// Centroid of the feature's atoms in `conformer`.
    ///
    /// Returns `None` if an atom index lies outside the conformer.
    pub fn position(&self, conformer: &[Point3<f64>]) -> Option<Point3<f64>> {
        let points: Option<Vec<Point3<f64>>> = self
            .atom_ids
            .iter()
            .map(|&i| conformer.get(i).copied())
            .collect();
        centroid(&points?)
    }

    pub fn place(&self, conformer: &[Point3<f64>]) -> Option<PlacedFeature> {
        self.position(conformer).map(|position| PlacedFeature {
            family: self.family,
            position,
        })
    }
}

/// Finds pharmacophoric features on molecules from an ordered list of
/// [`FeatureDefinition`]s.
#[derive(Debug, Clone)]
pub struct FeatureFactory {
    definitions: Vec<FeatureDefinition>,
}

impl Default for FeatureFactory {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FeatureFactory {
    pub fn new(definitions: Vec<FeatureDefinition>) -> Self {
        Self { definitions }
    }

    /// A factory over the built-in definitions.
    pub fn builtin() -> Self {
        Self::new(builtin_definitions().to_vec())
    }

    /// A factory over the definitions in a TOML file.
    pub fn from_path(path: &Path) -> Result<Self, DefinitionError> {
        load_definitions(path).map(Self::new)
    }

    pub fn definitions(&self) -> &[FeatureDefinition] {
        &self.definitions
    }

    /// Families with at least one definition, in first-definition order.
    pub fn families(&self) -> Vec<FeatureFamily> {
        let mut families = Vec::new();
        for definition in &self.definitions {
            if !families.contains(&definition.family) {
                families.push(definition.family);
            }
        }
        families
    }

    /// All features of a molecule.
    ///
    /// Definitions are applied in order and each contributes one feature per
    /// distinct matched atom set, so the same atoms may appear in features of
    /// several definitions.
    pub fn features_for(&self, mol: &Molecule) -> Vec<Feature> {
        let features: Vec<Feature> = self
            .definitions
            .iter()
            .flat_map(|definition| {
                definition
                    .pattern
                    .find_matches(mol)
                    .into_iter()
                    .map(|atom_ids| Feature {
                        family: definition.family,
                        kind: definition.name.clone(),
                        atom_ids,
                    })
            })
            .collect();
        trace!(count = features.len(), molecule = mol.name(), "Features perceived");
        features
    }

    /// Features of the given families only, in [`features_for`](Self::features_for) order.
    pub fn features_in_families(&self, mol: &Molecule, families: &[FeatureFamily]) -> Vec<Feature> {
        self.features_for(mol)
            .into_iter()
            .filter(|f| families.contains(&f.family))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::smiles::parse_smiles;

    fn families_of(smiles: &str) -> Vec<FeatureFamily> {
        let mol = parse_smiles(smiles).unwrap();
        FeatureFactory::builtin()
            .features_for(&mol)
            .into_iter()
            .map(|f| f.family)
            .collect()
    }

    fn count(smiles: &str, family: FeatureFamily) -> usize {
        families_of(smiles).into_iter().filter(|&f| f == family).count()
    }

    #[test]
    fn alcohols_are_donors_and_acceptors() {
        assert_eq!(count("CCO", FeatureFamily::Donor), 1);
        assert_eq!(count("CCO", FeatureFamily::Acceptor), 1);
        assert_eq!(count("OCCCCCCO", FeatureFamily::Donor), 2);
    }

    #[test]
    fn carboxylic_acid_is_negatively_ionizable() {
        assert_eq!(count("CC(=O)O", FeatureFamily::NegIonizable), 1);
        assert_eq!(count("CC(=O)[O-]", FeatureFamily::NegIonizable), 1);
        assert_eq!(count("CCO", FeatureFamily::NegIonizable), 0);
    }

    #[test]
    fn amines_are_positively_ionizable() {
        assert_eq!(count("CCN", FeatureFamily::PosIonizable), 1);
        assert_eq!(count("CC[NH3+]", FeatureFamily::PosIonizable), 1);
        assert_eq!(count("CC(=O)N", FeatureFamily::PosIonizable), 0);
    }

    #[test]
    fn aromatic_rings_are_single_features() {
        let mol = parse_smiles("c1ccccc1CCc1ccncc1").unwrap();
        let rings: Vec<Feature> = FeatureFactory::builtin()
            .features_in_families(&mol, &[FeatureFamily::Aromatic]);
        assert_eq!(rings.len(), 2);
        assert!(rings.iter().all(|f| f.atom_ids.len() == 6));
    }

    #[test]
    fn pyridine_nitrogen_accepts_but_pyrrole_nitrogen_donates() {
        assert_eq!(count("c1ccncc1", FeatureFamily::Acceptor), 1);
        assert_eq!(count("c1ccncc1", FeatureFamily::Donor), 0);
        assert_eq!(count("c1cc[nH]c1", FeatureFamily::Donor), 1);
    }

    #[test]
    fn feature_position_is_the_atom_centroid() {
        let feature = Feature {
            family: FeatureFamily::Aromatic,
            kind: "Arom6".to_string(),
            atom_ids: vec![0, 1],
        };
        let conformer = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        assert_eq!(feature.position(&conformer), Some(Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(feature.position(&conformer[..1]), None);
        assert_eq!(
            feature.place(&conformer).map(|p| p.family),
            Some(FeatureFamily::Aromatic)
        );
    }

    #[test]
    fn families_follow_definition_order() {
        let families = FeatureFactory::builtin().families();
        assert_eq!(families.first(), Some(&FeatureFamily::Donor));
        assert_eq!(families.len(), FeatureFamily::ALL.len());
    }
}
