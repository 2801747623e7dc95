use super::component::ScoreComponent;
use super::error::ComponentError;
use super::parameters::ComponentParameters;
use crate::core::chem::crippen::{CrippenContribution, crippen_contributions};
use crate::core::features::factory::{Feature, FeatureFactory, PlacedFeature};
use crate::core::features::family::FeatureFamily;
use crate::core::features::feat_map::{FeatMap, FeatMapError, FeatMapParams};
use crate::core::geometry::align::{AlignError, align_by_contributions, best_rms_between};
use crate::core::geometry::bounds::molecule_bounds;
use crate::core::geometry::embed::{ConformerGenerator, EmbedError};
use crate::core::geometry::forcefield::{DEFAULT_MAX_ITERATIONS, ForceField};
use crate::core::io::sdf::SdfFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::molecule::{Conformer, Molecule};
use crate::core::pharmacophore::embedding::embed_pharmacophore;
use crate::core::pharmacophore::matching::{PharmacophoreMatch, all_matches, match_features};
use crate::core::pharmacophore::model::{LowerBoundMode, Pharmacophore};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info, instrument, trace};

/// Embeddings closer than this RMSD to an already retained one are dropped.
const DIVERSITY_RMS: f64 = 0.1;
const DEFAULT_CONFORMER_SEED: u64 = 42;

/// The staged reward `(w0, w1, w2, w3)`.
///
/// A molecule lacking a pharmacophore feature family earns `w0`; one whose
/// features cannot satisfy the core distances earns `w1`; every other
/// molecule earns `w0 + w1 + w2 + overlap * w3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardWeights([f64; 4]);

impl RewardWeights {
    /// # Errors
    ///
    /// Returns [`ComponentError::RewardWeights`] unless the weights are finite,
    /// `w0 < w1 < w0 + w1 + w2`, and `w3` is not negative.
    pub fn new(weights: [f64; 4]) -> Result<Self, ComponentError> {
        let [w0, w1, w2, w3] = weights;
        let reason = if weights.iter().any(|w| !w.is_finite()) {
            Some("weights must be finite")
        } else if w0 >= w1 {
            Some("w0 must be less than w1")
        } else if w1 >= w0 + w1 + w2 {
            Some("w1 must be less than w0 + w1 + w2")
        } else if w3 < 0.0 {
            Some("w3 must not be negative")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(ComponentError::RewardWeights { weights, reason }),
            None => Ok(Self(weights)),
        }
    }

    pub fn weights(&self) -> [f64; 4] {
        self.0
    }

    /// Reward for a molecule missing some pharmacophore feature family.
    pub fn unmatched(&self) -> f64 {
        self.0[0]
    }

    /// Reward for a molecule whose features cannot meet the core distances.
    pub fn unconstrainable(&self) -> f64 {
        self.0[1]
    }

    /// Reward for a molecule that reached alignment with the given best overlap.
    pub fn aligned(&self, overlap: f64) -> f64 {
        let [w0, w1, w2, w3] = self.0;
        w0 + w1 + w2 + overlap * w3
    }
}

/// Why an aligned conformer did not produce an overlap score.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SkipReason {
    #[error("conformer generation failed: {0}")]
    Embedding(#[from] EmbedError),
    #[error("alignment failed: {0}")]
    Alignment(#[from] AlignError),
    #[error("feature map scoring failed: {0}")]
    Scoring(#[from] FeatMapError),
}

/// Result of taking one conformer through alignment and feature scoring.
#[derive(Debug, Clone, PartialEq)]
pub enum ConformerOutcome {
    Scored(f64),
    Skipped(SkipReason),
}

/// Keeps at most `cap` items, chosen by shuffling with `rng`.
///
/// Lists at or below the cap are returned unchanged.
pub fn subsample<T>(mut items: Vec<T>, cap: usize, rng: &mut impl Rng) -> Vec<T> {
    if items.len() <= cap {
        return items;
    }
    items.shuffle(rng);
    items.truncate(cap);
    items
}

/// Rewards molecules for reproducing a template's 3D pharmacophore.
///
/// Scoring proceeds in stages, each stage that fails ending the evaluation
/// with a partial reward (see [`RewardWeights`]):
///
/// 1. The molecule must offer a feature of every core family.
/// 2. Some assignment of its features must be compatible with both the core
///    distances and its own topological distance bounds.
/// 3. Constrained embeddings are generated per assignment, relaxed with the
///    force field and filtered for diversity.
/// 4. For every retained embedding the hydrogen-complete molecule gets
///    `conformers_num` fresh conformers, each aligned onto the template by
///    Crippen contributions and scored against the template feature map. The
///    best normalized overlap enters the final reward.
#[derive(Debug)]
pub struct PharmacophoreAlignComponent {
    parameters: ComponentParameters,
    factory: FeatureFactory,
    keep: Vec<FeatureFamily>,
    template: Molecule,
    template_contribs: Vec<CrippenContribution>,
    reference_map: FeatMap,
    core: Pharmacophore,
    weights: RewardWeights,
    conformers_num: usize,
    match_cap: usize,
    failed_allowed: usize,
    conformer_seed: u64,
    rng: Mutex<StdRng>,
}

impl PharmacophoreAlignComponent {
    /// Loads the template and derives the pharmacophore core and feature map.
    ///
    /// # Arguments
    ///
    /// * `parameters` - Component configuration; the keys are listed in the
    ///   [`scoring`](crate::scoring) module documentation.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError`] for missing or mistyped parameters, invalid
    /// reward weights, an unreadable template or feature definition file, a
    /// template without coordinates, and a core of fewer than two features.
    #[instrument(level = "debug", skip_all, name = "pharmacophore_align_setup")]
    pub fn new(parameters: ComponentParameters) -> Result<Self, ComponentError> {
        let template_path: PathBuf = parameters.specific("template_mol_file")?;
        let d_upper: f64 = parameters.specific("d_upper")?;
        let d_lower: f64 = parameters.specific("d_lower")?;
        let keep: Vec<FeatureFamily> = parameters.specific("keep")?;
        let conformers_num: usize = parameters.specific("conformers_num")?;
        let match_cap: usize = parameters.specific("pList_max_allowed")?;
        let failed_allowed: usize = parameters.specific("failed_allowed")?;
        let core_indices: Vec<usize> = parameters.specific("pharmacophore_idxs")?;
        let weights = RewardWeights::new(parameters.specific("reward_weight")?)?;
        let mode: LowerBoundMode = parameters.specific_or("lower_bound_mode", LowerBoundMode::default())?;
        let seed: Option<u64> = parameters.specific_opt("seed")?;
        let conformer_seed: u64 = parameters.specific_or("conformer_seed", DEFAULT_CONFORMER_SEED)?;
        let map_params: FeatMapParams = parameters.specific_or("feature_map", FeatMapParams::default())?;
        if !(map_params.width > 0.0 && map_params.radius >= 0.0) {
            return Err(ComponentError::InvalidValue {
                key: "feature_map".to_string(),
                reason: "width must be positive and radius not negative".to_string(),
            });
        }
        let factory = match parameters.specific_opt::<PathBuf>("feature_definitions")? {
            Some(path) => FeatureFactory::from_path(&path)?,
            None => FeatureFactory::builtin(),
        };

        let (template, _) =
            SdfFile::read_from_path(&template_path).map_err(|source| ComponentError::Template {
                path: template_path.clone(),
                source,
            })?;
        let conformer = template
            .conformer(0)
            .ok_or(ComponentError::TemplateWithoutCoordinates)?;

        let template_features: Vec<PlacedFeature> = factory
            .features_for(&template)
            .iter()
            .filter_map(|f| f.place(conformer))
            .collect();
        let reference_map = FeatMap::new(
            template_features
                .iter()
                .filter(|f| keep.contains(&f.family))
                .copied()
                .collect(),
            map_params,
        );
        let core = Pharmacophore::from_template(&template_features, &core_indices, d_lower, d_upper, mode)?;
        let template_contribs = crippen_contributions(&template);

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            template = template.name(),
            template_features = template_features.len(),
            reference_features = reference_map.num_features(),
            core_features = core.len(),
            ?mode,
            "Pharmacophore alignment component ready"
        );

        Ok(Self {
            parameters,
            factory,
            keep,
            template,
            template_contribs,
            reference_map,
            core,
            weights,
            conformers_num,
            match_cap,
            failed_allowed,
            conformer_seed,
            rng: Mutex::new(rng),
        })
    }

    /// Replaces the random source used to subsample pharmacophore matches.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn core(&self) -> &Pharmacophore {
        &self.core
    }

    pub fn reference_map(&self) -> &FeatMap {
        &self.reference_map
    }

    pub fn weights(&self) -> RewardWeights {
        self.weights
    }

    fn sample_matches(&self, matches: Vec<PharmacophoreMatch>) -> Vec<PharmacophoreMatch> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        subsample(matches, self.match_cap, &mut *rng)
    }

    /// Constrained, relaxed embeddings that differ from each other by at least
    /// [`DIVERSITY_RMS`]. The first embedding is always kept; after that, each
    /// match contributes at most one new embedding.
    fn retained_embeddings(&self, molecule: &Molecule, matches: &[PharmacophoreMatch]) -> Vec<Conformer> {
        let forcefield = ForceField::new(molecule);
        let mut retained: Vec<Conformer> = Vec::new();
        for matched in matches {
            let embedding = match embed_pharmacophore(molecule, matched, &self.core, self.failed_allowed) {
                Ok(embedding) => embedding,
                Err(e) => {
                    debug!(error = %e, "Constrained embedding unavailable");
                    continue;
                }
            };
            if embedding.failures >= self.failed_allowed {
                trace!(failures = embedding.failures, "Too many failed embeddings for match");
                continue;
            }
            for mut coords in embedding.conformers {
                forcefield.minimize(&mut coords, DEFAULT_MAX_ITERATIONS);
                if retained.is_empty() {
                    retained.push(coords);
                    continue;
                }
                let duplicate = retained.iter().any(|kept| {
                    best_rms_between(molecule, kept, &coords).is_ok_and(|rms| rms < DIVERSITY_RMS)
                });
                if !duplicate {
                    retained.push(coords);
                    break;
                }
            }
        }
        retained
    }

    /// Generates, aligns and scores conformers for every retained embedding.
    ///
    /// The generator seed is offset by the embedding's index so that distinct
    /// embeddings explore distinct conformers.
    fn aligned_outcomes(&self, molecule: &Molecule, retained: usize) -> Vec<ConformerOutcome> {
        let hydrogenated = {
            let mut heavy = molecule.clone();
            heavy.clear_conformers();
            heavy.with_explicit_hydrogens()
        };
        let contribs = crippen_contributions(&hydrogenated);
        let features = self.factory.features_in_families(&hydrogenated, &self.keep);

        let mut outcomes = Vec::new();
        for index in 0..retained {
            let generator = ConformerGenerator::new(self.conformer_seed.wrapping_add(index as u64));
            let mut probe = hydrogenated.clone();
            if let Err(e) = generator.embed_into(&mut probe, self.conformers_num) {
                outcomes.push(ConformerOutcome::Skipped(e.into()));
                continue;
            }
            for cid in 0..probe.conformers().len() {
                let outcome = match align_by_contributions(
                    &mut probe,
                    cid,
                    &contribs,
                    &self.template,
                    0,
                    &self.template_contribs,
                ) {
                    Ok(_) => self.overlap(&features, probe.conformer(cid)),
                    Err(e) => ConformerOutcome::Skipped(e.into()),
                };
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    fn overlap(&self, features: &[Feature], conformer: Option<&Conformer>) -> ConformerOutcome {
        let Some(conformer) = conformer else {
            return ConformerOutcome::Skipped(AlignError::Empty.into());
        };
        let placed: Vec<PlacedFeature> = features.iter().filter_map(|f| f.place(conformer)).collect();
        match self.reference_map.normalized_score(&placed) {
            Ok(score) => ConformerOutcome::Scored(score),
            Err(e) => ConformerOutcome::Skipped(e.into()),
        }
    }
}

impl ScoreComponent for PharmacophoreAlignComponent {
    fn parameters(&self) -> &ComponentParameters {
        &self.parameters
    }

    fn component_type(&self) -> &'static str {
        "pharmacophore_align"
    }

    #[instrument(level = "debug", skip_all, fields(molecule = molecule.name()))]
    fn score_molecule(&self, molecule: &Molecule) -> f64 {
        let features = self.factory.features_for(molecule);
        let Some(candidates) = match_features(&self.core, &features) else {
            return self.weights.unmatched();
        };

        let matches = match molecule_bounds(molecule) {
            Ok(bounds) => all_matches(&self.core, &candidates, &bounds),
            Err(e) => {
                debug!(error = %e, "Molecule bounds are infeasible");
                Vec::new()
            }
        };
        if matches.is_empty() {
            return self.weights.unconstrainable();
        }
        let matches = self.sample_matches(matches);

        let retained = self.retained_embeddings(molecule, &matches);
        debug!(
            matches = matches.len(),
            retained = retained.len(),
            "Pharmacophore embeddings retained"
        );

        let best = self
            .aligned_outcomes(molecule, retained.len())
            .into_iter()
            .filter_map(|outcome| match outcome {
                ConformerOutcome::Scored(score) => Some(score),
                ConformerOutcome::Skipped(reason) => {
                    debug!(%reason, "Skipped conformer");
                    None
                }
            })
            .fold(0.0, f64::max);
        self.weights.aligned(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::feat_map::FeatProfile;
    use crate::core::io::smiles::parse_smiles;
    use itertools::Itertools;
    use nalgebra::Point3;
    use std::path::Path;
    use tempfile::TempDir;

    const ZIGZAG_RISE: f64 = 1.258;
    const ZIGZAG_OFFSET: f64 = 0.889;

    /// Writes an extended `OCCCCCCO` conformer as the template.
    fn write_template(dir: &Path) -> PathBuf {
        let mut mol = parse_smiles("OCCCCCCO").unwrap();
        let coords = (0..mol.atom_count())
            .map(|i| Point3::new(i as f64 * ZIGZAG_RISE, (i % 2) as f64 * ZIGZAG_OFFSET, 0.0))
            .collect();
        mol.add_conformer(coords).unwrap();
        let path = dir.join("template.sdf");
        SdfFile::write_molecule_to_path(&mol, &path).unwrap();
        path
    }

    fn parameters(template: &Path, mode: &str) -> ComponentParameters {
        ComponentParameters::new("pharmacophore_align")
            .with_specific("template_mol_file", template.to_string_lossy().to_string())
            .with_specific("d_upper", 1.5)
            .with_specific("d_lower", 0.5)
            .with_specific("keep", vec!["Donor", "Acceptor"])
            .with_specific("conformers_num", 2)
            .with_specific("pList_max_allowed", 4)
            .with_specific("failed_allowed", 2)
            .with_specific("pharmacophore_idxs", vec![0, 1])
            .with_specific("reward_weight", vec![0.1, 0.2, 0.3, 0.4])
            .with_specific("lower_bound_mode", mode)
            .with_specific("seed", 7)
    }

    fn score(component: &PharmacophoreAlignComponent, smiles: &str) -> f64 {
        component.score_molecule(&parse_smiles(smiles).unwrap())
    }

    #[test]
    fn reward_weights_follow_the_stages() {
        let weights = RewardWeights::new([0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(weights.unmatched(), 0.1);
        assert_eq!(weights.unconstrainable(), 0.2);
        assert!((weights.aligned(0.5) - 0.8).abs() < 1e-12);
        assert!(weights.unconstrainable() < weights.aligned(0.0));
    }

    #[test]
    fn reward_weights_must_be_ordered() {
        for bad in [
            [0.2, 0.2, 0.3, 0.4],
            [0.1, 0.3, -0.2, 0.4],
            [0.1, 0.2, 0.3, -0.1],
            [0.1, f64::NAN, 0.3, 0.4],
        ] {
            assert!(matches!(
                RewardWeights::new(bad),
                Err(ComponentError::RewardWeights { .. })
            ));
        }
    }

    #[test]
    fn subsample_keeps_short_lists_unchanged() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(subsample(vec![1, 2, 3], 3, &mut rng), vec![1, 2, 3]);
        assert_eq!(subsample(vec![1, 2], 5, &mut rng), vec![1, 2]);

        let picked = subsample((0..10).collect::<Vec<_>>(), 4, &mut rng);
        assert_eq!(picked.len(), 4);
        assert!(picked.iter().all(|v| (0..10).contains(v)));
    }

    #[test]
    fn construction_builds_core_and_feature_map() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let component = PharmacophoreAlignComponent::new(parameters(&template, "original")).unwrap();
        assert_eq!(component.core().len(), 2);
        assert!(component.core().families().all(|f| f == FeatureFamily::Donor));
        // Each hydroxyl is both a donor and an acceptor.
        assert_eq!(component.reference_map().num_features(), 4);
        assert_eq!(component.component_type(), "pharmacophore_align");
    }

    #[test]
    fn construction_rejects_a_single_core_feature() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let params = parameters(&template, "original").with_specific("pharmacophore_idxs", vec![0, 99]);
        assert!(matches!(
            PharmacophoreAlignComponent::new(params),
            Err(ComponentError::Pharmacophore { .. })
        ));
    }

    #[test]
    fn construction_reports_missing_inputs() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.sdf");
        assert!(matches!(
            PharmacophoreAlignComponent::new(parameters(&missing, "original")),
            Err(ComponentError::Template { .. })
        ));

        let template = write_template(dir.path());
        let mut params = parameters(&template, "original");
        params.specific_parameters.remove("d_upper");
        assert!(matches!(
            PharmacophoreAlignComponent::new(params),
            Err(ComponentError::MissingParameter(key)) if key == "d_upper"
        ));
    }

    #[test]
    fn molecule_without_core_families_earns_the_first_weight() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let component = PharmacophoreAlignComponent::new(parameters(&template, "original")).unwrap();
        assert_eq!(score(&component, "CCCC"), 0.1);
    }

    #[test]
    fn molecule_too_short_for_the_core_earns_the_second_weight() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let component = PharmacophoreAlignComponent::new(parameters(&template, "clamped")).unwrap();
        assert_eq!(score(&component, "OCCO"), 0.2);
    }

    #[test]
    fn template_molecule_earns_an_overlap_bonus() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let component = PharmacophoreAlignComponent::new(parameters(&template, "original")).unwrap();
        let summary = component.calculate_score(&[
            parse_smiles("OCCCCCCO").unwrap(),
            parse_smiles("CCCC").unwrap(),
        ]);
        assert_eq!(summary.len(), 2);
        let full = summary.total_score[0];
        let floor = component.weights().aligned(0.0);
        assert!(full > floor + 1e-6, "score {full}");
        assert!(full <= component.weights().aligned(1.0) + 1e-9, "score {full}");
        assert_eq!(summary.total_score[1], 0.1);
    }

    #[test]
    fn duplicate_embeddings_are_retained_once() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let component = PharmacophoreAlignComponent::new(parameters(&template, "original")).unwrap();
        let mol = parse_smiles("OCCCCCCO").unwrap();
        let features = component.factory.features_for(&mol);
        let candidates = match_features(component.core(), &features).unwrap();
        let bounds = molecule_bounds(&mol).unwrap();
        let matched = all_matches(component.core(), &candidates, &bounds).remove(0);

        let once = component.retained_embeddings(&mol, std::slice::from_ref(&matched));
        assert!(!once.is_empty());
        assert!(once.len() <= 2);
        for (i, j) in (0..once.len()).tuple_combinations() {
            assert!(best_rms_between(&mol, &once[i], &once[j]).unwrap() >= DIVERSITY_RMS);
        }

        // Embedding is deterministic, so a repeated match yields only duplicates.
        let twice = component.retained_embeddings(&mol, &[matched.clone(), matched]);
        assert_eq!(twice, once);
    }

    #[test]
    fn skipped_conformers_leave_the_floor_reward() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let params = parameters(&template, "original").with_specific("keep", Vec::<String>::new());
        let component = PharmacophoreAlignComponent::new(params).unwrap();
        assert_eq!(component.reference_map().num_features(), 0);

        let mol = parse_smiles("OCCCCCCO").unwrap();
        let outcomes = component.aligned_outcomes(&mol, 1);
        assert!(!outcomes.is_empty());
        assert!(outcomes.iter().all(|o| matches!(
            o,
            ConformerOutcome::Skipped(SkipReason::Scoring(FeatMapError::Empty))
        )));
        assert!((component.score_molecule(&mol) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn tiny_molecule_scores_the_floor_reward() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let component = PharmacophoreAlignComponent::new(parameters(&template, "original")).unwrap();
        assert!((score(&component, "OCO") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn no_embedding_attempts_score_the_floor_reward() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let params = parameters(&template, "original").with_specific("failed_allowed", 0);
        let component = PharmacophoreAlignComponent::new(params).unwrap();
        assert!((score(&component, "OCCCCCCO") - 0.6).abs() < 1e-12);
    }

    #[test]
    fn feature_map_profile_is_configurable() {
        let dir = TempDir::new().unwrap();
        let template = write_template(dir.path());
        let mut profile = toml::Table::new();
        profile.insert("profile".to_string(), "box".into());
        profile.insert("radius".to_string(), toml::Value::Float(1.0));
        let params = parameters(&template, "original").with_specific("feature_map", profile);
        let component = PharmacophoreAlignComponent::new(params).unwrap();
        assert_eq!(component.reference_map().params().profile, FeatProfile::Box);
        assert_eq!(component.reference_map().params().radius, 1.0);

        let mut flat = toml::Table::new();
        flat.insert("width".to_string(), toml::Value::Float(0.0));
        let params = parameters(&template, "original").with_specific("feature_map", flat);
        assert!(matches!(
            PharmacophoreAlignComponent::new(params),
            Err(ComponentError::InvalidValue { key, .. }) if key == "feature_map"
        ));
    }
}
