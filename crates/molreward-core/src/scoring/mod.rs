//! # Scoring Module
//!
//! Scoring components and the configuration they are built from.
//!
//! ## Overview
//!
//! A scoring component implements [`component::ScoreComponent`]: given a batch
//! of molecules it returns a [`summary::ComponentSummary`] with one score per
//! molecule, in input order, paired with the [`parameters::ComponentParameters`]
//! that configured it. Components are independent of each other; combining
//! their scores into a single reward is left to the caller.
//!
//! ## Components
//!
//! | `component_type` | Implementation | Score |
//! |---|---|---|
//! | `molecular_weight` | [`physchem::PhysChemComponent`] | transformed average molecular weight |
//! | `num_hbd_lipinski` | [`physchem::PhysChemComponent`] | transformed Lipinski donor count |
//! | `custom_alerts` | [`custom_alerts::CustomAlertsComponent`] | 0 if any SMARTS alert matches, else 1 |
//! | `pharmacophore_align` | [`pharmacophore_align::PharmacophoreAlignComponent`] | staged 3D pharmacophore reward |
//!
//! [`factory::build_component`] maps a `component_type` to its implementation.
//!
//! ## Pharmacophore alignment parameters
//!
//! | key | type | meaning |
//! |---|---|---|
//! | `template_mol_file` | path | SD file whose first record is the template |
//! | `d_upper`, `d_lower` | float | distance tolerances of the core |
//! | `keep` | family names | feature families of the reference feature map |
//! | `conformers_num` | integer | conformers generated per retained embedding |
//! | `pList_max_allowed` | integer | cap on pharmacophore matches per molecule |
//! | `failed_allowed` | integer | embedding attempts per match and failure cap |
//! | `pharmacophore_idxs` | integers | template feature indices forming the core |
//! | `reward_weight` | 4 floats | staged reward weights |
//! | `lower_bound_mode` | `"original"` or `"clamped"` | optional lower-bound rule |
//! | `seed` | integer | optional seed of the match subsampling |
//! | `conformer_seed` | integer | optional conformer generator seed (42) |
//! | `feature_definitions` | path | optional TOML file replacing the built-in features |
//! | `feature_map` | table | optional `radius`, `width`, `profile` (`gaussian`, `triangle`, `box`) of the reference map |

pub mod component;
pub mod custom_alerts;
pub mod error;
pub mod factory;
pub mod parameters;
pub mod pharmacophore_align;
pub mod physchem;
pub mod summary;
pub mod transform;
