use super::parameters::ComponentParameters;
use super::summary::ComponentSummary;
use crate::core::models::molecule::Molecule;

/// A scoring component: maps each molecule of a batch to a desirability score.
///
/// Components are built once from their [`ComponentParameters`] and then
/// shared across scoring calls, possibly between threads.
pub trait ScoreComponent: Send + Sync {
    /// The configuration this component was built from.
    fn parameters(&self) -> &ComponentParameters;

    /// The `component_type` string this component answers to.
    fn component_type(&self) -> &'static str;

    /// Score of a single molecule.
    fn score_molecule(&self, molecule: &Molecule) -> f64;

    /// Scores a batch, preserving its order.
    fn calculate_score(&self, molecules: &[Molecule]) -> ComponentSummary {
        let scores = molecules.iter().map(|m| self.score_molecule(m)).collect();
        ComponentSummary::new(scores, self.parameters().clone())
    }
}
