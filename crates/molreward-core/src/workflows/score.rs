use super::progress::{Progress, ProgressReporter};
use crate::core::models::molecule::Molecule;
use crate::scoring::component::ScoreComponent;
use crate::scoring::summary::ComponentSummary;
use std::time::Instant;
use tracing::{info, instrument};

/// Scores a batch with every component, one summary per component in order.
///
/// Each component sees the whole batch; summaries are not merged.
#[instrument(skip_all, name = "scoring_workflow", fields(components = components.len(), molecules = molecules.len()))]
pub fn run(
    components: &[Box<dyn ScoreComponent>],
    molecules: &[Molecule],
    reporter: &ProgressReporter,
) -> Vec<ComponentSummary> {
    components
        .iter()
        .map(|component| {
            let component_type = component.component_type();
            reporter.report(Progress::ComponentStart {
                component_type,
                molecules: molecules.len() as u64,
            });
            let started = Instant::now();

            let scores = molecules
                .iter()
                .map(|molecule| {
                    let score = component.score_molecule(molecule);
                    reporter.report(Progress::MoleculeScored);
                    score
                })
                .collect();

            reporter.report(Progress::ComponentFinish);
            info!(
                component_type,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Component scored batch"
            );
            ComponentSummary::new(scores, component.parameters().clone())
        })
        .collect()
}
