use super::parameters::ComponentParameters;

/// Scores of one component for one batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSummary {
    pub total_score: Vec<f64>,
    pub parameters: ComponentParameters,
}

impl ComponentSummary {
    pub fn new(total_score: Vec<f64>, parameters: ComponentParameters) -> Self {
        Self {
            total_score,
            parameters,
        }
    }

    pub fn len(&self) -> usize {
        self.total_score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_score.is_empty()
    }
}
