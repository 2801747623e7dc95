use super::error::ComponentError;
use super::parameters::ComponentParameters;
use serde::{Deserialize, Serialize};

const TRANSFORMATION_KEY: &str = "transformation";

/// Maps a raw property value onto a desirability score, usually in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "transformation_type", rename_all = "snake_case")]
pub enum Transformation {
    #[default]
    NoTransformation,
    Sigmoid {
        low: f64,
        high: f64,
        k: f64,
    },
    ReverseSigmoid {
        low: f64,
        high: f64,
        k: f64,
    },
    DoubleSigmoid {
        low: f64,
        high: f64,
        #[serde(default = "default_coef_div")]
        coef_div: f64,
        #[serde(default = "default_coef_s")]
        coef_si: f64,
        #[serde(default = "default_coef_s")]
        coef_se: f64,
    },
    Step {
        low: f64,
        high: f64,
    },
    RightStep {
        low: f64,
    },
    LeftStep {
        low: f64,
    },
}

fn default_coef_div() -> f64 {
    100.0
}

fn default_coef_s() -> f64 {
    150.0
}

#[inline]
fn sigmoid(x: f64, low: f64, high: f64, k: f64) -> f64 {
    let exponent = k * ((low + high) / 2.0 - x) * 10.0 / (high - low);
    1.0 / (1.0 + 10f64.powf(exponent))
}

/// `1 / (1 + 10^(coef * (edge - x) / coef_div))`, stable for large arguments.
#[inline]
fn logistic10(x: f64, edge: f64, coef: f64, coef_div: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(coef * (edge - x) / coef_div))
}

impl Transformation {
    /// Reads the transformation from a component's specific parameters,
    /// validating it.
    ///
    /// A missing `transformation` entry means [`Transformation::NoTransformation`].
    pub fn from_parameters(parameters: &ComponentParameters) -> Result<Self, ComponentError> {
        let transformation: Transformation =
            parameters.specific_or(TRANSFORMATION_KEY, Transformation::default())?;
        transformation.validate()?;
        Ok(transformation)
    }

    /// Checks that the parameters describe a well-defined curve.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::InvalidValue`] for non-finite parameters,
    /// an empty or inverted `[low, high]` range where one is required, or a
    /// non-positive `coef_div`.
    pub fn validate(&self) -> Result<(), ComponentError> {
        let invalid = |reason: &str| ComponentError::InvalidValue {
            key: TRANSFORMATION_KEY.to_string(),
            reason: reason.to_string(),
        };
        let values: Vec<f64> = match self {
            Self::NoTransformation => Vec::new(),
            Self::Sigmoid { low, high, k } | Self::ReverseSigmoid { low, high, k } => vec![*low, *high, *k],
            Self::DoubleSigmoid {
                low,
                high,
                coef_div,
                coef_si,
                coef_se,
            } => vec![*low, *high, *coef_div, *coef_si, *coef_se],
            Self::Step { low, high } => vec![*low, *high],
            Self::RightStep { low } | Self::LeftStep { low } => vec![*low],
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(invalid("parameters must be finite"));
        }
        match *self {
            Self::Sigmoid { low, high, .. } | Self::ReverseSigmoid { low, high, .. } if high <= low => {
                Err(invalid("'high' must be greater than 'low'"))
            }
            Self::DoubleSigmoid { low, high, .. } | Self::Step { low, high } if high < low => {
                Err(invalid("'high' must not be less than 'low'"))
            }
            Self::DoubleSigmoid { coef_div, .. } if coef_div <= 0.0 => {
                Err(invalid("'coef_div' must be positive"))
            }
            _ => Ok(()),
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Self::NoTransformation => x,
            Self::Sigmoid { low, high, k } => sigmoid(x, low, high, k),
            Self::ReverseSigmoid { low, high, k } => 1.0 - sigmoid(x, low, high, k),
            Self::DoubleSigmoid {
                low,
                high,
                coef_div,
                coef_si,
                coef_se,
            } => logistic10(x, low, coef_se, coef_div) - logistic10(x, high, coef_si, coef_div),
            Self::Step { low, high } => f64::from(u8::from(low <= x && x <= high)),
            Self::RightStep { low } => f64::from(u8::from(x >= low)),
            Self::LeftStep { low } => f64::from(u8::from(x <= low)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn sigmoid_is_one_half_at_the_midpoint() {
        let t = Transformation::Sigmoid {
            low: 200.0,
            high: 500.0,
            k: 0.25,
        };
        assert!(close(t.apply(350.0), 0.5));
        assert!(t.apply(600.0) > 0.99);
        assert!(t.apply(100.0) < 0.01);
        let r = Transformation::ReverseSigmoid {
            low: 200.0,
            high: 500.0,
            k: 0.25,
        };
        assert!(close(r.apply(420.0) + t.apply(420.0), 1.0));
    }

    #[test]
    fn double_sigmoid_peaks_between_its_edges() {
        let t = Transformation::DoubleSigmoid {
            low: 200.0,
            high: 500.0,
            coef_div: 500.0,
            coef_si: 20.0,
            coef_se: 20.0,
        };
        assert!(t.apply(350.0) > 0.9);
        assert!(t.apply(0.0) < 0.1);
        assert!(t.apply(1000.0) < 0.1);
        assert!(t.apply(1.0e6).is_finite());
    }

    #[test]
    fn steps() {
        let step = Transformation::Step { low: 1.0, high: 3.0 };
        assert_eq!(step.apply(1.0), 1.0);
        assert_eq!(step.apply(3.5), 0.0);
        assert_eq!(Transformation::RightStep { low: 2.0 }.apply(2.0), 1.0);
        assert_eq!(Transformation::RightStep { low: 2.0 }.apply(1.0), 0.0);
        assert_eq!(Transformation::LeftStep { low: 2.0 }.apply(1.0), 1.0);
        assert_eq!(Transformation::LeftStep { low: 2.0 }.apply(2.5), 0.0);
        assert_eq!(Transformation::NoTransformation.apply(42.0), 42.0);
    }

    #[test]
    fn reads_tagged_table_from_parameters() {
        let params: ComponentParameters = toml::from_str(
            r#"
            component_type = "molecular_weight"
            [specific_parameters.transformation]
            transformation_type = "double_sigmoid"
            low = 200.0
            high = 500.0
            "#,
        )
        .unwrap();
        let t = Transformation::from_parameters(&params).unwrap();
        assert_eq!(
            t,
            Transformation::DoubleSigmoid {
                low: 200.0,
                high: 500.0,
                coef_div: 100.0,
                coef_si: 150.0,
                coef_se: 150.0,
            }
        );
        assert_eq!(
            Transformation::from_parameters(&ComponentParameters::new("molecular_weight")).unwrap(),
            Transformation::NoTransformation
        );
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let inverted = Transformation::Sigmoid {
            low: 5.0,
            high: 1.0,
            k: 0.5,
        };
        assert!(matches!(inverted.validate(), Err(ComponentError::InvalidValue { .. })));
        let nan = Transformation::RightStep { low: f64::NAN };
        assert!(nan.validate().is_err());
        let zero_div = Transformation::DoubleSigmoid {
            low: 1.0,
            high: 2.0,
            coef_div: 0.0,
            coef_si: 1.0,
            coef_se: 1.0,
        };
        assert!(zero_div.validate().is_err());
    }
}
