use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Pharmacophoric feature families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureFamily {
    Donor,
    Acceptor,
    NegIonizable,
    PosIonizable,
    ZnBinder,
    Aromatic,
    Hydrophobe,
    LumpedHydrophobe,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown feature family: '{0}'")]
pub struct ParseFeatureFamilyError(pub String);

impl FeatureFamily {
    pub const ALL: [FeatureFamily; 8] = [
        FeatureFamily::Donor,
        FeatureFamily::Acceptor,
        FeatureFamily::NegIonizable,
        FeatureFamily::PosIonizable,
        FeatureFamily::ZnBinder,
        FeatureFamily::Aromatic,
        FeatureFamily::Hydrophobe,
        FeatureFamily::LumpedHydrophobe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureFamily::Donor => "Donor",
            FeatureFamily::Acceptor => "Acceptor",
            FeatureFamily::NegIonizable => "NegIonizable",
            FeatureFamily::PosIonizable => "PosIonizable",
            FeatureFamily::ZnBinder => "ZnBinder",
            FeatureFamily::Aromatic => "Aromatic",
            FeatureFamily::Hydrophobe => "Hydrophobe",
            FeatureFamily::LumpedHydrophobe => "LumpedHydrophobe",
        }
    }
}

impl FromStr for FeatureFamily {
    type Err = ParseFeatureFamilyError;

    /// Parses a family name, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureFamily::ALL
            .into_iter()
            .find(|family| family.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseFeatureFamilyError(s.to_string()))
    }
}

impl fmt::Display for FeatureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_family_names_case_insensitively() {
        assert_eq!("Donor".parse(), Ok(FeatureFamily::Donor));
        assert_eq!("posionizable".parse(), Ok(FeatureFamily::PosIonizable));
        assert_eq!(" Aromatic ".parse(), Ok(FeatureFamily::Aromatic));
        assert!("Metal".parse::<FeatureFamily>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for family in FeatureFamily::ALL {
            assert_eq!(family.to_string().parse(), Ok(family));
        }
    }

    #[test]
    fn deserializes_from_toml_strings() {
        #[derive(Deserialize)]
        struct Wrapper {
            keep: Vec<FeatureFamily>,
        }
        let wrapper: Wrapper = toml::from_str(r#"keep = ["Donor", "LumpedHydrophobe"]"#).unwrap();
        assert_eq!(
            wrapper.keep,
            vec![FeatureFamily::Donor, FeatureFamily::LumpedHydrophobe]
        );
    }
}
