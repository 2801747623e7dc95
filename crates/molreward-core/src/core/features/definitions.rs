use super::family::FeatureFamily;
use crate::core::chem::smarts::{SmartsError, SmartsPattern};
use serde::Deserialize;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// A named SMARTS pattern whose matches are features of one family.
///
/// Every atom of a match belongs to the feature; single-atom patterns give
/// point features, ring or group patterns give features located at the
/// centroid of the matched atoms.
#[derive(Debug, Clone)]
pub struct FeatureDefinition {
    pub name: String,
    pub family: FeatureFamily,
    pub pattern: SmartsPattern,
}

impl FeatureDefinition {
    pub fn new(
        name: impl Into<String>,
        family: FeatureFamily,
        smarts: &str,
    ) -> Result<Self, DefinitionError> {
        let name = name.into();
        let pattern = SmartsPattern::parse(smarts).map_err(|source| DefinitionError::Smarts {
            name: name.clone(),
            source,
        })?;
        Ok(Self {
            name,
            family,
            pattern,
        })
    }
}

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid SMARTS for feature '{name}': {source}")]
    Smarts { name: String, source: SmartsError },
    #[error("Feature definition file contains no [[feature]] entries")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct DefinitionRecord {
    name: String,
    family: FeatureFamily,
    smarts: String,
}

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default, rename = "feature")]
    features: Vec<DefinitionRecord>,
}

const DONOR: &str = "[$([N;!H0;v3,v4&+1]),$([O,S;H1;+0]),n&H1&+0]";
const ACCEPTOR: &str = "[$([O,S;H1;v2;!$(*-*=[O,N,P,S])]),$([O,S;H0;v2]),$([O,S;-]),$([o,s;+0;!$([o,s]:n);!$([o,s]:c:n)]),$([n;+0;!X3]),$([N;H0]#[C&v4]),$([N&v3;H0;$(Nc)])]";
const NOT_POLAR_CARBON: &str = "!$([#6]~[#7,#8,#9])";

static BUILTIN_DEFINITIONS: LazyLock<Vec<FeatureDefinition>> = LazyLock::new(|| {
    let hydrophobe_three = format!("[D3,D4;#6;+0;{NOT_POLAR_CARBON}]");
    let hydrophobe_chain = format!("[R0;D2;#6;+0;{NOT_POLAR_CARBON}]");
    let ring_atom = "[r6;#6;+0]";
    let rh6 = format!("{ring_atom}1~{ring_atom}~{ring_atom}~{ring_atom}~{ring_atom}~{ring_atom}1");

    let table: Vec<(&str, FeatureFamily, String)> = vec![
        ("SingleAtomDonor", FeatureFamily::Donor, DONOR.to_string()),
        ("SingleAtomAcceptor", FeatureFamily::Acceptor, ACCEPTOR.to_string()),
        (
            "AcidicGroup",
            FeatureFamily::NegIonizable,
            "[C,S](=[O,S,P])-[O;H1,-1]".to_string(),
        ),
        (
            "BasicGroup",
            FeatureFamily::PosIonizable,
            "[$([N;H2&+0][C;!$(C=*)]),$([N;H1&+0]([C;!$(C=*)])[C;!$(C=*)]),$([N;H0&+0]([C;!$(C=*)])([C;!$(C=*)])[C;!$(C=*)]);!$(N[a])]".to_string(),
        ),
        (
            "PosN",
            FeatureFamily::PosIonizable,
            "[#7;+;!$([N+]-[O-])]".to_string(),
        ),
        ("Imidazole", FeatureFamily::PosIonizable, "c1ncnc1".to_string()),
        ("Guanidine", FeatureFamily::PosIonizable, "NC(=N)N".to_string()),
        ("ZnBinder1", FeatureFamily::ZnBinder, "[S;D1]-[#6]".to_string()),
        (
            "ZnBinder4",
            FeatureFamily::ZnBinder,
            "[#6]-C(=O)-N-[O;D1]".to_string(),
        ),
        (
            "ZnBinder5",
            FeatureFamily::ZnBinder,
            "[#6]-C(=O)-[O;D1]".to_string(),
        ),
        ("Arom5", FeatureFamily::Aromatic, "a1aaaa1".to_string()),
        ("Arom6", FeatureFamily::Aromatic, "a1aaaaa1".to_string()),
        ("Arom7", FeatureFamily::Aromatic, "a1aaaaaa1".to_string()),
        ("Arom8", FeatureFamily::Aromatic, "a1aaaaaaa1".to_string()),
        ("ThreeWayAttach", FeatureFamily::Hydrophobe, hydrophobe_three),
        ("ChainTwoWayAttach", FeatureFamily::Hydrophobe, hydrophobe_chain),
        ("Halogen", FeatureFamily::Hydrophobe, "[Cl,Br,I]".to_string()),
        (
            "iPropyl",
            FeatureFamily::LumpedHydrophobe,
            format!("[CH;+0;{NOT_POLAR_CARBON}]([CH3])[CH3]"),
        ),
        (
            "tButyl",
            FeatureFamily::LumpedHydrophobe,
            format!("[C;+0;{NOT_POLAR_CARBON}]([CH3])([CH3])[CH3]"),
        ),
        ("RH6_6", FeatureFamily::LumpedHydrophobe, rh6),
    ];

    table
        .into_iter()
        .map(|(name, family, smarts)| {
            FeatureDefinition::new(name, family, &smarts)
                .expect("built-in feature definitions are valid constants")
        })
        .collect()
});

/// The built-in feature definitions, in evaluation order.
pub fn builtin_definitions() -> &'static [FeatureDefinition] {
    &BUILTIN_DEFINITIONS
}

/// Parses feature definitions from a TOML document of `[[feature]]` tables,
/// each with `name`, `family` and `smarts` keys.
///
/// # Errors
///
/// Returns [`DefinitionError::Toml`] for malformed documents or unknown
/// families, [`DefinitionError::Smarts`] for an invalid pattern, and
/// [`DefinitionError::Empty`] when no feature is defined.
pub fn parse_definitions(content: &str) -> Result<Vec<FeatureDefinition>, DefinitionError> {
    let file: DefinitionFile = toml::from_str(content)?;
    if file.features.is_empty() {
        return Err(DefinitionError::Empty);
    }
    file.features
        .into_iter()
        .map(|record| FeatureDefinition::new(record.name, record.family, &record.smarts))
        .collect()
}

pub fn load_definitions(path: &Path) -> Result<Vec<FeatureDefinition>, DefinitionError> {
    let content = std::fs::read_to_string(path).map_err(|e| DefinitionError::Io {
        path: path.to_string_lossy().to_string(),
        source: e,
    })?;
    parse_definitions(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn builtin_definitions_cover_every_family() {
        let definitions = builtin_definitions();
        for family in FeatureFamily::ALL {
            assert!(
                definitions.iter().any(|d| d.family == family),
                "no definition for {family}"
            );
        }
    }

    #[test]
    fn parse_definitions_reads_feature_tables() {
        let content = r#"
            [[feature]]
            name = "Hydroxyl"
            family = "Donor"
            smarts = "[OX2H]"

            [[feature]]
            name = "Carbonyl"
            family = "Acceptor"
            smarts = "O=C"
        "#;
        let definitions = parse_definitions(content).unwrap();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0].name, "Hydroxyl");
        assert_eq!(definitions[1].family, FeatureFamily::Acceptor);
        assert_eq!(definitions[1].pattern.atom_count(), 2);
    }

    #[test]
    fn parse_definitions_rejects_bad_input() {
        let bad_smarts = r#"
            [[feature]]
            name = "Broken"
            family = "Donor"
            smarts = "[N"
        "#;
        assert!(matches!(
            parse_definitions(bad_smarts),
            Err(DefinitionError::Smarts { name, .. }) if name == "Broken"
        ));

        let bad_family = r#"
            [[feature]]
            name = "Metal"
            family = "Metal"
            smarts = "[Zn]"
        "#;
        assert!(matches!(parse_definitions(bad_family), Err(DefinitionError::Toml(_))));
        assert!(matches!(parse_definitions(""), Err(DefinitionError::Empty)));
    }

    #[test]
    fn load_definitions_reports_missing_files() {
        let result = load_definitions(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(DefinitionError::Io { .. })));
    }

    #[test]
    fn load_definitions_reads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[feature]]\nname = \"Ring\"\nfamily = \"Aromatic\"\nsmarts = \"a1aaaaa1\""
        )
        .unwrap();
        let definitions = load_definitions(file.path()).unwrap();
        assert_eq!(definitions[0].family, FeatureFamily::Aromatic);
    }
}
