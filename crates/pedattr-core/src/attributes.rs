//! Ordered attribute names.
//!
//! The position of a name in the list is the index of its logit in the head
//! output, so the list must be in exactly the order used at training time.

use std::path::Path;
use std::sync::Arc;

use crate::error::ConfigError;

/// Attributes of the extended PETA label set, in head output order.
#[rustfmt::skip]
pub const PETA_ATTRIBUTES: [&str; 116] = [
    "personalLess30", "personalLess45", "personalLess60", "personalLarger60",
    "carryingBackpack", "carryingOther", "lowerBodyCasual", "upperBodyCasual",
    "lowerBodyFormal", "upperBodyFormal", "accessoryHat", "upperBodyJacket",
    "lowerBodyJeans", "footwearLeatherShoes", "upperBodyLogo", "hairLong",
    "personalMale", "carryingMessengerBag", "accessoryMuffler", "accessoryNothing",
    "carryingNothing", "upperBodyPlaid", "carryingPlasticBags", "footwearSandals",
    "footwearShoes", "lowerBodyShorts", "upperBodyShortSleeve", "lowerBodyShortSkirt",
    "footwearSneaker", "upperBodyThinStripes", "accessorySunglasses", "lowerBodyTrousers",
    "upperBodyTshirt", "upperBodyOther", "upperBodyVNeck", "upperBodyBlack",
    "upperBodyBlue", "upperBodyBrown", "upperBodyGreen", "upperBodyGrey",
    "upperBodyOrange", "upperBodyPink", "upperBodyPurple", "upperBodyRed",
    "upperBodyWhite", "upperBodyYellow", "lowerBodyBlack", "lowerBodyBlue",
    "lowerBodyBrown", "lowerBodyGreen", "lowerBodyGrey", "lowerBodyOrange",
    "lowerBodyPink", "lowerBodyPurple", "lowerBodyRed", "lowerBodyWhite",
    "lowerBodyYellow", "hairBlack", "hairBlue", "hairBrown",
    "hairGreen", "hairGrey", "hairOrange", "hairPink",
    "hairPurple", "hairRed", "hairWhite", "hairYellow",
    "footwearBlack", "footwearBlue", "footwearBrown", "footwearGreen",
    "footwearGrey", "footwearOrange", "footwearPink", "footwearPurple",
    "footwearRed", "footwearWhite", "footwearYellow", "accessoryHeadphone",
    "personalLess15", "carryingBabyBuggy", "hairBald", "footwearBoots",
    "lowerBodyCapri", "carryingShoppingTro", "carryingUmbrella", "personalFemale",
    "carryingFolder", "accessoryHairBand", "lowerBodyHotPants", "accessoryKerchief",
    "lowerBodyLongSkirt", "upperBodyLongSleeve", "lowerBodyPlaid", "lowerBodyThinStripes",
    "carryingLuggageCase", "upperBodyNoSleeve", "hairShort", "footwearStocking",
    "upperBodySuit", "carryingSuitcase", "lowerBodySuits", "upperBodySweater",
    "upperBodyThickStripes", "carryingBlack", "carryingBlue", "carryingBrown",
    "carryingGreen", "carryingGrey", "carryingOrange", "carryingPink",
    "carryingPurple", "carryingRed", "carryingWhite", "carryingYellow",
];

/// Immutable, ordered list of attribute names.
///
/// Cheap to clone; clones share the same backing storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeList {
    names: Arc<[String]>,
}

impl AttributeList {
    /// Build a list, rejecting empty lists, blank names and duplicates.
    pub fn new<I, S>(names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(ConfigError::AttributeNames("attribute list is empty".to_string()));
        }
        let mut seen = std::collections::HashSet::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(ConfigError::AttributeNames(format!(
                    "attribute {idx} has an empty name"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::AttributeNames(format!(
                    "attribute {name:?} is listed twice"
                )));
            }
        }
        Ok(Self {
            names: names.into(),
        })
    }

    /// The built-in attribute list for a dataset, if this build ships one.
    pub fn builtin(dataset: &str) -> Option<Self> {
        match dataset.to_lowercase().as_str() {
            "peta" => Self::new(PETA_ATTRIBUTES).ok(),
            _ => None,
        }
    }

    /// Load an attribute list from a file.
    ///
    /// `.json` files hold an array of strings; anything else is read as one
    /// name per line, ignoring blank lines and `#` comments.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::Attributes {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let names: Vec<String> = if is_json {
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?
        } else {
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect()
        };

        Self::new(names).map_err(|e| match e {
            ConfigError::AttributeNames(message) => invalid(message),
            other => other,
        })
    }

    /// Resolve the list for a configuration: an explicit file wins over the
    /// dataset's built-in list.
    pub fn resolve(dataset: &str, file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = file {
            return Self::from_file(path);
        }
        Self::builtin(dataset).ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "no built-in attribute list for dataset {dataset:?}; set dataset.attributes_file"
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Position of a name in the list.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_peta() {
        let list = AttributeList::builtin("PETA").unwrap();
        assert_eq!(list.len(), 116);
        assert_eq!(list.get(0), Some("personalLess30"));
        assert_eq!(list.get(115), Some("carryingYellow"));
        assert_eq!(list.index_of("carryingBackpack"), Some(4));
    }

    #[test]
    fn test_builtin_unknown_dataset() {
        assert!(AttributeList::builtin("rap").is_none());
        assert!(AttributeList::resolve("rap", None).is_err());
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        assert!(matches!(
            AttributeList::new(Vec::<String>::new()),
            Err(ConfigError::AttributeNames(_))
        ));
        let err = AttributeList::new(["hat", "hat"]).unwrap_err();
        assert!(matches!(err, ConfigError::AttributeNames(_)));
        assert!(err.to_string().contains("listed twice"));
        assert!(AttributeList::new(["hat", " "]).is_err());
    }

    #[test]
    fn test_from_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attrs.txt");
        std::fs::write(&path, "# PA100k subset\nFemale\n\nAgeOver60\nHat\n").unwrap();
        let list = AttributeList::from_file(&path).unwrap();
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["Female", "AgeOver60", "Hat"]);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attrs.json");
        std::fs::write(&path, r#"["Female", "Hat"]"#).unwrap();
        let list = AttributeList::resolve("rap", Some(&path)).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attrs.json");
        std::fs::write(&path, r#"["Hat", "Hat"]"#).unwrap();
        let err = AttributeList::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Attributes { .. }));
        assert!(err.to_string().contains("listed twice"));
    }
}
