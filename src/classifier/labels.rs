//! Class label list

use std::path::Path;

/// Labels the bundled model was trained on, in output order
pub const DEFAULT_CLASS_NAMES: [&str; 10] = [
    "Basale",
    "Betle",
    "Drumstick",
    "Guava",
    "Jackfruit",
    "Lemon",
    "Mentha",
    "Neem",
    "Roxburgh fig",
    "sinensis",
];

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClassNamesError {
    #[error("no class names")]
    Empty,
    #[error("duplicate class name: {0}")]
    Duplicate(String),
}

/// Ordered, non-empty list of distinct class labels.
///
/// Index `i` names the model's `i`-th output score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames(Vec<String>);

impl ClassNames {
    /// Labels from a file (one per line) or the default list when the file
    /// cannot be read or its labels are unusable
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(names) => {
                    tracing::info!("Loaded {} class names from {}", names.len(), path.display());
                    names
                }
                Err(e) => {
                    tracing::warn!("{}: {}, using default class names", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Cannot read {} ({}), using default class names", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ClassNamesError> {
        let mut names: Vec<String> = Vec::new();
        for line in contents.lines().map(str::trim).filter(|line| !line.is_empty()) {
            if names.iter().any(|n| n == line) {
                return Err(ClassNamesError::Duplicate(line.to_string()));
            }
            names.push(line.to_string());
        }

        if names.is_empty() {
            return Err(ClassNamesError::Empty);
        }
        Ok(Self(names))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ClassNames {
    fn default() -> Self {
        Self(DEFAULT_CLASS_NAMES.iter().map(|s| s.to_string()).collect())
    }
}
