//! Label dictionary loading.
//!
//! The recognition model maps class indices to labels through an ordered
//! dictionary, one label per line. The dictionary is loaded once and treated
//! as read-only for the lifetime of a pipeline; its length drives the
//! model-compatibility check.

use crate::core::errors::OcrError;
use std::path::Path;

/// An ordered, read-only sequence of label strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    labels: Vec<String>,
}

impl Dictionary {
    /// Creates a dictionary from pre-assembled labels.
    ///
    /// Fails on an empty list or on labels that are empty strings.
    pub fn from_labels(labels: Vec<String>) -> Result<Self, OcrError> {
        if labels.is_empty() {
            return Err(OcrError::invalid_input("dictionary has no labels"));
        }
        if let Some(pos) = labels.iter().position(|l| l.is_empty()) {
            return Err(OcrError::invalid_input(format!(
                "dictionary label {pos} is empty"
            )));
        }
        Ok(Self { labels })
    }

    /// Parses dictionary content: one label per line, blank lines and `#`
    /// comment lines filtered, order defines the label index.
    pub fn parse(content: &str) -> Result<Self, OcrError> {
        let labels: Vec<String> = content
            .lines()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| line.to_string())
            .collect();
        Self::from_labels(labels)
    }

    /// Loads a dictionary file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OcrError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| OcrError::InvalidInput {
            message: format!(
                "failed to read label dictionary from '{}': {}",
                path.display(),
                e
            ),
        })?;
        Self::parse(&content)
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true when the dictionary holds no labels.
    ///
    /// Construction rejects empty dictionaries, so this is always false for
    /// a built value; it exists for the usual container contract.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The label at `index`, or None when out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// All labels in index order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_filters_comments_and_blank_lines() {
        let dict = Dictionary::parse("# header\na\n\nb\n# note\nc\n").unwrap();
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.get(0), Some("a"));
        assert_eq!(dict.get(2), Some("c"));
        assert_eq!(dict.get(3), None);
    }

    #[test]
    fn test_parse_handles_crlf_endings() {
        let dict = Dictionary::parse("x\r\ny\r\n").unwrap();
        assert_eq!(dict.labels(), &["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_all_comments_is_an_error() {
        assert!(Dictionary::parse("# only\n# comments\n\n").is_err());
    }

    #[test]
    fn test_from_labels_rejects_empty_entries() {
        let result = Dictionary::from_labels(vec!["a".into(), String::new()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "alpha").unwrap();
        writeln!(file, "beta").unwrap();
        let dict = Dictionary::load(file.path()).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.get(1), Some("beta"));
    }

    #[test]
    fn test_load_missing_file_names_the_path() {
        let err = Dictionary::load("/nonexistent/labels.txt").unwrap_err();
        assert!(err.to_string().contains("labels.txt"));
    }
}
