//! Class-index to label mapping.

use std::path::Path;

use anyhow::Result;

use crate::Fault;

/// Fixed label table, loaded once at startup. Index position is the model's
/// class index.
#[derive(Clone, Debug)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Load labels from a text file, one label per line. Blank lines and
    /// surrounding whitespace are ignored.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Fault::Configuration(format!("cannot read label file {}: {}", path.display(), e))
        })?;
        let labels: Vec<String> = raw
            .lines()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .map(|line| line.to_string())
            .collect();
        if labels.is_empty() {
            return Err(
                Fault::Configuration(format!("label file {} is empty", path.display())).into(),
            );
        }
        Ok(Self { labels })
    }

    pub fn from_labels(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Table for a single-class model.
    pub fn single(label: &str) -> Self {
        Self {
            labels: vec![label.to_string()],
        }
    }

    /// Resolve a class index. An index the table does not know means the
    /// model and the table disagree, which is a configuration fault.
    pub fn label_for(&self, class_id: usize) -> Result<&str> {
        self.labels
            .get(class_id)
            .map(|label| label.as_str())
            .ok_or_else(|| {
                Fault::Configuration(format!(
                    "model produced class index {} but the label table has {} entries",
                    class_id,
                    self.labels.len()
                ))
                .into()
            })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.iter().any(|known| known == label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
