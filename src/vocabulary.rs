use ndarray::ArrayView1;

use crate::errors::{GarmentError, Result};

pub const DEFAULT_STYLES: [&str; 4] = ["casual", "formal", "sport", "chic"];
pub const DEFAULT_SEASONS: [&str; 4] = ["summer", "winter", "fall", "spring"];

/// Ordered label table for one classifier head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    name: String,
    labels: Vec<String>,
}

impl Vocabulary {
    /// Labels are trimmed; an empty table or a blank label is a configuration error.
    pub fn new<S: Into<String>>(name: &str, labels: impl IntoIterator<Item = S>) -> Result<Self> {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|label| Into::<String>::into(label).trim().to_string())
            .collect();
        if labels.is_empty() {
            return Err(GarmentError::Configuration {
                message: format!("{name} labels must not be empty"),
            });
        }
        if let Some(position) = labels.iter().position(String::is_empty) {
            return Err(GarmentError::Configuration {
                message: format!("{name} label #{} is blank", position + 1),
            });
        }
        Ok(Self {
            name: name.to_string(),
            labels,
        })
    }

    pub fn styles() -> Self {
        Self {
            name: "style".to_string(),
            labels: DEFAULT_STYLES.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn seasons() -> Self {
        Self {
            name: "season".to_string(),
            labels: DEFAULT_SEASONS.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Picks the label of the highest score. The score vector must have one
    /// entry per label.
    pub fn pick(&self, scores: ArrayView1<f32>) -> Result<&str> {
        if scores.len() != self.labels.len() {
            return Err(GarmentError::shape_mismatch(
                format!("{} head", self.name),
                format!(
                    "expected {} scores, got {}",
                    self.labels.len(),
                    scores.len()
                ),
            ));
        }
        let index = argmax(scores).ok_or_else(|| {
            GarmentError::shape_mismatch(format!("{} head", self.name), "no finite score")
        })?;
        Ok(&self.labels[index])
    }
}

/// Index of the largest value; the first one wins on ties. NaN entries are skipped.
pub fn argmax(values: ArrayView1<f32>) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
