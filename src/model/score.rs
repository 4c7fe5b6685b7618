use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::labeled::{Dim, Label, LabeledTensor};

pub const AGGREGATION: &str = "aggregation";
pub const CENTER: &str = "center";
pub const ERROR: &str = "error";
pub const ERROR_LOW: &str = "error_low";
pub const ERROR_HIGH: &str = "error_high";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipStats {
    pub subjects: usize,
    pub subsets: usize,
    pub bootstrap_rounds: usize,
    pub units: usize,
}

impl SkipStats {
    pub fn absorb(&mut self, other: &SkipStats) {
        self.subjects += other.subjects;
        self.subsets += other.subsets;
        self.bootstrap_rounds += other.bootstrap_rounds;
        self.units += other.units;
    }

    pub fn total(&self) -> usize {
        self.subjects + self.subsets + self.bootstrap_rounds + self.units
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Box<Score>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_subject: Option<LabeledTensor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrapped_params: Option<LabeledTensor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_x: Option<LabeledTensor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skips: Option<SkipStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub values: LabeledTensor,
    #[serde(default)]
    pub provenance: Provenance,
}

impl Score {
    pub fn new(values: LabeledTensor) -> Self {
        Self {
            values,
            provenance: Provenance::default(),
        }
    }

    pub fn with_raw(mut self, raw: Score) -> Self {
        self.provenance.raw = Some(Box::new(raw));
        self
    }

    pub fn center_error(center: f64, error: f64) -> Result<Self> {
        Self::aggregated(&[(CENTER, center), (ERROR, error)])
    }

    pub fn center_interval(center: f64, error_low: f64, error_high: f64) -> Result<Self> {
        Self::aggregated(&[
            (CENTER, center),
            (ERROR_LOW, error_low),
            (ERROR_HIGH, error_high),
        ])
    }

    fn aggregated(entries: &[(&str, f64)]) -> Result<Self> {
        let labels = entries.iter().map(|(k, _)| Label::from(*k)).collect();
        let values = entries.iter().map(|(_, v)| *v).collect();
        Ok(Self::new(LabeledTensor::vector(
            Dim::indexed(AGGREGATION, labels),
            values,
        )?))
    }

    pub fn aggregation(&self, which: &str) -> Result<LabeledTensor> {
        self.values.sel(AGGREGATION, &Label::from(which))
    }

    pub fn center(&self) -> Result<f64> {
        self.aggregation(CENTER)?.item()
    }

    pub fn raw(&self) -> Option<&Score> {
        self.provenance.raw.as_deref()
    }

    pub fn skips(&self) -> SkipStats {
        self.provenance.skips.unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/score.rs"]
mod tests;
