use serde::{Deserialize, Serialize};

use crate::error::{CeilingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubsetStrategy {
    Exhaustive,
    Random { max_subsets: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CeilingConfig {
    pub subject_coord: String,
    pub unit_dim: String,
    pub num_bootstraps: usize,
    pub seed: u64,
    pub asymptote_threshold: f64,
    pub interpolation_points: usize,
    pub confidence: f64,
    pub subset_strategy: SubsetStrategy,
}

impl Default for CeilingConfig {
    fn default() -> Self {
        Self::default_v1()
    }
}

impl CeilingConfig {
    pub fn default_v1() -> Self {
        Self {
            subject_coord: "subject".to_string(),
            unit_dim: "neuroid".to_string(),
            num_bootstraps: 100,
            seed: 0,
            asymptote_threshold: 0.0005,
            interpolation_points: 1000,
            confidence: 0.95,
            subset_strategy: SubsetStrategy::Exhaustive,
        }
    }

    pub fn subset_dim(&self) -> String {
        format!("sub_{}", self.subject_coord)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_bootstraps == 0 {
            return Err(CeilingError::Config("num_bootstraps must be > 0".to_string()));
        }
        if self.interpolation_points < 2 {
            return Err(CeilingError::Config(
                "interpolation_points must be >= 2".to_string(),
            ));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(CeilingError::Config(format!(
                "confidence must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        if !(self.asymptote_threshold > 0.0) {
            return Err(CeilingError::Config(format!(
                "asymptote_threshold must be > 0, got {}",
                self.asymptote_threshold
            )));
        }
        if self.subject_coord.is_empty() || self.unit_dim.is_empty() {
            return Err(CeilingError::Config(
                "subject_coord and unit_dim must be non-empty".to_string(),
            ));
        }
        if let SubsetStrategy::Random { max_subsets: 0 } = self.subset_strategy {
            return Err(CeilingError::Config("max_subsets must be > 0".to_string()));
        }
        Ok(())
    }
}
