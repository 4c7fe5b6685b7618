use thiserror::Error;

#[derive(Debug, Error)]
pub enum CeilingError {
    #[error("no comparable rows between pool and held-out partition: {0}")]
    NoOverlap(String),
    #[error("degenerate input: {0}")]
    DegenerateInput(String),
    #[error("curve fit failed: {0}")]
    FitFailure(String),
    #[error("no bootstrap round converged ({attempted} attempted)")]
    NoConvergedRounds { attempted: usize },
    #[error("missing structural key `{0}`")]
    MissingStructuralKey(String),
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),
    #[error("nothing to merge along `{0}`")]
    EmptyMerge(String),
    #[error("metric error: {0}")]
    Metric(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl CeilingError {
    pub fn skips_subject(&self) -> bool {
        matches!(
            self,
            CeilingError::NoOverlap(_) | CeilingError::DegenerateInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CeilingError>;
