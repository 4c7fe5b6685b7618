pub mod pool_correlation;

use crate::error::Result;
use crate::model::labeled::LabeledTensor;
use crate::model::score::Score;

pub use pool_correlation::PoolCorrelation;

// NoOverlap and DegenerateInput make the holdout loop skip the subject.
pub trait Metric {
    fn score(&self, pool: &LabeledTensor, heldout: &LabeledTensor) -> Result<Score>;
}

impl<F> Metric for F
where
    F: Fn(&LabeledTensor, &LabeledTensor) -> Result<Score>,
{
    fn score(&self, pool: &LabeledTensor, heldout: &LabeledTensor) -> Result<Score> {
        self(pool, heldout)
    }
}
