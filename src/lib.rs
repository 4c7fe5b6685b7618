pub mod error;
pub mod input;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod store;

pub use error::{CeilingError, Result};
pub use metrics::{Metric, PoolCorrelation};
pub use model::{CeilingConfig, Label, LabeledTensor, Score, SkipStats, SubsetStrategy};
pub use pipeline::ExtrapolationCeiling;
pub use store::ResultStore;
