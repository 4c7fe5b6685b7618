pub mod config;
pub mod labeled;
pub mod score;

pub use config::{CeilingConfig, SubsetStrategy};
pub use labeled::{Coord, Dim, Label, LabeledTensor, Reduction, merge};
pub use score::{Provenance, Score, SkipStats};
