pub mod stage1_holdout;
pub mod stage2_subsample;
pub mod stage3_collect;
pub mod stage4_fit;
pub mod stage5_extrapolate;
pub mod stage6_aggregate;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use crate::error::Result;
use crate::metrics::Metric;
use crate::model::config::CeilingConfig;
use crate::model::labeled::LabeledTensor;
use crate::model::score::Score;
use crate::store::ResultStore;
use stage1_holdout::HoldoutSubjectCeiling;
use stage3_collect::{CollectInputs, PostProcess, collect};
use stage6_aggregate::extrapolate;

pub const COLLECT_KEY: &str = "collect";
pub const CEILING_KEY: &str = "ceiling";

pub struct ExtrapolationCeiling {
    pub config: CeilingConfig,
    holdout: HoldoutSubjectCeiling,
    post_process: Option<Box<PostProcess>>,
    store: Option<ResultStore>,
}

impl ExtrapolationCeiling {
    pub fn new(config: CeilingConfig) -> Result<Self> {
        config.validate()?;
        let holdout = HoldoutSubjectCeiling::new(&config.subject_coord, &config.unit_dim);
        Ok(Self {
            config,
            holdout,
            post_process: None,
            store: None,
        })
    }

    pub fn with_post_process<F>(mut self, post_process: F) -> Self
    where
        F: Fn(Score) -> Result<Score> + 'static,
    {
        self.post_process = Some(Box::new(post_process));
        self
    }

    pub fn with_store(mut self, store: ResultStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn holdout(&self) -> &HoldoutSubjectCeiling {
        &self.holdout
    }

    pub fn collect(
        &self,
        identifier: &str,
        assembly: &LabeledTensor,
        metric: &dyn Metric,
    ) -> Result<Score> {
        let compute = || {
            let mut rng = StdRng::seed_from_u64(self.config.seed);
            let inputs = CollectInputs {
                holdout: &self.holdout,
                strategy: self.config.subset_strategy,
                post_process: self.post_process.as_deref(),
            };
            collect(assembly, metric, &inputs, &mut rng)
        };
        match &self.store {
            Some(store) => store.get_or_compute(COLLECT_KEY, identifier, compute),
            None => compute(),
        }
    }

    pub fn extrapolate(&self, collected: &Score) -> Result<Score> {
        extrapolate(collected, &self.config)
    }

    pub fn ceiling(
        &self,
        identifier: &str,
        assembly: &LabeledTensor,
        metric: &dyn Metric,
    ) -> Result<Score> {
        let compute = || {
            let collected = self.collect(identifier, assembly, metric)?;
            let ceiling = self.extrapolate(&collected)?;
            info!(
                "ceiling `{identifier}`: center {:.4}",
                ceiling.center().unwrap_or(f64::NAN)
            );
            Ok(ceiling)
        };
        match &self.store {
            Some(store) => store.get_or_compute(CEILING_KEY, identifier, compute),
            None => compute(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/pipeline/mod.rs"]
mod tests;
