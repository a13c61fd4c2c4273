use crate::{config::GeneratorConfig, encoder::MixedRadix, template::Template};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// ranges with more values than this are shortened to their first and last few values
const MAX_LISTED_VALUES: usize = 10;
const ELIDED_VALUES_EDGE: usize = 5;

/// Overview of a generated job array, printed on request
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    pub total_jobs: u64,
    // whether the command receives the job array index through `[id]`
    #[serde(default)]
    pub uses_task_id: bool,
    #[serde(default)]
    pub ranges: Vec<RangeSummary>,
    #[serde(default)]
    pub slurm_options: Vec<String>,
    #[serde(default)]
    pub environment: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RangeSummary {
    pub source: String,
    pub count: usize,
    pub values: Vec<String>,
}

impl Summary {
    pub fn new(config: &GeneratorConfig, template: &Template, encoder: &MixedRadix) -> Self {
        let ranges = template
            .dimensions
            .iter()
            .map(|dimension| {
                let values = &dimension.values;
                let values = if values.len() > MAX_LISTED_VALUES {
                    values[..ELIDED_VALUES_EDGE]
                        .iter()
                        .cloned()
                        .chain(std::iter::once("...".to_string()))
                        .chain(values[values.len() - ELIDED_VALUES_EDGE..].iter().cloned())
                        .collect_vec()
                } else {
                    values.clone()
                };

                RangeSummary {
                    source: dimension.source.clone(),
                    count: dimension.cardinality(),
                    values,
                }
            })
            .collect();

        Self {
            total_jobs: encoder.total(),
            uses_task_id: template.has_task_id(),
            ranges,
            slurm_options: config
                .directives
                .iter()
                .map(|directive| format!("--{directive}"))
                .collect(),
            environment: config.environment.clone(),
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
