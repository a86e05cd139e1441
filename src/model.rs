// Request payloads sent to the meta-manager API.
// The values are the fixed deployment used for manual registration; they
// are built fresh for every action and dropped after being serialized.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MODEL_NAME: &str = "mlt-batch";
pub const VARIANT_PREFIX: &str = "sllim-tg-pkg-300-manual";

/// Full model variant description POSTed to `/v1/models/register`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub model_name: String,
    pub variant: String,
    pub owner_team: String,
    pub omd_business_service: String,
    pub related_features: Map<String, Value>,
    pub inference_configuration: InferenceConfiguration,
    pub serving_configuration: ServingConfiguration,
    pub serving_regions: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct InferenceConfiguration {
    /// `-1` means no limit on returned items.
    pub response_item_limit: i64,
}

/// Autoscaling, instance and hardware settings of a variant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServingConfiguration {
    pub autoscaling: bool,
    pub autoscale_conditions: AutoscaleConditions,
    pub min_instance: u32,
    pub max_instance: u32,
    pub machine_type: String,
    pub processor: String,
    pub framework: Framework,
    pub shadow_config: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AutoscaleConditions {
    pub rps: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Framework {
    pub framework_name: String,
    pub framework_version: String,
}

/// Body of the PUT to `/v1/models/update/{id}`. Only the serving
/// configuration is sent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub model: ModelUpdate,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelUpdate {
    pub serving_configuration: ServingConfiguration,
}

impl ServingConfiguration {
    /// CPU tensorflow serving on ml.c5.xlarge with the given scaling limits.
    pub fn cpu_tensorflow(rps: u32, min_instance: u32, max_instance: u32) -> Self {
        ServingConfiguration {
            autoscaling: true,
            autoscale_conditions: AutoscaleConditions { rps },
            min_instance,
            max_instance,
            machine_type: "ml.c5.xlarge".into(),
            processor: "cpu".into(),
            framework: Framework {
                framework_name: "tensorflow".into(),
                framework_version: "2.9.2".into(),
            },
            shadow_config: Map::new(),
        }
    }
}

impl ModelConfig {
    /// Registration record for a manual run started at `timestamp`
    /// (unix seconds). The timestamp makes the variant name unique per run.
    pub fn manual(timestamp: i64) -> Self {
        ModelConfig {
            model_name: MODEL_NAME.into(),
            variant: format!("{}-{}", VARIANT_PREFIX, timestamp),
            owner_team: "personalization".into(),
            omd_business_service: "content-discovery".into(),
            related_features: Map::new(),
            inference_configuration: InferenceConfiguration {
                response_item_limit: -1,
            },
            serving_configuration: ServingConfiguration::cpu_tensorflow(20, 1, 5),
            serving_regions: vec!["us-east-1".into()],
        }
    }

    pub fn manual_now() -> Self {
        Self::manual(chrono::Utc::now().timestamp())
    }
}

impl UpdateRequest {
    /// Lowers the autoscale threshold to 10 rps and raises the instance
    /// ceiling to 30.
    pub fn scaled_serving() -> Self {
        UpdateRequest {
            model: ModelUpdate {
                serving_configuration: ServingConfiguration::cpu_tensorflow(10, 1, 30),
            },
        }
    }
}
