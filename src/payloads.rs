// Typed job payloads produced by the binder app.
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::job::JobOptions;
use crate::queue::QueueName;

pub trait Job: Serialize + DeserializeOwned + Send + Sync {
    fn name() -> &'static str;

    fn queue() -> QueueName;

    fn options() -> JobOptions {
        JobOptions::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingJob {
    pub requested_by: String,
    pub requested_at: DateTime<Utc>,
}

impl Job for TrendingJob {
    fn name() -> &'static str {
        "calculate-trending"
    }

    fn queue() -> QueueName {
        QueueName::Trending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsJob {
    pub user_id: String,
    pub requested_by: String,
}

impl Job for RecommendationsJob {
    fn name() -> &'static str {
        "generate-recommendations"
    }

    fn queue() -> QueueName {
        QueueName::Recommendations
    }
}

/// Imports a recipe from an external page into the user's binders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub user_id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binder_id: Option<String>,
}

impl Job for ImportJob {
    fn name() -> &'static str {
        "import-recipe"
    }

    fn queue() -> QueueName {
        QueueName::Import
    }
}
