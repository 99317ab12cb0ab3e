pub mod notifier;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body of the service call made for each dialed digit. Serialises to `{}`
/// when no entity is configured.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("server answered {0}")]
    Status(reqwest::StatusCode),
}
