/// Data for the /v1/models endpoint.
/// This endpoint mimics the openai API's models endpoint. Each 'model' is a caller-facing name
/// from the model mapping.
use serde::{Deserialize, Serialize};

use crate::mapping::ModelMapping;
use crate::translate::unix_timestamp;

/// The organization reported as owning every listed model.
pub const OWNED_BY: &str = "nvidia-nim-proxy";

/// The returned models from the /v1/models endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Model {
    /// The model identifier, which can be referenced in the API endpoints.
    pub id: String,
    /// The Unix timestamp (in seconds) of when the list was produced.
    pub created: u64,
    /// The object type, which is always "model".
    pub object: String,
    /// The organization that owns the model.
    pub owned_by: String,
}

impl Model {
    pub(crate) fn new(id: &str, created: u64) -> Self {
        Model {
            id: id.to_owned(),
            created,
            object: "model".into(),
            owned_by: OWNED_BY.into(),
        }
    }
}

/// The response from the /v1/models endpoint, which is a list of models.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ListModelResponse {
    /// The object type, which is always "list".
    pub object: String,
    /// A list of model objects.
    pub data: Vec<Model>,
}

impl ListModelResponse {
    /// Creates a new ListModelResponse with one entry per mapped model.
    pub(crate) fn from_mapping(mapping: &ModelMapping) -> Self {
        let created = unix_timestamp();
        let data = mapping
            .models()
            .map(|id| Model::new(id, created))
            .collect::<Vec<_>>();
        ListModelResponse {
            object: "list".into(),
            data,
        }
    }
}
