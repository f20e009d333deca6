/// The model mapping translates the model names callers ask for into the model names the backend
/// serves. It's loaded once at startup (either the built-in table or a JSON file) and never
/// changes afterwards.
///
/// Lookups never fail: a model that isn't in the table is forwarded under its own name.
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};
use tracing::{debug, info};

/// The backend model every built-in alias points at.
pub const DEFAULT_BACKEND_MODEL: &str = "deepseek-ai/deepseek-r1-0528";

const BUILTIN_ALIASES: [&str; 4] = ["gpt-3.5-turbo", "gpt-4", "gpt-4-turbo", "gpt-4o"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelMapping {
    entries: BTreeMap<String, String>,
}

impl Default for ModelMapping {
    fn default() -> Self {
        BUILTIN_ALIASES
            .iter()
            .map(|alias| (alias.to_string(), DEFAULT_BACKEND_MODEL.to_string()))
            .collect()
    }
}

impl FromIterator<(String, String)> for ModelMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        ModelMapping {
            entries: iter.into_iter().collect(),
        }
    }
}

impl ModelMapping {
    /// Reads a flat JSON object of `{"inbound": "backend"}` pairs.
    pub async fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read model mapping {}: {}", path.display(), e))?;

        let mapping: ModelMapping = serde_json::from_str(&contents)
            .map_err(|e| anyhow!("Failed to parse model mapping {}: {}", path.display(), e))?;

        info!(
            "Loaded {} model mappings from {}",
            mapping.len(),
            path.display()
        );
        Ok(mapping)
    }

    /// Returns the backend model for `model`, or `model` itself when it isn't mapped.
    pub fn resolve<'a>(&'a self, model: &'a str) -> &'a str {
        match self.entries.get(model) {
            Some(mapped) => {
                debug!("Resolved model {} to {}", model, mapped);
                mapped
            }
            None => model,
        }
    }

    /// The caller-facing model names, in sorted order.
    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
