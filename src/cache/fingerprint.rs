//! Deterministic cache keys for enrichment requests

use crate::enrich::prompt::{PROMPT_VERSION, build_request};
use crate::models::RouteRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 hex digest over everything that shapes a route's LLM response
///
/// Covers the prompt format version, provider, model and the request actually sent
/// for the route (method, path, system and user prompt). Each field is
/// length-prefixed. Anything the prompt leaves out, such as source location, is not
/// part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(provider: &str, model: &str, route: &RouteRecord) -> Self {
        let request = build_request(route);
        let mut hasher = Sha256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };

        field(PROMPT_VERSION.as_bytes());
        field(provider.as_bytes());
        field(model.as_bytes());
        field(request.method.as_str().as_bytes());
        field(request.path.as_bytes());
        field(request.system_prompt.as_bytes());
        field(request.user_prompt.as_bytes());

        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
