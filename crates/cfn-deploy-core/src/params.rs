//! User parameter parsing and stack parameter assembly.
//!
//! The pipeline hands over a single `key=value,key=value` string. Keys of the
//! form `CFN_PARAM:<name>` become stack parameters named `<name>`; one more
//! entry carrying the resolved image reference is always appended.

use crate::error::{DeployError, Result};
use crate::types::Parameter;

pub const PARAM_MARKER: &str = "CFN_PARAM";
pub const DEFAULT_IMAGE_PARAMETER: &str = "DockerImageName";

// ---------------------------------------------------------------------------
// UserParams
// ---------------------------------------------------------------------------

/// Ordered key/value pairs from the pipeline's user parameter string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserParams {
    entries: Vec<(String, String)>,
}

impl UserParams {
    /// Parse `a=1, b=2`. Values may themselves contain `=`. A key given
    /// twice is rejected rather than letting one value shadow the other.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut params = UserParams::default();
        for segment in raw.split(',') {
            if segment.trim().is_empty() {
                continue;
            }
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                DeployError::config(format!(
                    "user parameter '{}' is not of the form key=value",
                    segment.trim()
                ))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(DeployError::config(format!(
                    "user parameter '{}' has an empty key",
                    segment.trim()
                )));
            }
            params.insert(key, value.trim())?;
        }
        Ok(params)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        if self.get(&key).is_some() {
            return Err(DeployError::config(format!(
                "user parameter '{key}' is supplied more than once"
            )));
        }
        self.entries.push((key, value.into()));
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Look up a key that must be present and non-empty.
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(DeployError::config(format!(
                "missing required user parameter '{key}'"
            ))),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Build the stack parameter list: every `CFN_PARAM:<name>` entry in input
/// order, followed by `image_key=image`.
pub fn assemble(user_params: &UserParams, image: &str, image_key: &str) -> Result<Vec<Parameter>> {
    let prefix = format!("{PARAM_MARKER}:");
    let mut parameters: Vec<Parameter> = Vec::new();

    for (key, value) in user_params.iter() {
        let Some(name) = key.strip_prefix(&prefix) else {
            continue;
        };
        if name.is_empty() {
            return Err(DeployError::config(format!(
                "user parameter '{key}' names no stack parameter"
            )));
        }
        parameters.push(Parameter::new(name, value));
    }

    if parameters.iter().any(|p| p.key == image_key) {
        return Err(DeployError::config(format!(
            "stack parameter '{image_key}' is reserved for the image reference; \
             remove {PARAM_MARKER}:{image_key} from the user parameters"
        )));
    }
    parameters.push(Parameter::new(image_key, image));

    Ok(parameters)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
