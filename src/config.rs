//! Matcher configuration, loadable from TOML.
//!
//! ```toml
//! start_rule = "root"
//! vocab_type = "byte_level"
//! closure_cache_capacity = 8000
//! acceptance_cache_capacity = 1024
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, ensure};
use serde::{Deserialize, Serialize};

use crate::tokenizer::{TokenizerInfo, VocabType};

pub const DEFAULT_START_RULE: &str = "root";
pub const DEFAULT_CLOSURE_CACHE_CAPACITY: usize = 8000;
pub const DEFAULT_ACCEPTANCE_CACHE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplerConfig {
    /// Rule the generated text must match.
    pub start_rule: String,
    /// How encoded vocabulary entries are turned into bytes.
    pub vocab_type: VocabType,
    /// Maximum memoized epsilon closures.
    pub closure_cache_capacity: usize,
    /// Maximum memoized per-stack acceptance bitmaps.
    pub acceptance_cache_capacity: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            start_rule: DEFAULT_START_RULE.to_owned(),
            vocab_type: VocabType::default(),
            closure_cache_capacity: DEFAULT_CLOSURE_CACHE_CAPACITY,
            acceptance_cache_capacity: DEFAULT_ACCEPTANCE_CACHE_CAPACITY,
        }
    }
}

impl SamplerConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| anyhow!("Failed to parse sampler config TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sampler config: {path:?}"))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize sampler config: {}", e))
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.start_rule.is_empty(), "start_rule must not be empty");
        ensure!(self.closure_cache_capacity > 0, "closure_cache_capacity must be > 0");
        ensure!(self.acceptance_cache_capacity > 0, "acceptance_cache_capacity must be > 0");
        Ok(())
    }

    /// Decode `encoded_vocab` with this config's [`VocabType`].
    pub fn tokenizer_info(
        &self,
        encoded_vocab: &[String],
        eos_token_id: u32,
    ) -> Result<TokenizerInfo> {
        TokenizerInfo::new(encoded_vocab, self.vocab_type, eos_token_id, None)
    }
}
