use serde::{Deserialize, Serialize};

use crate::tag::LATEST_VERSION;

/// Where the encoder writes reference count checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoints {
    /// Before every value.
    #[default]
    EveryValue,
    /// Only before values that take a reference id (composites, boxed
    /// primitives, dates, regexps, buffers, views, image data). Every
    /// composite is still checked at least once.
    CompositeBoundaries,
}

/// Tunables for a serializer or deserializer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Deepest composite nesting the encoder writes and the decoder reads.
    pub max_depth: usize,
    pub checkpoints: Checkpoints,
    /// Newest wire version the decoder accepts.
    pub max_version: u32,
}

impl Options {
    pub const DEFAULT_MAX_DEPTH: usize = 20_000;

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_checkpoints(mut self, checkpoints: Checkpoints) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn with_max_version(mut self, max_version: u32) -> Self {
        self.max_version = max_version;
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            checkpoints: Checkpoints::EveryValue,
            max_version: LATEST_VERSION,
        }
    }
}
