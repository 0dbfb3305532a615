// Copyright 2025 OPPO.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{FsError, FsResult};
use serde::{Deserialize, Serialize};

/// Client cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConf {
    // cache block size in bytes
    pub block_size: usize,

    // maximum number of resident cache blocks
    pub max_cache_blocks: usize,

    // number of blocks removed per eviction pass
    pub evict_count: usize,

    // number of write operations between automatic full flushes
    pub flush_interval: u64,
}

impl CacheConf {
    pub fn from_toml(s: &str) -> FsResult<Self> {
        let conf: CacheConf =
            toml::from_str(s).map_err(|e| FsError::InvalidArgument(e.to_string()))?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> FsResult<()> {
        if self.block_size == 0 {
            return Err(FsError::InvalidArgument("block_size must be > 0".into()));
        }
        if self.max_cache_blocks == 0 {
            return Err(FsError::InvalidArgument(
                "max_cache_blocks must be > 0".into(),
            ));
        }
        if self.evict_count == 0 {
            return Err(FsError::InvalidArgument("evict_count must be > 0".into()));
        }
        if self.flush_interval == 0 {
            return Err(FsError::InvalidArgument(
                "flush_interval must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Total cache capacity in bytes implied by this configuration.
    pub fn capacity_bytes(&self) -> u64 {
        self.block_size as u64 * self.max_cache_blocks as u64
    }
}

impl Default for CacheConf {
    fn default() -> Self {
        Self {
            block_size: 4 * 1024,

            // 256 MB of 4 KB blocks
            max_cache_blocks: 64 * 1024,

            evict_count: 100,

            flush_interval: 10000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_conf_is_valid() {
        let conf = CacheConf::default();
        conf.validate().unwrap();
        assert_eq!(conf.capacity_bytes(), 256 * 1024 * 1024);
    }

    #[test]
    fn parses_partial_toml() {
        let conf = CacheConf::from_toml("block_size = 16\nevict_count = 2").unwrap();
        assert_eq!(conf.block_size, 16);
        assert_eq!(conf.evict_count, 2);
        assert_eq!(conf.flush_interval, 10000);
    }

    #[test]
    fn rejects_zero_block_size() {
        assert!(CacheConf::from_toml("block_size = 0").is_err());
    }
}
