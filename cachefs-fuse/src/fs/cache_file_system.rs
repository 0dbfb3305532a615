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

use crate::FuseResult;
use cachefs_client::{Cache, RemoteStore};
use cachefs_common::conf::CacheConf;
use cachefs_common::state::FileAttr;
use log::{debug, info, warn};

/// Filesystem-operation layer between the FUSE dispatch table and the block
/// cache. Keeps the policy the engine refuses to own: the write counter
/// that triggers periodic full flushes, the resident-block budget that
/// triggers eviction after reads and writes, and the staleness probe that
/// discards a file's cache when another client changed it remotely.
pub struct CacheFileSystem<S> {
    conf: CacheConf,
    cache: Cache<S>,
    write_ops: u64,
}

impl<S: RemoteStore> CacheFileSystem<S> {
    pub fn new(conf: CacheConf, store: S) -> FuseResult<Self> {
        conf.validate()?;
        info!(
            "cache block size {} bytes, capacity {} blocks ({} bytes), \
             evict {} per pass, flush every {} writes",
            conf.block_size,
            conf.max_cache_blocks,
            conf.capacity_bytes(),
            conf.evict_count,
            conf.flush_interval
        );
        let cache = Cache::new(conf.block_size, store);
        Ok(Self {
            conf,
            cache,
            write_ops: 0,
        })
    }

    pub fn conf(&self) -> &CacheConf {
        &self.conf
    }

    pub fn cache(&self) -> &Cache<S> {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache<S> {
        &mut self.cache
    }

    pub fn write_ops(&self) -> u64 {
        self.write_ops
    }

    pub fn open(&mut self, path: &str) -> FuseResult<()> {
        self.cache.stat(path)?;
        Ok(())
    }

    pub fn access(&mut self, path: &str) -> FuseResult<()> {
        self.check_stale(path)?;
        self.cache.stat(path)?;
        Ok(())
    }

    pub fn getattr(&mut self, path: &str) -> FuseResult<FileAttr> {
        self.check_stale(path)?;
        Ok(self.cache.stat(path)?)
    }

    pub fn read(&mut self, path: &str, offset: u64, buf: &mut [u8]) -> FuseResult<usize> {
        let read_size = self.cache.read(path, offset, buf)?;
        self.evict_over_budget()?;
        Ok(read_size)
    }

    pub fn write(&mut self, path: &str, offset: u64, buf: &[u8]) -> FuseResult<()> {
        self.cache.write(path, offset, buf)?;
        self.write_ops += 1;
        if self.write_ops % self.conf.flush_interval == 0 {
            debug!("write op {} reached flush interval", self.write_ops);
            self.cache.flush_dirty_blocks()?;
        }
        self.evict_over_budget()?;
        Ok(())
    }

    pub fn truncate(&mut self, path: &str, size: u64) -> FuseResult<()> {
        self.cache.truncate(path, size)?;
        Ok(())
    }

    pub fn flush(&mut self, path: &str) -> FuseResult<()> {
        self.cache.flush(path)?;
        Ok(())
    }

    pub fn fsync(&mut self, path: &str) -> FuseResult<()> {
        self.flush(path)
    }

    /// Drops everything cached for `path`. Called after remote unlink or
    /// rename, and by the staleness probe.
    pub fn invalidate(&mut self, path: &str) {
        self.cache.invalidate(path);
    }

    /// Compares the file's remote timestamps against the last observed
    /// ones and discards the cached file on divergence. Conflicts are
    /// detected, never merged; the next access refetches from scratch.
    fn check_stale(&mut self, path: &str) -> FuseResult<()> {
        let Some(cached_time) = self.cache.file_time(path) else {
            return Ok(());
        };
        if self.cache.is_stale(path) {
            info!("dropping stale cache for {}", path);
            self.cache.invalidate(path);
            return Ok(());
        }
        let remote = self.cache.store_mut().fetch_attr(path)?;
        if remote.time != cached_time {
            warn!("{} changed remotely, dropping cached state", path);
            self.cache.invalidate(path);
        }
        Ok(())
    }

    fn evict_over_budget(&mut self) -> FuseResult<()> {
        if self.cache.cached_blocks() > self.conf.max_cache_blocks {
            let evicted = self.cache.evict_blocks(self.conf.evict_count)?;
            debug!(
                "cache over budget, evicted {} blocks ({} resident)",
                evicted,
                self.cache.cached_blocks()
            );
        }
        Ok(())
    }
}
