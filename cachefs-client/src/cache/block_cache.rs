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

use crate::cache::{BlockEntry, BlockKey, RangeList, RecencyList};
use crate::store::RemoteStore;
use cachefs_common::state::{FileAttr, FileTime};
use cachefs_common::FsResult;
use fxhash::FxHashMap;
use log::{debug, warn};
use std::cmp::min;
use std::collections::hash_map::Entry;

/// Per-file cache state. The attribute record outlives block eviction and
/// is only dropped by invalidation.
#[derive(Debug)]
pub struct FileCache {
    pub attr: FileAttr,
    stale: bool,
    attr_dirty: bool,
    blocks: FxHashMap<u64, BlockEntry>,
}

impl FileCache {
    fn new(attr: FileAttr) -> Self {
        Self {
            attr,
            stale: false,
            attr_dirty: false,
            blocks: FxHashMap::default(),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    fn dirty_block_count(&self) -> usize {
        self.blocks.values().filter(|e| e.is_dirty()).count()
    }
}

/// Point-in-time view of the engine counters, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub cached_blocks: usize,
    pub dirty_blocks: usize,
    pub read_hits: u64,
    pub read_misses: u64,
    pub fetched_blocks: u64,
    pub flushed_blocks: u64,
    pub flushed_bytes: u64,
    pub evicted_blocks: u64,
}

#[derive(Debug, Default)]
struct Counters {
    read_hits: u64,
    read_misses: u64,
    fetched_blocks: u64,
    flushed_blocks: u64,
    flushed_bytes: u64,
    evicted_blocks: u64,
}

// A write-back run under construction: physically contiguous valid bytes
// collected from consecutive dirty blocks. `blocks` lists the blocks whose
// last valid range lands in this run; they turn Clean when the run is
// written back successfully.
struct PendingRun {
    start: u64,
    buf: Vec<u8>,
    blocks: Vec<u64>,
}

/// Write-back block cache over a remote store. Owns every `FileCache` and
/// one recency list shared by all files; the list mirrors the block maps
/// exactly, one node per live block entry.
///
/// Single-threaded by design: every operation, including the remote
/// round-trips it triggers, runs to completion before the next one starts.
pub struct Cache<S> {
    block_size: usize,
    files: FxHashMap<String, FileCache>,
    recency: RecencyList,
    store: S,
    last_read_hit: bool,
    counters: Counters,
}

impl<S: RemoteStore> Cache<S> {
    pub fn new(block_size: usize, store: S) -> Self {
        assert!(block_size > 0);
        Self {
            block_size,
            files: FxHashMap::default(),
            recency: RecencyList::new(),
            store,
            last_read_hit: false,
            counters: Counters::default(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Direct access to the remote store, for callers that need remote
    /// state the cache does not track (the adapter's staleness probe).
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn cached_blocks(&self) -> usize {
        self.recency.len()
    }

    pub fn dirty_blocks(&self) -> usize {
        self.files.values().map(|f| f.dirty_block_count()).sum()
    }

    /// Whether the last `read` call was served without any remote fetch.
    pub fn last_read_hit(&self) -> bool {
        self.last_read_hit
    }

    pub fn is_stale(&self, path: &str) -> bool {
        self.files.get(path).map(|f| f.stale).unwrap_or(false)
    }

    /// The remote timestamps last observed for this file, if cached.
    pub fn file_time(&self, path: &str) -> Option<FileTime> {
        self.files.get(path).map(|f| f.attr.time)
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            cached_blocks: self.cached_blocks(),
            dirty_blocks: self.dirty_blocks(),
            read_hits: self.counters.read_hits,
            read_misses: self.counters.read_misses,
            fetched_blocks: self.counters.fetched_blocks,
            flushed_blocks: self.counters.flushed_blocks,
            flushed_bytes: self.counters.flushed_bytes,
            evicted_blocks: self.counters.evicted_blocks,
        }
    }

    pub fn stat(&mut self, path: &str) -> FsResult<FileAttr> {
        self.ensure_attr(path)?;
        Ok(self.files.get(path).unwrap().attr)
    }

    /// Reads into `buf`, clamped at EOF; returns the number of bytes read.
    /// Blocks that are absent or only partially valid are completed from
    /// the remote first, one fetch per contiguous run of such blocks. Every
    /// touched block moves to the head of the recency list. On error the
    /// contents of `buf` are unspecified.
    pub fn read(&mut self, path: &str, offset: u64, buf: &mut [u8]) -> FsResult<usize> {
        self.ensure_attr(path)?;
        let fsize = self.files.get(path).unwrap().attr.size;
        if offset >= fsize || buf.is_empty() {
            self.last_read_hit = true;
            return Ok(0);
        }
        let size = min(buf.len() as u64, fsize - offset) as usize;

        let block_start = offset / self.block_size as u64;
        let block_end = (offset + size as u64 - 1) / self.block_size as u64 + 1;
        let hit = self.cache_blocks(path, block_start, block_end)?;
        self.last_read_hit = hit;
        if hit {
            self.counters.read_hits += 1;
        } else {
            self.counters.read_misses += 1;
        }

        let mut curr_block = block_start;
        let mut bstart = (offset % self.block_size as u64) as usize;
        let mut read_size = 0;
        while read_size < size {
            let bsize = min(self.block_size - bstart, size - read_size);
            self.read_block(path, curr_block, bstart, &mut buf[read_size..read_size + bsize]);
            curr_block += 1;
            read_size += bsize;
            bstart = 0;
        }
        Ok(size)
    }

    /// Writes `buf` at `offset`, growing the cached size if the write ends
    /// past it. Affected blocks become dirty; entries are created zero
    /// filled as needed. Never fetches: writing into an uncached region is
    /// legal and only marks the written sub-range valid.
    pub fn write(&mut self, path: &str, offset: u64, buf: &[u8]) -> FsResult<()> {
        self.ensure_attr(path)?;
        if buf.is_empty() {
            return Ok(());
        }
        let fc = self.files.get_mut(path).unwrap();
        let write_end = offset + buf.len() as u64;
        if write_end > fc.attr.size {
            fc.attr.size = write_end;
            fc.attr_dirty = true;
        }

        let mut curr_block = offset / self.block_size as u64;
        let mut bstart = (offset % self.block_size as u64) as usize;
        let mut written = 0;
        while written < buf.len() {
            let bsize = min(self.block_size - bstart, buf.len() - written);
            self.write_block(path, curr_block, bstart, &buf[written..written + bsize]);
            curr_block += 1;
            written += bsize;
            bstart = 0;
        }
        Ok(())
    }

    /// Changes the cached file size. Shrinking drops every block at or
    /// beyond the new boundary. The remote is not told until the next
    /// flush writes the attributes back.
    pub fn truncate(&mut self, path: &str, new_size: u64) -> FsResult<()> {
        self.ensure_attr(path)?;
        let old_size = self.files.get(path).unwrap().attr.size;
        if new_size < old_size {
            let block_bound = if new_size == 0 {
                0
            } else {
                (new_size - 1) / self.block_size as u64 + 1
            };
            self.delete_entries_beyond(path, block_bound);
        }
        let fc = self.files.get_mut(path).unwrap();
        if fc.attr.size != new_size {
            fc.attr.size = new_size;
            fc.attr_dirty = true;
        }
        Ok(())
    }

    /// Writes every dirty byte of this file back to the remote, then the
    /// attributes. Valid sub-ranges of dirty blocks are walked in ascending
    /// block order and physically contiguous bytes are coalesced into a
    /// single write-back call, across block boundaries. An error aborts
    /// immediately: blocks already written back stay Clean, the rest stay
    /// Dirty, and the flush can be resumed later.
    pub fn flush(&mut self, path: &str) -> FsResult<()> {
        let Some(fc) = self.files.get(path) else {
            return Ok(());
        };
        let mut dirty: Vec<u64> = fc
            .blocks
            .iter()
            .filter(|(_, e)| e.is_dirty())
            .map(|(b, _)| *b)
            .collect();
        if dirty.is_empty() && !fc.attr_dirty {
            return Ok(());
        }
        dirty.sort_unstable();
        self.flush_blocks(path, &dirty)?;

        let attr = self.files.get(path).unwrap().attr;
        let reply = match self.store.write_back_attr(path, &attr) {
            Ok(r) => r,
            Err(e) => {
                self.files.get_mut(path).unwrap().stale = true;
                return Err(e);
            }
        };
        let fc = self.files.get_mut(path).unwrap();
        if reply.before != fc.attr.time {
            warn!("remote changed under {} during attr write-back", path);
            fc.stale = true;
        }
        fc.attr.time = reply.after;
        fc.attr_dirty = false;
        Ok(())
    }

    /// Flushes every file with anything dirty: files owning cached blocks
    /// are walked least recently used first, then files whose attributes
    /// are dirty without any resident block (a deferred truncate after its
    /// blocks were dropped).
    pub fn flush_dirty_blocks(&mut self) -> FsResult<()> {
        let mut order: Vec<String> = Vec::new();
        for key in self.recency.iter_lru() {
            if !order.iter().any(|p| p == &key.path) {
                order.push(key.path.clone());
            }
        }
        for (path, fc) in &self.files {
            if fc.attr_dirty && !order.iter().any(|p| p == path) {
                order.push(path.clone());
            }
        }
        for path in order {
            self.flush(&path)?;
        }
        Ok(())
    }

    /// Removes up to `count` blocks from the cold end of the recency list.
    /// All dirty blocks are flushed first; eviction never discards data.
    /// Attribute records are kept.
    pub fn evict_blocks(&mut self, count: usize) -> FsResult<usize> {
        self.flush_dirty_blocks()?;
        let count = min(count, self.recency.len());
        let mut evicted = 0;
        while evicted < count {
            let key = self.recency.tail().cloned().expect("recency shorter than count");
            self.delete_entry(&key.path, key.block_num);
            evicted += 1;
        }
        self.counters.evicted_blocks += evicted as u64;
        debug!("evicted {} blocks, {} cached", evicted, self.recency.len());
        Ok(evicted)
    }

    /// Drops the file's blocks and its attribute record. The next access
    /// starts from a remote fetch.
    pub fn invalidate(&mut self, path: &str) {
        if let Some(fc) = self.files.remove(path) {
            for entry in fc.blocks.values() {
                self.recency.remove(entry.token());
            }
            debug!("invalidated {} ({} blocks)", path, fc.blocks.len());
        }
    }

    fn ensure_attr(&mut self, path: &str) -> FsResult<()> {
        if self.files.contains_key(path) {
            return Ok(());
        }
        let attr = self.store.fetch_attr(path)?;
        self.files.insert(path.to_string(), FileCache::new(attr));
        Ok(())
    }

    /// Completes every block in `[block_start, block_end)` that is not
    /// fully valid, with one remote fetch per contiguous run of such
    /// blocks. Returns true iff nothing had to be fetched.
    fn cache_blocks(&mut self, path: &str, block_start: u64, block_end: u64) -> FsResult<bool> {
        let fc = self.files.get(path).expect("file attr not cached");
        if fc.attr.size == 0 {
            return Ok(true);
        }
        let mut missing = RangeList::default();
        for b in block_start..block_end {
            let full = fc.blocks.get(&b).map(|e| e.is_full()).unwrap_or(false);
            if !full {
                missing.insert(b as usize, b as usize + 1);
            }
        }
        if missing.is_empty() {
            return Ok(true);
        }

        let runs: Vec<(u64, u64)> = missing.iter().map(|r| (r.start as u64, r.end as u64)).collect();
        for (run_start, run_end) in runs {
            let want = (run_end - run_start) as usize * self.block_size;
            let offset = run_start * self.block_size as u64;
            let data = self.store.fetch_content(path, offset, want)?;
            debug!(
                "fetched {} bytes at {} for {} ({} blocks)",
                data.len(),
                offset,
                path,
                run_end - run_start
            );

            for (i, b) in (run_start..run_end).enumerate() {
                let lo = i * self.block_size;
                let hi = min(lo + self.block_size, data.len());
                // short remote read means EOF inside this run; the rest of
                // the block stays zero
                let mut block_data = vec![0u8; self.block_size];
                if lo < data.len() {
                    block_data[..hi - lo].copy_from_slice(&data[lo..hi]);
                }
                self.entry_or_create(path, b).fetch(block_data);
                self.counters.fetched_blocks += 1;
            }
        }
        Ok(false)
    }

    fn read_block(&mut self, path: &str, block_num: u64, offset: usize, buf: &mut [u8]) {
        debug_assert!(offset + buf.len() <= self.block_size);
        let fc = self.files.get(path).expect("file attr not cached");
        let entry = fc.blocks.get(&block_num).expect("block not cached after fetch");
        buf.copy_from_slice(&entry.data()[offset..offset + buf.len()]);
        self.recency.move_to_head(entry.token());
    }

    fn write_block(&mut self, path: &str, block_num: u64, offset: usize, buf: &[u8]) {
        debug_assert!(offset + buf.len() <= self.block_size);
        self.entry_or_create(path, block_num).write(offset, buf);
    }

    fn entry_or_create(&mut self, path: &str, block_num: u64) -> &mut BlockEntry {
        let fc = self.files.get_mut(path).expect("file attr not cached");
        match fc.blocks.entry(block_num) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => {
                let token = self.recency.push_tail(BlockKey::new(path, block_num));
                v.insert(BlockEntry::new(self.block_size, token))
            }
        }
    }

    fn delete_entry(&mut self, path: &str, block_num: u64) {
        let fc = self.files.get_mut(path).expect("file attr not cached");
        let entry = fc.blocks.remove(&block_num).expect("block map out of sync");
        self.recency.remove(entry.token());
    }

    fn delete_entries_beyond(&mut self, path: &str, block_bound: u64) {
        let fc = self.files.get_mut(path).expect("file attr not cached");
        let doomed: Vec<u64> = fc.blocks.keys().filter(|b| **b >= block_bound).copied().collect();
        for b in doomed {
            let entry = fc.blocks.remove(&b).expect("block map out of sync");
            self.recency.remove(entry.token());
        }
    }

    fn flush_blocks(&mut self, path: &str, sorted_dirty: &[u64]) -> FsResult<()> {
        let mut pending: Option<PendingRun> = None;
        for &b in sorted_dirty {
            let (ranges, data) = {
                let fc = self.files.get(path).expect("file attr not cached");
                let entry = fc.blocks.get(&b).expect("dirty block missing");
                (entry.valid_ranges().clone(), entry.data().to_vec())
            };
            for r in &ranges {
                let abs_start = b * self.block_size as u64 + r.start as u64;
                let adjacent = pending
                    .as_ref()
                    .map(|p| p.start + p.buf.len() as u64 == abs_start)
                    .unwrap_or(false);
                if !adjacent {
                    if let Some(run) = pending.take() {
                        self.write_back_run(path, run)?;
                    }
                    pending = Some(PendingRun {
                        start: abs_start,
                        buf: Vec::new(),
                        blocks: Vec::new(),
                    });
                }
                let run = pending.as_mut().unwrap();
                run.buf.extend_from_slice(&data[r.start..r.end]);
            }
            // the block is clean only once the run holding its last range
            // lands on the remote
            if let Some(run) = pending.as_mut() {
                run.blocks.push(b);
            }
        }
        if let Some(run) = pending.take() {
            self.write_back_run(path, run)?;
        }
        Ok(())
    }

    fn write_back_run(&mut self, path: &str, run: PendingRun) -> FsResult<()> {
        debug!(
            "write back {} bytes at {} for {} ({} blocks turn clean)",
            run.buf.len(),
            run.start,
            path,
            run.blocks.len()
        );
        let reply = match self.store.write_back_content(path, run.start, &run.buf) {
            Ok(r) => r,
            Err(e) => {
                self.files.get_mut(path).unwrap().stale = true;
                return Err(e);
            }
        };
        let fc = self.files.get_mut(path).expect("file attr not cached");
        if reply.before != fc.attr.time {
            warn!("remote changed under {} during content write-back", path);
            fc.stale = true;
        }
        fc.attr.time = reply.after;
        for b in &run.blocks {
            if let Some(entry) = fc.blocks.get_mut(b) {
                entry.clean();
                self.counters.flushed_blocks += 1;
            }
        }
        self.counters.flushed_bytes += run.buf.len() as u64;
        Ok(())
    }
}
