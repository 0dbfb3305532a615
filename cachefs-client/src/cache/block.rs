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

use crate::cache::{overlay, RangeList, RecencyToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Clean,
    Dirty,
}

/// One cached block: a buffer of exactly `block_size` bytes, the set of
/// byte ranges within it that hold real content, a dirty flag, and the
/// block's node in the cache-wide recency list. Bytes outside the valid
/// ranges are zero filler and must never reach a caller.
#[derive(Debug)]
pub struct BlockEntry {
    state: BlockState,
    data: Vec<u8>,
    valid: RangeList,
    token: RecencyToken,
}

impl BlockEntry {
    pub fn new(block_size: usize, token: RecencyToken) -> Self {
        Self {
            state: BlockState::Clean,
            data: vec![0; block_size],
            valid: RangeList::default(),
            token,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.state == BlockState::Dirty
    }

    pub fn clean(&mut self) {
        self.state = BlockState::Clean;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn valid_ranges(&self) -> &RangeList {
        &self.valid
    }

    pub fn is_full(&self) -> bool {
        self.valid.is_full(self.data.len())
    }

    pub fn token(&self) -> RecencyToken {
        self.token
    }

    /// Copies `buf` into the block at `offset`, marks the written range
    /// valid and the block dirty. Purely in-memory, cannot fail.
    pub fn write(&mut self, offset: usize, buf: &[u8]) {
        assert!(offset + buf.len() <= self.data.len());
        if buf.is_empty() {
            return;
        }
        self.data[offset..offset + buf.len()].copy_from_slice(buf);
        self.valid.insert(offset, offset + buf.len());
        self.state = BlockState::Dirty;
    }

    /// Replaces the buffer with freshly fetched remote content and marks
    /// the whole block valid. Ranges already valid locally overwrite the
    /// fetched bytes, so dirty writes that have not been flushed are never
    /// clobbered by the fetch. The dirty flag is left untouched.
    pub fn fetch(&mut self, mut new_data: Vec<u8>) {
        assert_eq!(new_data.len(), self.data.len());
        overlay(&self.data, &self.valid, &mut new_data);
        self.data = new_data;
        self.valid.insert(0, self.data.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(block_size: usize) -> BlockEntry {
        BlockEntry::new(block_size, RecencyToken::default())
    }

    #[test]
    fn write_marks_range_valid_and_dirty() {
        let mut block = entry(16);
        assert!(!block.is_dirty());
        block.write(2, &[1, 2, 3]);
        assert!(block.is_dirty());
        assert!(!block.is_full());
        assert_eq!(&block.data()[2..5], &[1, 2, 3]);
        assert_eq!(block.valid_ranges().count(), 1);
    }

    #[test]
    fn adjacent_writes_fill_block() {
        let mut block = entry(8);
        block.write(0, &[1; 4]);
        block.write(4, &[2; 4]);
        assert!(block.is_full());
    }

    #[test]
    fn fetch_preserves_local_writes() {
        let mut block = entry(5);
        block.write(0, &[9, 9, 9, 9]);
        block.write(3, &[1, 2]);
        assert_eq!(block.data(), &[9, 9, 9, 1, 2]);

        block.fetch(vec![7; 5]);
        assert!(block.is_full());
        assert!(block.is_dirty());
        assert_eq!(block.data(), &[9, 9, 9, 1, 2]);
    }

    #[test]
    fn fetch_fills_holes_with_remote_content() {
        let mut block = entry(6);
        block.write(2, &[5, 5]);
        block.fetch(vec![8; 6]);
        assert_eq!(block.data(), &[8, 8, 5, 5, 8, 8]);
        assert!(block.is_full());
    }

    #[test]
    fn fetch_of_full_block_is_idempotent() {
        let mut block = entry(4);
        block.write(0, &[1, 2, 3, 4]);
        block.fetch(vec![0; 4]);
        assert_eq!(block.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn clean_keeps_validity() {
        let mut block = entry(4);
        block.write(0, &[1, 2, 3, 4]);
        block.clean();
        assert!(!block.is_dirty());
        assert!(block.is_full());
    }
}
