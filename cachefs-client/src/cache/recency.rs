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

/// Identifies one cached block across all files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockKey {
    pub path: String,
    pub block_num: u64,
}

impl BlockKey {
    pub fn new(path: impl Into<String>, block_num: u64) -> Self {
        Self {
            path: path.into(),
            block_num,
        }
    }
}

/// Stable handle to a node in the recency list. A token is valid exactly as
/// long as the block entry holding it is alive; the cache keeps the list
/// and the block maps in 1:1 correspondence on every insert and delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecencyToken(usize);

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node {
    key: Option<BlockKey>,
    prev: usize,
    next: usize,
}

/// Doubly-linked LRU list over a vector arena with a free list. Head is the
/// most recently used block, tail the eviction victim. All link operations
/// are O(1) given a token.
#[derive(Debug, Default)]
pub struct RecencyList {
    nodes: Vec<Node>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
}

impl RecencyList {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a new node at the tail (cold end). New blocks earn their way
    /// to the head through reads.
    pub fn push_tail(&mut self, key: BlockKey) -> RecencyToken {
        let idx = self.alloc(key);
        self.nodes[idx].prev = self.tail;
        self.nodes[idx].next = NIL;
        if self.tail != NIL {
            self.nodes[self.tail].next = idx;
        } else {
            self.head = idx;
        }
        self.tail = idx;
        self.len += 1;
        RecencyToken(idx)
    }

    pub fn move_to_head(&mut self, token: RecencyToken) {
        let idx = token.0;
        debug_assert!(self.nodes[idx].key.is_some());
        if self.head == idx {
            return;
        }
        self.unlink(idx);
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;
        if self.head != NIL {
            self.nodes[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    pub fn remove(&mut self, token: RecencyToken) -> BlockKey {
        let idx = token.0;
        self.unlink(idx);
        self.len -= 1;
        self.free.push(idx);
        self.nodes[idx].key.take().expect("removing a dead node")
    }

    /// The least recently used block, if any.
    pub fn tail(&self) -> Option<&BlockKey> {
        if self.tail == NIL {
            None
        } else {
            self.nodes[self.tail].key.as_ref()
        }
    }

    pub fn key(&self, token: RecencyToken) -> Option<&BlockKey> {
        self.nodes.get(token.0).and_then(|n| n.key.as_ref())
    }

    /// Walks the list from the tail (least recently used first).
    pub fn iter_lru(&self) -> LruIter<'_> {
        LruIter {
            list: self,
            cursor: self.tail,
        }
    }

    fn alloc(&mut self, key: BlockKey) -> usize {
        match self.free.pop() {
            Some(idx) => {
                debug_assert!(self.nodes[idx].key.is_none());
                self.nodes[idx].key = Some(key);
                idx
            }
            None => {
                self.nodes.push(Node {
                    key: Some(key),
                    prev: NIL,
                    next: NIL,
                });
                self.nodes.len() - 1
            }
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NIL {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }
}

pub struct LruIter<'a> {
    list: &'a RecencyList,
    cursor: usize,
}

impl<'a> Iterator for LruIter<'a> {
    type Item = &'a BlockKey;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == NIL {
            return None;
        }
        let node = &self.list.nodes[self.cursor];
        self.cursor = node.prev;
        node.key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lru_order(list: &RecencyList) -> Vec<u64> {
        list.iter_lru().map(|k| k.block_num).collect()
    }

    #[test]
    fn push_tail_keeps_insertion_order() {
        let mut list = RecencyList::new();
        list.push_tail(BlockKey::new("f", 1));
        list.push_tail(BlockKey::new("f", 2));
        list.push_tail(BlockKey::new("f", 3));
        assert_eq!(list.len(), 3);
        assert_eq!(lru_order(&list), vec![3, 2, 1]);
        assert_eq!(list.tail().unwrap().block_num, 3);
    }

    #[test]
    fn move_to_head_changes_victim() {
        let mut list = RecencyList::new();
        let a = list.push_tail(BlockKey::new("f", 1));
        let b = list.push_tail(BlockKey::new("f", 2));
        list.move_to_head(a);
        list.move_to_head(b);
        list.move_to_head(a);
        assert_eq!(lru_order(&list), vec![2, 1]);
        assert_eq!(list.tail().unwrap().block_num, 2);
    }

    #[test]
    fn remove_relinks_neighbors() {
        let mut list = RecencyList::new();
        let a = list.push_tail(BlockKey::new("f", 1));
        let b = list.push_tail(BlockKey::new("f", 2));
        let c = list.push_tail(BlockKey::new("f", 3));
        assert_eq!(list.remove(b).block_num, 2);
        assert_eq!(list.len(), 2);
        assert_eq!(lru_order(&list), vec![3, 1]);

        assert_eq!(list.remove(c).block_num, 3);
        assert_eq!(list.remove(a).block_num, 1);
        assert!(list.is_empty());
        assert!(list.tail().is_none());
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut list = RecencyList::new();
        let a = list.push_tail(BlockKey::new("f", 1));
        list.remove(a);
        let b = list.push_tail(BlockKey::new("g", 2));
        assert_eq!(list.nodes.len(), 1);
        assert_eq!(list.key(b).unwrap().path, "g");
    }

    #[test]
    fn single_node_move_to_head_is_noop() {
        let mut list = RecencyList::new();
        let a = list.push_tail(BlockKey::new("f", 1));
        list.move_to_head(a);
        assert_eq!(lru_order(&list), vec![1]);
    }
}
