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

use std::fmt;

/// Half-open byte interval `[start, end)` within one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    // Touching intervals count as overlapping so that insert coalesces them.
    fn overlaps(&self, other: &Range) -> bool {
        if self.start <= other.start {
            self.end >= other.start
        } else {
            other.end >= self.start
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Sorted set of non-overlapping, non-adjacent ranges. Ranges only grow;
/// there is no deletion, an entry is dropped as a whole instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeList {
    ranges: Vec<Range>,
}

impl RangeList {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end);
        Self {
            ranges: vec![Range { start, end }],
        }
    }

    /// Merges `[start, end)` into the set. Any existing range that overlaps
    /// or touches the new one is absorbed into a single merged range placed
    /// at the sorted position.
    pub fn insert(&mut self, start: usize, end: usize) {
        debug_assert!(start < end);
        let new_range = Range { start, end };
        let mut absorbed: Option<(usize, usize)> = None;
        let mut new_start = start;
        let mut new_end = end;
        for (i, r) in self.ranges.iter().enumerate() {
            if r.overlaps(&new_range) {
                absorbed = match absorbed {
                    None => Some((i, i + 1)),
                    Some((first, _)) => Some((first, i + 1)),
                };
                new_start = new_start.min(r.start);
                new_end = new_end.max(r.end);
            }
        }
        let merged = Range {
            start: new_start,
            end: new_end,
        };
        match absorbed {
            Some((first, last)) => {
                self.ranges.splice(first..last, std::iter::once(merged));
            }
            None => {
                let pos = self
                    .ranges
                    .iter()
                    .position(|r| r.start >= new_start)
                    .unwrap_or(self.ranges.len());
                self.ranges.insert(pos, merged);
            }
        }
    }

    /// True iff the set is exactly the single interval `[0, len)`.
    pub fn is_full(&self, len: usize) -> bool {
        self.ranges.len() == 1 && self.ranges[0].start == 0 && self.ranges[0].end == len
    }

    pub fn count(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Range> {
        self.ranges.iter()
    }
}

impl<'a> IntoIterator for &'a RangeList {
    type Item = &'a Range;
    type IntoIter = std::slice::Iter<'a, Range>;

    fn into_iter(self) -> Self::IntoIter {
        self.ranges.iter()
    }
}

/// Copies the bytes of every range in `ranges` from `upper` into `lower` at
/// identical offsets. Used on fetch so that locally written bytes survive
/// the arrival of remote content.
pub fn overlay(upper: &[u8], ranges: &RangeList, lower: &mut [u8]) {
    debug_assert_eq!(upper.len(), lower.len());
    for r in ranges {
        lower[r.start..r.end].copy_from_slice(&upper[r.start..r.end]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn starts(list: &RangeList) -> Vec<usize> {
        list.iter().map(|r| r.start).collect()
    }

    #[test]
    fn inserts_disjoint_sorted() {
        let mut ranges = RangeList::new(10, 20);
        ranges.insert(5, 8);
        ranges.insert(100, 200);
        ranges.insert(21, 50);
        assert_eq!(ranges.count(), 4);
        assert_eq!(starts(&ranges), vec![5, 10, 21, 100]);
    }

    #[test]
    fn touching_ranges_coalesce() {
        let mut ranges = RangeList::new(10, 20);
        ranges.insert(5, 8);
        ranges.insert(100, 200);
        ranges.insert(30, 50);
        ranges.insert(20, 30);
        assert_eq!(ranges.count(), 3);
        let all: Vec<Range> = ranges.iter().copied().collect();
        assert_eq!(all[0].start, 5);
        assert_eq!(all[1], Range { start: 10, end: 50 });
        assert_eq!(all[2].start, 100);
    }

    #[test]
    fn spanning_insert_absorbs_many() {
        let mut ranges = RangeList::new(10, 20);
        ranges.insert(5, 8);
        ranges.insert(100, 200);
        ranges.insert(30, 50);
        ranges.insert(20, 30);
        ranges.insert(20, 120);
        assert_eq!(ranges.count(), 2);
        let all: Vec<Range> = ranges.iter().copied().collect();
        assert_eq!(all[0].start, 5);
        assert_eq!(all[1], Range { start: 10, end: 200 });
    }

    #[test]
    fn superset_insert_absorbs_all() {
        let mut ranges = RangeList::new(10, 20);
        ranges.insert(5, 8);
        ranges.insert(100, 200);
        ranges.insert(30, 50);
        ranges.insert(1, 1000);
        assert_eq!(ranges.count(), 1);
        let all: Vec<Range> = ranges.iter().copied().collect();
        assert_eq!(all[0], Range { start: 1, end: 1000 });
    }

    #[test]
    fn tail_extension_merges() {
        let mut ranges = RangeList::new(10, 20);
        ranges.insert(5, 8);
        ranges.insert(100, 200);
        ranges.insert(30, 50);
        ranges.insert(200, 205);
        assert_eq!(ranges.count(), 4);
        let all: Vec<Range> = ranges.iter().copied().collect();
        assert_eq!(starts(&ranges), vec![5, 10, 30, 100]);
        assert_eq!(all[3].end, 205);
    }

    #[test]
    fn full_detection() {
        let mut ranges = RangeList::new(0, 4);
        assert!(!ranges.is_full(16));
        ranges.insert(4, 16);
        assert!(ranges.is_full(16));
    }

    #[test]
    fn overlay_copies_only_ranges() {
        let upper = [9u8, 9, 9, 9, 0];
        let mut lower = [1u8, 2, 3, 4, 5];
        let mut ranges = RangeList::new(1, 3);
        overlay(&upper, &ranges, &mut lower);
        assert_eq!(lower, [1, 9, 9, 4, 5]);

        ranges.insert(4, 5);
        let mut lower = [1u8, 2, 3, 4, 5];
        overlay(&upper, &ranges, &mut lower);
        assert_eq!(lower, [1, 9, 9, 4, 0]);
    }
}
