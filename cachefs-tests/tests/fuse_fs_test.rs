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

use cachefs_common::conf::CacheConf;
use cachefs_fuse::fs::CacheFileSystem;
use cachefs_tests::{CountingStore, TempStore};

fn new_fs(case: &str, conf: CacheConf) -> CacheFileSystem<CountingStore<TempStore>> {
    CacheFileSystem::new(conf, CountingStore::new(TempStore::new(case))).unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_add(40)).collect()
}

#[test]
fn rejects_invalid_conf() {
    let conf = CacheConf {
        block_size: 0,
        ..Default::default()
    };
    let err = match CacheFileSystem::new(conf, TempStore::new("bad-conf")) {
        Ok(_) => panic!("zero block size accepted"),
        Err(e) => e,
    };
    assert_eq!(err.errno(), libc::EINVAL);
}

#[test]
fn periodic_flush_after_interval() {
    let conf = CacheConf {
        block_size: 8,
        max_cache_blocks: 100,
        evict_count: 2,
        flush_interval: 3,
    };
    let mut fs = new_fs("interval", conf);
    fs.cache_mut().store_mut().inner.create_file("f", b"");
    let data = pattern(24);

    fs.write("f", 0, &data[..8]).unwrap();
    fs.write("f", 8, &data[8..16]).unwrap();
    assert_eq!(fs.cache().dirty_blocks(), 2);

    // the third write crosses the interval and flushes everything
    fs.write("f", 16, &data[16..]).unwrap();
    assert_eq!(fs.write_ops(), 3);
    assert_eq!(fs.cache().dirty_blocks(), 0);
    assert_eq!(fs.cache_mut().store_mut().inner.read_all("f"), data);
}

#[test]
fn evicts_once_over_block_budget() {
    let conf = CacheConf {
        block_size: 8,
        max_cache_blocks: 4,
        evict_count: 2,
        flush_interval: 1000,
    };
    let mut fs = new_fs("budget", conf);
    fs.cache_mut().store_mut().inner.create_file("f", b"");
    let data = pattern(40);

    for i in 0..5u64 {
        fs.write("f", i * 8, &data[i as usize * 8..][..8]).unwrap();
    }

    // the fifth block pushed the cache to 5 > 4, so two were evicted,
    // flushed to the remote first
    assert_eq!(fs.cache().cached_blocks(), 3);
    assert_eq!(fs.cache().dirty_blocks(), 0);
    assert_eq!(fs.cache_mut().store_mut().inner.read_all("f"), data);

    let mut buf = vec![0u8; 40];
    assert_eq!(fs.read("f", 0, &mut buf).unwrap(), 40);
    assert_eq!(buf, data);
}

#[test]
fn access_probe_discards_remotely_changed_file() {
    let conf = CacheConf::default();
    let mut fs = new_fs("probe", conf);
    fs.cache_mut().store_mut().inner.create_file("f", b"old data");

    assert_eq!(fs.getattr("f").unwrap().size, 8);

    fs.cache_mut()
        .store_mut()
        .inner
        .modify_externally("f", b"data from elsewhere");

    fs.access("f").unwrap();
    assert_eq!(fs.getattr("f").unwrap().size, 19);

    let mut buf = vec![0u8; 19];
    assert_eq!(fs.read("f", 0, &mut buf).unwrap(), 19);
    assert_eq!(buf, b"data from elsewhere");
}

#[test]
fn fsync_writes_everything_back() {
    let conf = CacheConf {
        block_size: 8,
        ..Default::default()
    };
    let mut fs = new_fs("fsync", conf);
    fs.cache_mut().store_mut().inner.create_file("f", b"");
    let data = pattern(20);

    fs.write("f", 0, &data).unwrap();
    fs.fsync("f").unwrap();
    assert_eq!(fs.cache().dirty_blocks(), 0);
    assert_eq!(fs.cache_mut().store_mut().inner.read_all("f"), data);
}

#[test]
fn truncate_then_flush_shrinks_remote() {
    let conf = CacheConf {
        block_size: 8,
        ..Default::default()
    };
    let mut fs = new_fs("shrink", conf);
    fs.cache_mut()
        .store_mut()
        .inner
        .create_file("f", b"0123456789abcdef");

    fs.truncate("f", 5).unwrap();
    assert_eq!(fs.getattr("f").unwrap().size, 5);
    // the remote still holds the old length until the flush
    assert_eq!(fs.cache_mut().store_mut().inner.read_all("f").len(), 16);

    fs.flush("f").unwrap();
    assert_eq!(fs.cache_mut().store_mut().inner.read_all("f"), b"01234");
}

#[test]
fn periodic_flush_writes_deferred_truncate() {
    let conf = CacheConf {
        block_size: 8,
        max_cache_blocks: 100,
        evict_count: 2,
        flush_interval: 1,
    };
    let mut fs = new_fs("interval-truncate", conf);
    fs.cache_mut()
        .store_mut()
        .inner
        .create_file("f", b"0123456789abcdef");
    fs.cache_mut().store_mut().inner.create_file("g", b"");

    fs.truncate("f", 5).unwrap();
    // the next periodic flush, triggered by writing another file, must
    // also write back the blockless truncate of f
    fs.write("g", 0, b"x").unwrap();
    assert_eq!(fs.cache_mut().store_mut().inner.read_all("f"), b"01234");
}

#[test]
fn missing_file_maps_to_enoent() {
    let mut fs = new_fs("enoent", CacheConf::default());
    let err = fs.getattr("missing").unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);

    let err = fs.open("missing").unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);
}
