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

//! Test doubles for the remote side of the cache: a temp-file-backed
//! `RemoteStore` and a call-counting wrapper for RPC-count assertions.

use bytes::Bytes;
use cachefs_client::{RemoteStore, WriteBackReply};
use cachefs_common::state::{FileAttr, FileTime, TimeSpec};
use cachefs_common::FsResult;
use std::fs::{self, File, Metadata, OpenOptions};
use std::os::unix::fs::{FileExt, MetadataExt};
use std::path::PathBuf;

/// A `RemoteStore` backed by plain files under a private temp directory.
/// Plays the role of the storage server; tests inspect and mutate the
/// directory directly to simulate the remote side.
pub struct TempStore {
    root: PathBuf,
}

impl TempStore {
    pub fn new(case: &str) -> Self {
        let root = std::env::temp_dir().join(format!("cachefs-{}-{:x}", case, rand::random::<u64>()));
        fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    pub fn create_file(&self, name: &str, content: &[u8]) {
        fs::write(self.full_path(name), content).unwrap();
    }

    /// Raw remote content, bypassing the store interface.
    pub fn read_all(&self, name: &str) -> Vec<u8> {
        fs::read(self.full_path(name)).unwrap()
    }

    /// Simulates another client writing to the file.
    pub fn modify_externally(&self, name: &str, content: &[u8]) {
        // coarse filesystem clocks could otherwise leave mtime unchanged
        std::thread::sleep(std::time::Duration::from_millis(20));
        fs::write(self.full_path(name), content).unwrap();
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }

    fn file_time(&self, name: &str) -> FsResult<FileTime> {
        let md = fs::metadata(self.full_path(name))?;
        Ok(md_time(&md))
    }
}

impl Drop for TempStore {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn md_time(md: &Metadata) -> FileTime {
    FileTime {
        atime: TimeSpec::new(md.atime(), md.atime_nsec()),
        ctime: TimeSpec::new(md.ctime(), md.ctime_nsec()),
        mtime: TimeSpec::new(md.mtime(), md.mtime_nsec()),
    }
}

impl RemoteStore for TempStore {
    fn fetch_content(&mut self, path: &str, offset: u64, len: usize) -> FsResult<Bytes> {
        let file = File::open(self.full_path(path))?;
        let mut buf = vec![0u8; len];
        let mut total = 0;
        while total < len {
            let n = file.read_at(&mut buf[total..], offset + total as u64)?;
            if n == 0 {
                break;
            }
            total += n;
        }
        buf.truncate(total);
        Ok(Bytes::from(buf))
    }

    fn fetch_attr(&mut self, path: &str) -> FsResult<FileAttr> {
        let md = fs::metadata(self.full_path(path))?;
        Ok(FileAttr {
            size: md.len(),
            mode: md.mode(),
            time: md_time(&md),
        })
    }

    fn write_back_content(
        &mut self,
        path: &str,
        offset: u64,
        data: &[u8],
    ) -> FsResult<WriteBackReply> {
        let before = self.file_time(path)?;
        let file = OpenOptions::new().write(true).open(self.full_path(path))?;
        file.write_all_at(data, offset)?;
        let after = self.file_time(path)?;
        Ok(WriteBackReply { before, after })
    }

    fn write_back_attr(&mut self, path: &str, attr: &FileAttr) -> FsResult<WriteBackReply> {
        let before = self.file_time(path)?;
        let file = OpenOptions::new().write(true).open(self.full_path(path))?;
        file.set_len(attr.size)?;
        let after = self.file_time(path)?;
        Ok(WriteBackReply { before, after })
    }
}

/// Counts every remote call made through it. Wrap a `TempStore` to assert
/// how many RPCs an operation produced (coalescing, hit/miss behavior).
pub struct CountingStore<S> {
    pub inner: S,
    pub fetch_content_calls: u64,
    pub fetch_attr_calls: u64,
    pub write_back_content_calls: u64,
    pub write_back_attr_calls: u64,
}

impl<S> CountingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fetch_content_calls: 0,
            fetch_attr_calls: 0,
            write_back_content_calls: 0,
            write_back_attr_calls: 0,
        }
    }
}

impl<S: RemoteStore> RemoteStore for CountingStore<S> {
    fn fetch_content(&mut self, path: &str, offset: u64, len: usize) -> FsResult<Bytes> {
        self.fetch_content_calls += 1;
        self.inner.fetch_content(path, offset, len)
    }

    fn fetch_attr(&mut self, path: &str) -> FsResult<FileAttr> {
        self.fetch_attr_calls += 1;
        self.inner.fetch_attr(path)
    }

    fn write_back_content(
        &mut self,
        path: &str,
        offset: u64,
        data: &[u8],
    ) -> FsResult<WriteBackReply> {
        self.write_back_content_calls += 1;
        self.inner.write_back_content(path, offset, data)
    }

    fn write_back_attr(&mut self, path: &str, attr: &FileAttr) -> FsResult<WriteBackReply> {
        self.write_back_attr_calls += 1;
        self.inner.write_back_attr(path, attr)
    }
}
