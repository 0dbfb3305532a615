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

use bytes::Bytes;
use cachefs_common::state::{FileAttr, FileTime};
use cachefs_common::FsResult;

/// Remote timestamps observed around a write-back. `before` is the file's
/// time just before the mutation was applied; a `before` that differs from
/// the cache's last observed time means another client changed the file in
/// between, which the cache records as staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteBackReply {
    pub before: FileTime,
    pub after: FileTime,
}

/// The four remote operations the cache consumes. One implementation per
/// transport; the cache calls each as a single blocking round-trip and
/// never retries. Any error aborts the cache operation in progress.
pub trait RemoteStore {
    /// Reads up to `len` bytes at `offset`. A short result means EOF was
    /// reached; it is not an error.
    fn fetch_content(&mut self, path: &str, offset: u64, len: usize) -> FsResult<Bytes>;

    fn fetch_attr(&mut self, path: &str) -> FsResult<FileAttr>;

    fn write_back_content(&mut self, path: &str, offset: u64, data: &[u8])
        -> FsResult<WriteBackReply>;

    /// Applies cached attributes remotely (size changes become a truncate).
    fn write_back_attr(&mut self, path: &str, attr: &FileAttr) -> FsResult<WriteBackReply>;
}
