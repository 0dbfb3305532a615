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

use std::io;
use thiserror::Error;

/// Errors surfaced by the remote store and propagated unchanged through the
/// cache. The cache never retries and never converts one kind into another.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("io error: {0}")]
    IO(String),

    #[error("{0}")]
    Common(String),
}

impl FsError {
    pub fn io(msg: impl Into<String>) -> Self {
        FsError::IO(msg.into())
    }

    pub fn common(msg: impl Into<String>) -> Self {
        FsError::Common(msg.into())
    }

    /// The closest POSIX errno for this error.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::FileNotFound(_) => libc::ENOENT,
            FsError::PermissionDenied(_) => libc::EACCES,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::Unsupported(_) => libc::EOPNOTSUPP,
            FsError::IO(_) => libc::EIO,
            FsError::Common(_) => libc::EIO,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::NotFound => FsError::FileNotFound(value.to_string()),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(value.to_string()),
            io::ErrorKind::InvalidInput => FsError::InvalidArgument(value.to_string()),
            _ => FsError::IO(value.to_string()),
        }
    }
}

impl From<String> for FsError {
    fn from(value: String) -> Self {
        FsError::Common(value)
    }
}

impl From<&str> for FsError {
    fn from(value: &str) -> Self {
        FsError::Common(value.to_string())
    }
}
