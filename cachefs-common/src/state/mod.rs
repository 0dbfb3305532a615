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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Second/nanosecond timestamp, the resolution the remote reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpec {
    pub sec: i64,
    pub nsec: i64,
}

impl TimeSpec {
    pub fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }
}

impl From<SystemTime> for TimeSpec {
    fn from(value: SystemTime) -> Self {
        match value.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, d.subsec_nanos() as i64),
            Err(e) => {
                let d = e.duration();
                Self::new(-(d.as_secs() as i64), d.subsec_nanos() as i64)
            }
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nsec)
    }
}

/// File timestamps as last observed on the remote. Equality ignores atime:
/// the remote updates atime on our own reads, which is not a modification.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FileTime {
    pub atime: TimeSpec,
    pub ctime: TimeSpec,
    pub mtime: TimeSpec,
}

impl PartialEq for FileTime {
    fn eq(&self, other: &Self) -> bool {
        self.mtime == other.mtime && self.ctime == other.ctime
    }
}

impl Eq for FileTime {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttr {
    pub size: u64,
    pub mode: u32,
    pub time: FileTime,
}

impl FileAttr {
    pub fn with_size(size: u64) -> Self {
        Self {
            size,
            mode: 0o644,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_time_equality_ignores_atime() {
        let t1 = FileTime {
            atime: TimeSpec::new(1, 0),
            ctime: TimeSpec::new(2, 0),
            mtime: TimeSpec::new(3, 0),
        };
        let t2 = FileTime {
            atime: TimeSpec::new(100, 0),
            ..t1
        };
        assert_eq!(t1, t2);

        let t3 = FileTime {
            mtime: TimeSpec::new(3, 1),
            ..t1
        };
        assert_ne!(t1, t3);
    }
}
