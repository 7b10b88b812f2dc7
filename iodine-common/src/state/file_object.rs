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

/// One entry of the exported file manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileObject {
    // "/"-prefixed, relative to the files directory.
    pub path: String,
    // Lowercase hex SHA-1 of the content.
    pub hash: String,
    pub size: u64,
    // Modification time, epoch millis.
    pub mtime: u64,
}

impl FileObject {
    pub const HASH_LEN: usize = 40;

    pub fn new(path: impl Into<String>, hash: impl Into<String>, size: u64, mtime: u64) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            size,
            mtime,
        }
    }

    pub fn is_valid_hash(hash: &str) -> bool {
        hash.len() == Self::HASH_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
    }
}
