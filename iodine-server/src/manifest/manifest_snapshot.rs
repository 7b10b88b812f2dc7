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
use iodine_common::error::IodineError;
use iodine_common::state::FileObject;
use iodine_common::utils::FastHashMap;
use iodine_common::IodineResult;

/// An immutable file listing with lookups by path and by content hash.
#[derive(Debug)]
pub struct ManifestSnapshot {
    files: Vec<FileObject>,
    by_path: FastHashMap<String, usize>,
    by_hash: FastHashMap<String, usize>,
    encoded: Bytes,
    built_at: u64,
}

impl ManifestSnapshot {
    pub fn new(mut files: Vec<FileObject>, built_at: u64) -> IodineResult<Self> {
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut by_path = FastHashMap::default();
        let mut by_hash = FastHashMap::default();
        for (i, f) in files.iter().enumerate() {
            by_path.insert(f.path.clone(), i);
            // Identical content under several paths resolves to the first path.
            by_hash.entry(f.hash.clone()).or_insert(i);
        }

        let encoded = Self::encode(&files)?;

        Ok(Self {
            files,
            by_path,
            by_hash,
            encoded: Bytes::from(encoded),
            built_at,
        })
    }

    /// A listing of no files. Its encoding is still a valid, empty listing.
    pub fn empty(built_at: u64) -> Self {
        Self {
            files: Vec::new(),
            by_path: FastHashMap::default(),
            by_hash: FastHashMap::default(),
            encoded: Bytes::from(Self::encode(&[]).unwrap_or_default()),
            built_at,
        }
    }

    fn encode(files: &[FileObject]) -> IodineResult<Vec<u8>> {
        bincode::serialize(files).map_err(|e| IodineError::encode(e.to_string()))
    }

    pub fn files(&self) -> &[FileObject] {
        &self.files
    }

    pub fn by_path(&self, path: &str) -> Option<&FileObject> {
        self.by_path.get(path).map(|i| &self.files[*i])
    }

    pub fn by_hash(&self, hash: &str) -> Option<&FileObject> {
        self.by_hash.get(hash).map(|i| &self.files[*i])
    }

    /// The serialized listing served to nodes.
    pub fn encoded(&self) -> Bytes {
        self.encoded.clone()
    }

    pub fn decode(bytes: &[u8]) -> IodineResult<Vec<FileObject>> {
        bincode::deserialize(bytes).map_err(|e| IodineError::encode(e.to_string()))
    }

    pub fn built_at(&self) -> u64 {
        self.built_at
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Default for ManifestSnapshot {
    fn default() -> Self {
        Self::empty(0)
    }
}
