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

use crate::manifest::ManifestSnapshot;
use iodine_common::state::FileObject;
use iodine_common::IodineResult;
use log::{debug, warn};
use sha1::{Digest, Sha1};
use std::fs::{self, File, Metadata};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Walks the files directory and hashes what changed since the previous snapshot.
pub struct ManifestBuilder {
    root: PathBuf,
}

impl ManifestBuilder {
    const BUF_SIZE: usize = 64 * 1024;

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Files whose size and mtime match the previous snapshot keep their hash.
    pub fn scan(&self, previous: &ManifestSnapshot, now: u64) -> IodineResult<ManifestSnapshot> {
        let mut files = Vec::new();
        let mut hashed = 0;
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let meta = match fs::metadata(&path) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("Skip {}: {}", path.display(), e);
                        continue;
                    }
                };

                if meta.is_dir() {
                    stack.push(path);
                    continue;
                } else if !meta.is_file() {
                    continue;
                }

                let rel = match self.relative_path(&path) {
                    Some(v) => v,
                    None => {
                        warn!("Skip {}: not a utf-8 path", path.display());
                        continue;
                    }
                };
                let size = meta.len();
                let mtime = Self::mtime_ms(&meta);

                let hash = match previous.by_path(&rel) {
                    Some(f) if f.size == size && f.mtime == mtime => f.hash.clone(),
                    _ => {
                        hashed += 1;
                        Self::hash_file(&path)?
                    }
                };
                files.push(FileObject::new(rel, hash, size, mtime));
            }
        }

        debug!(
            "Scanned {}: {} files, {} hashed",
            self.root.display(),
            files.len(),
            hashed
        );
        ManifestSnapshot::new(files, now)
    }

    /// Modification time in millis, 0 where the platform has none.
    pub fn mtime_ms(meta: &Metadata) -> u64 {
        meta.modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Lowercase hex SHA-1 of the file content.
    pub fn hash_file(path: impl AsRef<Path>) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut sha1 = Sha1::new();
        let mut buf = vec![0u8; Self::BUF_SIZE];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            sha1.update(&buf[..n]);
        }
        Ok(hex::encode(sha1.finalize()))
    }

    // "/a/b.bin" for <root>/a/b.bin
    fn relative_path(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut out = String::new();
        for c in rel.components() {
            out.push('/');
            out.push_str(c.as_os_str().to_str()?);
        }
        Some(out)
    }
}
