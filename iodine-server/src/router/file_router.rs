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

use crate::error::FileError;
use crate::manifest::{ManifestBuilder, ManifestCache};
use crate::pool::{OnlinePool, OnlinePoolEntry};
use crate::sign::UrlSigner;
use dashmap::DashMap;
use iodine_common::state::FileObject;
use log::debug;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Local(PathBuf),
    Redirect { cluster_id: String, url: String },
}

/// Serve locally while no node is online, otherwise send the client to a random node.
pub struct FileRouter {
    files_dir: PathBuf,
    pool: Arc<OnlinePool>,
    manifest: Arc<ManifestCache>,
    signer: UrlSigner,
    // Files hashed on request because the manifest did not describe them, by path.
    unindexed: DashMap<String, FileObject>,
}

impl FileRouter {
    const UNINDEXED_LIMIT: usize = 1024;

    pub fn new(
        files_dir: impl Into<PathBuf>,
        pool: Arc<OnlinePool>,
        manifest: Arc<ManifestCache>,
        signer: UrlSigner,
    ) -> Self {
        Self {
            files_dir: files_dir.into(),
            pool,
            manifest,
            signer,
            unindexed: DashMap::new(),
        }
    }

    /// The manifest form ("/a/b") of a request path. Only plain components are accepted.
    pub fn normalize(requested: &str) -> Option<String> {
        let mut out = String::new();
        for c in Path::new(requested).components() {
            match c {
                Component::Normal(s) => {
                    out.push('/');
                    out.push_str(s.to_str()?);
                }
                Component::RootDir | Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    pub async fn route(&self, requested: &str) -> Result<RouteDecision, FileError> {
        let (rel, local) = self.resolve(requested).await?;

        let entry = match self.pool.sample_random() {
            None => return Ok(RouteDecision::Local(local)),
            Some(v) => v,
        };

        let hash = self.content_hash(&rel, &local).await?;
        let url = Self::redirect_url(&self.signer, &entry, &hash);
        debug!("Redirect {} to {}", rel, entry.cluster_id);
        Ok(RouteDecision::Redirect {
            cluster_id: entry.cluster_id.clone(),
            url,
        })
    }

    pub fn redirect_url(signer: &UrlSigner, entry: &OnlinePoolEntry, hash: &str) -> String {
        format!(
            "{}/download/{}{}",
            entry.base_url(),
            hash,
            signer.sign(hash, &entry.secret)
        )
    }

    /// Local file holding the content with this hash.
    pub async fn direct_download(&self, hash: &str) -> Result<PathBuf, FileError> {
        let hash = hash.to_ascii_lowercase();
        if !FileObject::is_valid_hash(&hash) {
            return Err(FileError::NotFound(hash));
        }

        let indexed = self.manifest.current().by_hash(&hash).map(|f| f.path.clone());
        if let Some(path) = indexed {
            let (_, local) = self.resolve(&path).await?;
            return Ok(local);
        }

        // Redirects may carry hashes of files added since the last manifest build.
        let file = self
            .unindexed
            .iter()
            .find(|e| e.hash == hash)
            .map(|e| e.value().clone());
        let file = match file {
            Some(f) => f,
            None => return Err(FileError::NotFound(hash)),
        };
        if let Ok((_, local)) = self.resolve(&file.path).await {
            if let Ok(meta) = tokio::fs::metadata(&local).await {
                if Self::unchanged(&file, &meta) {
                    return Ok(local);
                }
            }
        }
        self.unindexed.remove(&file.path);
        Err(FileError::NotFound(hash))
    }

    async fn resolve(&self, requested: &str) -> Result<(String, PathBuf), FileError> {
        let rel = match Self::normalize(requested) {
            Some(v) => v,
            None => return Err(FileError::NotFound(requested.to_string())),
        };
        let local = self.files_dir.join(rel.trim_start_matches('/'));

        let meta = match tokio::fs::metadata(&local).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(FileError::NotFound(rel)),
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            return Err(FileError::IsDirectory(rel));
        }
        Ok((rel, local))
    }

    // The recorded hash while size and mtime still match, else hashed now.
    async fn content_hash(&self, rel: &str, local: &Path) -> Result<String, FileError> {
        let meta = tokio::fs::metadata(local).await?;
        let known = self
            .manifest
            .current()
            .by_path(rel)
            .filter(|f| Self::unchanged(f, &meta))
            .map(|f| f.hash.clone());
        if let Some(hash) = known {
            return Ok(hash);
        }
        let known = self
            .unindexed
            .get(rel)
            .filter(|f| Self::unchanged(f, &meta))
            .map(|f| f.hash.clone());
        if let Some(hash) = known {
            return Ok(hash);
        }

        let path = local.to_path_buf();
        let hash = tokio::task::spawn_blocking(move || ManifestBuilder::hash_file(path))
            .await
            .map_err(|e| FileError::Io(e.to_string()))??;
        self.remember(FileObject::new(
            rel,
            hash.clone(),
            meta.len(),
            ManifestBuilder::mtime_ms(&meta),
        ));
        Ok(hash)
    }

    fn unchanged(file: &FileObject, meta: &Metadata) -> bool {
        file.size == meta.len() && file.mtime == ManifestBuilder::mtime_ms(meta)
    }

    fn remember(&self, file: FileObject) {
        if self.unindexed.len() >= Self::UNINDEXED_LIMIT {
            // Drop what a later manifest build has picked up.
            let snapshot = self.manifest.current();
            self.unindexed.retain(|path, f| {
                snapshot.by_path(path).map(|s| s.hash != f.hash).unwrap_or(true)
            });
            if self.unindexed.len() >= Self::UNINDEXED_LIMIT {
                self.unindexed.clear();
            }
        }
        debug!("Hashed unindexed file {} = {}", file.path, file.hash);
        self.unindexed.insert(file.path.clone(), file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iodine_common::utils::{ManualClock, Utils};
    use std::fs;
    use std::time::{Duration, UNIX_EPOCH};

    fn router(root: &Path) -> (FileRouter, Arc<OnlinePool>, Arc<ManifestCache>, UrlSigner) {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let pool = Arc::new(OnlinePool::new());
        let manifest = Arc::new(ManifestCache::new(root, clock.clone()));
        let signer = UrlSigner::new(Duration::from_secs(300), clock);
        let router = FileRouter::new(root, pool.clone(), manifest.clone(), signer.clone());
        (router, pool, manifest, signer)
    }

    fn entry(id: &str) -> OnlinePoolEntry {
        OnlinePoolEntry {
            cluster_id: id.to_string(),
            host: "10.0.0.9".to_string(),
            port: 4000,
            secret: "node-secret".to_string(),
            connection_id: 1,
            bandwidth_mbps: 100.0,
            enabled_at: 0,
        }
    }

    #[test]
    fn normalize() {
        assert_eq!(FileRouter::normalize("a/b.txt").as_deref(), Some("/a/b.txt"));
        assert_eq!(FileRouter::normalize("/a/./b.txt").as_deref(), Some("/a/b.txt"));
        assert_eq!(FileRouter::normalize("../etc/passwd"), None);
        assert_eq!(FileRouter::normalize("a/../../x"), None);
        assert_eq!(FileRouter::normalize(""), None);
        assert_eq!(FileRouter::normalize("/"), None);
    }

    #[tokio::test]
    async fn local_when_pool_is_empty() {
        let root = Utils::test_sub_dir("router-local");
        fs::write(root.join("a.txt"), b"hello").unwrap();
        let (router, _, _, _) = router(&root);

        assert_eq!(
            router.route("/a.txt").await.unwrap(),
            RouteDecision::Local(root.join("a.txt"))
        );
    }

    #[tokio::test]
    async fn redirect_when_pool_has_members() {
        let root = Utils::test_sub_dir("router-redirect");
        fs::write(root.join("a.txt"), b"hello").unwrap();
        let (router, pool, _, signer) = router(&root);
        pool.upsert(entry("c2"));

        let hash = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";
        match router.route("a.txt").await.unwrap() {
            RouteDecision::Redirect { cluster_id, url } => {
                assert_eq!(cluster_id, "c2");
                let prefix = format!("http://10.0.0.9:4000/download/{}?s=", hash);
                assert!(url.starts_with(&prefix), "{}", url);

                let query = &url[url.find('?').unwrap() + 1..];
                let (s, e) = query.split_once("&e=").unwrap();
                assert!(signer.verify(hash, "node-secret", s.trim_start_matches("s="), e));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    fn redirect_hash(decision: RouteDecision) -> String {
        match decision {
            RouteDecision::Redirect { url, .. } => {
                let rest = &url[url.find("/download/").unwrap() + "/download/".len()..];
                rest[..rest.find('?').unwrap()].to_string()
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    fn set_mtime(path: &Path, secs: u64) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    #[tokio::test]
    async fn file_added_after_manifest_build_is_downloadable() {
        let root = Utils::test_sub_dir("router-unindexed");
        fs::write(root.join("a.txt"), b"hello").unwrap();
        let (router, pool, manifest, _) = router(&root);
        manifest.refresh().unwrap();

        fs::write(root.join("later.txt"), b"written after the build").unwrap();
        pool.upsert(entry("c2"));

        let hash = redirect_hash(router.route("/later.txt").await.unwrap());
        assert_eq!(hash, ManifestBuilder::hash_file(root.join("later.txt")).unwrap());
        assert!(manifest.current().by_hash(&hash).is_none());
        assert_eq!(
            router.direct_download(&hash).await.unwrap(),
            root.join("later.txt")
        );

        // Once the file changes the old hash no longer names it.
        fs::write(root.join("later.txt"), b"changed").unwrap();
        assert!(matches!(
            router.direct_download(&hash).await,
            Err(FileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn same_size_rewrite_is_hashed_again() {
        let root = Utils::test_sub_dir("router-rewrite");
        let file = root.join("a.txt");
        fs::write(&file, b"hello").unwrap();
        set_mtime(&file, 1_000);
        let (router, pool, manifest, _) = router(&root);
        manifest.refresh().unwrap();
        pool.upsert(entry("c2"));

        assert_eq!(
            redirect_hash(router.route("/a.txt").await.unwrap()),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );

        fs::write(&file, b"HELLO").unwrap();
        set_mtime(&file, 2_000);
        let hash = redirect_hash(router.route("/a.txt").await.unwrap());
        assert_eq!(hash, ManifestBuilder::hash_file(&file).unwrap());
        assert_ne!(hash, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
    }

    #[tokio::test]
    async fn missing_and_directories_are_not_found() {
        let root = Utils::test_sub_dir("router-missing");
        fs::create_dir_all(root.join("dir")).unwrap();
        let (router, pool, _, _) = router(&root);
        pool.upsert(entry("c2"));

        assert!(matches!(router.route("/nope").await, Err(FileError::NotFound(_))));
        assert!(matches!(router.route("/dir").await, Err(FileError::IsDirectory(_))));
        assert!(matches!(
            router.route("/../secret").await,
            Err(FileError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn direct_download_by_hash() {
        let root = Utils::test_sub_dir("router-direct");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub/a.txt"), b"hello").unwrap();
        let (router, _, manifest, _) = router(&root);
        manifest.refresh().unwrap();

        let local = router
            .direct_download("AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D")
            .await
            .unwrap();
        assert_eq!(local, root.join("sub/a.txt"));

        assert!(router.direct_download(&"0".repeat(40)).await.is_err());
        assert!(router.direct_download("xyz").await.is_err());
    }
}
