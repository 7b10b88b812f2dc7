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

use crate::conf::{AuthConf, ManifestConf, ProbeConf, ServerConf, SyncConf};
use crate::utils::LogConf;
use crate::IodineResult;
use serde::{Deserialize, Serialize};
use std::fs;

/// Root of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IodineConf {
    pub server: ServerConf,
    pub auth: AuthConf,
    pub probe: ProbeConf,
    pub manifest: ManifestConf,
    pub sync: SyncConf,
    pub log: LogConf,
}

impl IodineConf {
    pub const ENV_CONF_FILE: &'static str = "IODINE_CONF_FILE";

    pub fn from<T: AsRef<str>>(path: T) -> IodineResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> IodineResult<Self> {
        let mut conf: IodineConf = toml::from_str(content)?;
        conf.init()?;
        Ok(conf)
    }

    /// Parse the duration strings of every section.
    pub fn init(&mut self) -> IodineResult<()> {
        self.server.init()?;
        self.auth.init()?;
        self.probe.init()?;
        self.manifest.init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::IodineConf;
    use std::time::Duration;

    #[test]
    fn defaults_are_initialized() {
        let conf = IodineConf::from_toml("").unwrap();
        assert_eq!(conf.auth.challenge_ttl, Duration::from_secs(5 * 60));
        assert_eq!(conf.auth.token_ttl.as_millis(), 86_400_000);
        assert_eq!(conf.probe.min_bandwidth_mbps, 10.0);
        assert_eq!(conf.manifest.refresh_interval, Duration::from_secs(10 * 60));
        assert_eq!(conf.sync.source, "center");
        assert_eq!(conf.sync.concurrency, 100);
    }

    #[test]
    fn override_sections() {
        let conf = IodineConf::from_toml(
            r#"
            [server]
            port = 9300
            files_dir = "/srv/files"
            cluster_store = "memory"

            [auth]
            challenge_ttl = "1m"

            [probe]
            min_bandwidth_mbps = 50.0
            timeout = "3s"

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(conf.server.port, 9300);
        assert_eq!(conf.server.files_dir, "/srv/files");
        assert_eq!(conf.auth.challenge_ttl, Duration::from_secs(60));
        assert_eq!(conf.probe.min_bandwidth_mbps, 50.0);
        assert_eq!(conf.probe.timeout, Duration::from_secs(3));
        assert_eq!(conf.log.level, "debug");
    }

    #[test]
    fn sample_file_matches_defaults() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../etc/iodine-server.toml");
        let conf = IodineConf::from(path).unwrap();
        assert_eq!(conf.server.port, 8080);
        assert_eq!(conf.auth.sign_ttl, Duration::from_secs(5 * 60));
        assert_eq!(conf.probe.probe_size_bytes(), 10 * 1024 * 1024);
        assert_eq!(conf.log.max_log_files, 10);
    }

    #[test]
    fn bad_duration_is_rejected() {
        assert!(IodineConf::from_toml("[auth]\ntoken_ttl = \"forever\"").is_err());
    }
}
