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

use crate::error::IodineError;
use crate::IodineResult;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConf {
    // Default level, overridden by RUST_LOG when it is set.
    pub level: String,

    // Empty means stderr only.
    pub log_dir: String,

    pub file_name: String,

    // Number of daily files kept in log_dir.
    pub max_log_files: usize,

    pub display_thread: bool,

    pub display_position: bool,
}

impl Default for LogConf {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: "".to_string(),
            file_name: "iodine-server.log".to_string(),
            max_log_files: 10,
            display_thread: false,
            display_position: true,
        }
    }
}

static INIT: OnceCell<Option<WorkerGuard>> = OnceCell::new();

pub struct Logger;

impl Logger {
    /// Install the global subscriber. Only the first call has any effect.
    pub fn init(conf: LogConf) {
        if INIT.get().is_some() {
            return;
        }

        if let Err(e) = Self::try_init(conf) {
            eprintln!("Failed to initialize logger: {}", e);
        }
    }

    fn try_init(conf: LogConf) -> IodineResult<()> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&conf.level))
            .map_err(|e| IodineError::invalid_conf(format!("log level: {}", e)))?;

        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_thread_names(conf.display_thread)
            .with_file(conf.display_position)
            .with_line_number(conf.display_position);

        let (file_layer, guard) = if conf.log_dir.is_empty() {
            (None, None)
        } else {
            std::fs::create_dir_all(&conf.log_dir)?;
            let appender = Builder::new()
                .rotation(Rotation::DAILY)
                .filename_prefix(&conf.file_name)
                .max_log_files(conf.max_log_files.max(1))
                .build(&conf.log_dir)
                .map_err(|e| IodineError::invalid_conf(format!("log appender: {}", e)))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(conf.display_thread)
                .with_file(conf.display_position)
                .with_line_number(conf.display_position);
            (Some(layer), Some(guard))
        };

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer);

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| IodineError::Common(e.to_string()))?;
        // Route log::* records from every crate into the subscriber.
        tracing_log::LogTracer::init().map_err(|e| IodineError::Common(e.to_string()))?;

        let _ = INIT.set(guard);
        Ok(())
    }
}
