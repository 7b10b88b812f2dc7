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

use crate::center::CenterContext;
use crate::manifest::ManifestRefreshTask;
use crate::web::WebRouter;
use iodine_common::conf::{IodineConf, ServerConf};
use iodine_common::executor::ScheduledExecutor;
use iodine_common::version;
use iodine_common::IodineResult;
use log::{error, info, warn};
use std::fs;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct IodineCenter {
    ctx: Arc<CenterContext>,
    stop: Arc<AtomicBool>,
}

impl IodineCenter {
    pub fn new(conf: IodineConf) -> IodineResult<Self> {
        Self::prepare_dirs(&conf.server)?;
        let ctx = CenterContext::from_conf(conf)?;
        Ok(Self::with_context(Arc::new(ctx)))
    }

    pub fn with_context(ctx: Arc<CenterContext>) -> Self {
        Self {
            ctx,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn context(&self) -> Arc<CenterContext> {
        self.ctx.clone()
    }

    pub fn prepare_dirs(conf: &ServerConf) -> IodineResult<()> {
        for dir in [&conf.files_dir, &conf.data_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Build the first manifest and schedule the next ones.
    pub async fn start_manifest(&self) -> IodineResult<()> {
        let cache = self.ctx.manifest.clone();
        match tokio::task::spawn_blocking(move || cache.refresh()).await {
            Ok(Ok(snapshot)) => self.ctx.metrics.manifest_files.set(snapshot.len() as i64),
            Ok(Err(e)) => {
                self.ctx.metrics.manifest_refresh_failures.inc();
                warn!("Initial manifest build failed, serving an empty manifest: {}", e)
            }
            Err(e) => warn!("Initial manifest build did not finish: {}", e),
        }

        let task = ManifestRefreshTask::new(
            self.ctx.manifest.clone(),
            self.ctx.metrics.clone(),
            self.stop.clone(),
        );
        let interval = self.ctx.conf.manifest.refresh_interval.as_millis() as u64;
        ScheduledExecutor::new("manifest-refresh", interval).start(task)?;
        Ok(())
    }

    pub async fn bind(&self) -> IodineResult<TcpListener> {
        let addr = self.ctx.conf.server.bind_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(
            "{} {} listening on {}",
            self.ctx.conf.server.name,
            version::VERSION,
            listener.local_addr()?
        );
        Ok(listener)
    }

    /// Serve until the listener fails.
    pub async fn serve(&self, listener: TcpListener) -> IodineResult<()> {
        let app = WebRouter::build(self.ctx.clone());
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Run until ctrl-c or SIGTERM.
    pub async fn run(&self) -> IodineResult<()> {
        self.start_manifest().await?;
        let listener = self.bind().await?;
        let name = self.ctx.conf.server.name.clone();

        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = signal(SignalKind::terminate())?;

            tokio::select! {
                res = self.serve(listener) => {
                    if let Err(e) = res {
                        error!("{} stopped serving: {}", name, e);
                    }
                }

                _ = ctrl_c => {
                    info!("Receive ctrl_c signal, shutting down {}", name);
                }

                _ = term.recv() => {
                    info!("Receive SIGTERM, shutting down {}", name);
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                res = self.serve(listener) => {
                    if let Err(e) = res {
                        error!("{} stopped serving: {}", name, e);
                    }
                }

                _ = ctrl_c => {
                    info!("Receive ctrl_c signal, shutting down {}", name);
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        info!(
            "{} stopped, {} nodes were online",
            self.ctx.conf.server.name,
            self.ctx.pool.len()
        );
    }
}

impl Drop for IodineCenter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}
