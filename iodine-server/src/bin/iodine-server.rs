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

use clap::Parser;
use iodine_common::conf::IodineConf;
use iodine_common::utils::Logger;
use iodine_common::version;
use iodine_common::IodineResult;
use iodine_server::center::IodineCenter;
use log::info;

// cargo run --bin iodine-server -- --conf etc/iodine-server.toml
fn main() -> IodineResult<()> {
    let args = ServerArgs::parse();
    let conf = args.get_conf()?;
    Logger::init(conf.log.clone());
    info!("iodine-server {} starting, args {:?}", version::VERSION, args);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(conf.server.worker_threads)
        .thread_name("iodine-worker")
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let center = IodineCenter::new(conf)?;
        center.run().await
    })
}

#[derive(Debug, Parser)]
#[command(version = version::VERSION)]
pub struct ServerArgs {
    // Configuration file path (optional)
    #[arg(short, long, help = "Configuration file path (optional)")]
    pub conf: Option<String>,

    #[arg(long, help = "Listen port, overrides server.port (optional)")]
    pub port: Option<u16>,

    #[arg(long, help = "Files directory, overrides server.files_dir (optional)")]
    pub files_dir: Option<String>,
}

impl ServerArgs {
    // --conf, then $IODINE_CONF_FILE, then built-in defaults.
    pub fn get_conf(&self) -> IodineResult<IodineConf> {
        let path = self
            .conf
            .clone()
            .or_else(|| std::env::var(IodineConf::ENV_CONF_FILE).ok());

        let mut conf = match path {
            Some(p) => IodineConf::from(p)?,
            None => IodineConf::from_toml("")?,
        };

        if let Some(port) = self.port {
            conf.server.port = port;
        }
        if let Some(dir) = &self.files_dir {
            conf.server.files_dir = dir.clone();
        }
        conf.init()?;
        Ok(conf)
    }
}
