use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::log::{Config, SegmentConfig};

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:9092";
const DEFAULT_LOG_DIR: &str = "./data";

#[derive(Debug)]
pub struct ServerProperties {
    /// The `listen.addr` property
    pub listen_addr: String,
    /// The `log.dir` property
    pub log_dir: PathBuf,
    /// The `acl.policy.file` property; absent means every request is allowed
    pub acl_policy_file: Option<PathBuf>,
    /// The `segment.max.store.bytes` property (0 = engine default)
    pub max_store_bytes: u64,
    /// The `segment.max.index.bytes` property (0 = engine default)
    pub max_index_bytes: u64,
    /// The `segment.initial.offset` property
    pub initial_offset: u64,
}

impl Default for ServerProperties {
    fn default() -> Self {
        ServerPropertiesBuilder::default().build()
    }
}

impl ServerProperties {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)
            .await
            .with_context(|| format!("cannot open properties file {path:?}"))?;

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut props = ServerPropertiesBuilder::default();

        loop {
            line.clear();

            let n = reader
                .read_line(&mut line)
                .await
                .context("reading properties line")?;

            if n == 0 {
                break Ok(props.build());
            }

            match line.trim() {
                // skip comments
                line if line.starts_with('#') => continue,

                line if line.starts_with("listen.addr") => {
                    props.listen_addr = value_of(line).map(str::to_string);
                }

                line if line.starts_with("log.dir") => {
                    props.log_dir = value_of(line).map(PathBuf::from);
                }

                line if line.starts_with("acl.policy.file") => {
                    props.acl_policy_file = value_of(line).map(PathBuf::from);
                }

                line if line.starts_with("segment.max.store.bytes") => {
                    props.max_store_bytes = value_of(line).and_then(|v| v.parse().ok());
                }

                line if line.starts_with("segment.max.index.bytes") => {
                    props.max_index_bytes = value_of(line).and_then(|v| v.parse().ok());
                }

                line if line.starts_with("segment.initial.offset") => {
                    props.initial_offset = value_of(line).and_then(|v| v.parse().ok());
                }

                _ => continue,
            }
        }
    }

    /// Segment sizing for [`crate::log::Log::open`]; zeros fall back to the
    /// engine defaults there.
    pub fn segment_config(&self) -> Config {
        Config {
            segment: SegmentConfig {
                max_store_bytes: self.max_store_bytes,
                max_index_bytes: self.max_index_bytes,
                initial_offset: self.initial_offset,
            },
        }
    }
}

fn value_of(line: &str) -> Option<&str> {
    line.split_once('=').map(|(_, value)| value.trim())
}

#[derive(Default)]
struct ServerPropertiesBuilder {
    listen_addr: Option<String>,
    log_dir: Option<PathBuf>,
    acl_policy_file: Option<PathBuf>,
    max_store_bytes: Option<u64>,
    max_index_bytes: Option<u64>,
    initial_offset: Option<u64>,
}

impl ServerPropertiesBuilder {
    fn build(self) -> ServerProperties {
        ServerProperties {
            listen_addr: self
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            log_dir: self.log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR)),
            acl_policy_file: self.acl_policy_file,
            max_store_bytes: self.max_store_bytes.unwrap_or(0),
            max_index_bytes: self.max_index_bytes.unwrap_or(0),
            initial_offset: self.initial_offset.unwrap_or(0),
        }
    }
}
