use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use commitlog::auth::Acl;
use commitlog::properties::ServerProperties;
use commitlog::{Log, Server};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let props = match std::env::args().nth(1) {
        Some(path) => ServerProperties::load(path).await?,
        None => ServerProperties::default(),
    };

    let log = Log::open(&props.log_dir, props.segment_config()).context("open commit log")?;

    let acl = match &props.acl_policy_file {
        Some(path) => Some(Acl::load(path).await.context("load ACL policy")?),
        None => None,
    };

    let server = Arc::new(Server::new(Arc::new(log), acl));

    let listener = TcpListener::bind(&props.listen_addr)
        .await
        .context("failed to bind TCP listener")?;

    info!(addr = %props.listen_addr, "listening");

    loop {
        tokio::select! {
            conn = listener.accept() => match conn {
                Ok((stream, addr)) => {
                    debug!(%addr, "accepted new connection");
                    let server = Arc::clone(&server);
                    tokio::spawn(async move {
                        if let Err(error) = server.handle_connection(stream).await {
                            warn!(%error, "connection failed");
                        }
                    });
                }
                Err(error) => warn!(%error, "connection failed"),
            }
        }
    }
}
