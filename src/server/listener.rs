use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::broker::Broker;
use crate::config::Config;
use crate::http::connection::Connection;

pub async fn run<B: Broker>(cfg: &Config, broker: Arc<B>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", cfg.listen_addr);
    serve(listener, broker).await
}

/// Accept connections forever, one task per connection.
pub async fn serve<B: Broker>(listener: TcpListener, broker: Arc<B>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        debug!("Accepted connection from {}", peer);

        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, broker);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
