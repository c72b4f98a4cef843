//! Short-lived Tiberius connections, one per scoped call.

use std::time::Duration;

use tiberius::Client;
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use crate::error::{AdminError, Result};

use super::scope::ConnectionScope;

/// Client type used by every operation.
pub type MssqlClient = Client<Compat<TcpStream>>;

/// TCP keepalive interval (30 seconds).
const TCP_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Open a connection for `scope`.
///
/// The caller owns the returned client; dropping it closes the socket.
pub async fn open(scope: &ConnectionScope) -> Result<MssqlClient> {
    let config = scope.to_config()?;
    let addr = config.get_addr();

    debug!("Opening connection to {} (catalog {})", addr, scope.catalog());

    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| AdminError::connection(e, format!("connecting to {}", addr)))?;

    tcp.set_nodelay(true).ok();
    let tcp = with_keepalive(tcp)?;

    let client = Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| match e {
            tiberius::error::Error::Io { .. } => {
                AdminError::connection(e, format!("handshake with {}", addr))
            }
            other => AdminError::Backend(other),
        })?;

    Ok(client)
}

/// Close a client, logging instead of failing when the server is already gone.
pub async fn close(client: MssqlClient) {
    if let Err(e) = client.close().await {
        debug!("Ignoring error while closing connection: {}", e);
    }
}

/// Run `SELECT 1` on the server root to confirm the connection works.
pub async fn ping(client: &mut MssqlClient) -> Result<()> {
    client.simple_query("SELECT 1").await?.into_row().await?;
    Ok(())
}

fn with_keepalive(tcp: TcpStream) -> Result<TcpStream> {
    let std_tcp = match tcp.into_std() {
        Ok(s) => s,
        Err(e) => {
            return Err(AdminError::connection(e, "detaching socket for keepalive setup"));
        }
    };

    let socket = socket2::Socket::from(std_tcp);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(TCP_KEEPALIVE_INTERVAL)
        .with_interval(TCP_KEEPALIVE_INTERVAL);

    if let Err(e) = socket.set_tcp_keepalive(&keepalive) {
        warn!("Failed to set TCP keepalive on MSSQL connection: {}", e);
    }

    let std_tcp: std::net::TcpStream = socket.into();
    std_tcp.set_nonblocking(true).ok();
    TcpStream::from_std(std_tcp)
        .map_err(|e| AdminError::connection(e, "re-registering socket with the runtime"))
}
