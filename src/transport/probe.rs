use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Whether anything accepts TCP connections at `host:port` within `limit`.
///
/// Used only to tell "broker host is down" apart from "broker is up but
/// not answering MQTT" after a connect timeout.
pub async fn host_reachable(host: &str, port: u16, limit: Duration) -> bool {
    matches!(
        timeout(limit, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
