//! Post-reload TCP probes.

use std::time::Duration;

use tokio::net::TcpStream;

/// Whether `host:port` accepts a connection within `timeout`.
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            tracing::debug!(host, port, error = %err, "probe refused");
            false
        }
        Err(_) => {
            tracing::debug!(host, port, "probe timed out");
            false
        }
    }
}

/// Probe every port; passes only if all of them accept.
pub async fn probe_ports(host: &str, ports: &[u16], timeout: Duration) -> bool {
    let mut all_up = true;
    for &port in ports {
        let up = probe_port(host, port, timeout).await;
        if !up {
            tracing::warn!(host, port, "health probe failed");
        }
        all_up &= up;
    }
    all_up
}
