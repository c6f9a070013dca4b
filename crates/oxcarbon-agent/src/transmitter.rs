use crate::error::{Result, TransmissionError};
use async_trait::async_trait;
use oxcarbon_common::config::Configuration;
use oxcarbon_common::types::MetricBatch;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

/// Upper bound for one UDP payload; lines are never split across datagrams.
pub const MAX_DATAGRAM_BYTES: usize = 1400;

/// Where and how a batch is delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub use_udp: bool,
    /// Bound on the whole transmission, connect included.
    pub timeout: Duration,
}

impl Endpoint {
    pub fn from_config(config: &Configuration) -> Self {
        Self {
            host: config.carbon_server.clone(),
            port: config.carbon_server_port,
            use_udp: config.send_using_udp,
            timeout: config.transmit_timeout(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let proto = if self.use_udp { "udp" } else { "tcp" };
        write!(f, "{proto}://{}:{}", self.host, self.port)
    }
}

/// Renders each entry as `path value epoch` (no trailing newline).
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use oxcarbon_agent::transmitter::render_lines;
/// use oxcarbon_common::types::MetricBatch;
///
/// let mut batch = MetricBatch::new(Utc.timestamp_opt(1_700_000_040, 0).unwrap());
/// batch.insert("host1.cpu.pct", 42.0);
/// assert_eq!(render_lines(&batch), vec!["host1.cpu.pct 42 1700000040"]);
/// ```
pub fn render_lines(batch: &MetricBatch) -> Vec<String> {
    let ts = batch.timestamp.timestamp();
    batch
        .iter()
        .map(|(path, value)| format!("{path} {value} {ts}"))
        .collect()
}

/// Packs newline-terminated lines into payloads of at most `max_bytes`.
/// A single line longer than `max_bytes` is sent on its own.
pub fn pack_datagrams(lines: &[String], max_bytes: usize) -> Vec<Vec<u8>> {
    let mut datagrams = Vec::new();
    let mut current: Vec<u8> = Vec::with_capacity(max_bytes);

    for line in lines {
        let needed = line.len() + 1;
        if !current.is_empty() && current.len() + needed > max_bytes {
            datagrams.push(std::mem::take(&mut current));
        }
        current.extend_from_slice(line.as_bytes());
        current.push(b'\n');
    }
    if !current.is_empty() {
        datagrams.push(current);
    }
    datagrams
}

/// Destination for a finished batch.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Delivers `batch` to `endpoint`. The batch is not retained afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`TransmissionError`] if delivery fails; the caller drops the
    /// batch and carries on.
    async fn send(&self, batch: &MetricBatch, endpoint: &Endpoint) -> Result<()>;
}

/// Plaintext Carbon protocol over UDP or TCP.
///
/// In test mode the would-be lines are printed to stdout instead and no
/// socket is opened.
#[derive(Debug, Clone, Default)]
pub struct CarbonTransmitter {
    test_mode: bool,
}

impl CarbonTransmitter {
    pub fn new(test_mode: bool) -> Self {
        Self { test_mode }
    }

    #[allow(clippy::print_stdout)]
    fn render_for_inspection(lines: &[String], endpoint: &Endpoint) {
        tracing::info!(count = lines.len(), endpoint = %endpoint, "Test mode, not sending");
        for line in lines {
            println!("{line}");
        }
    }
}

#[async_trait]
impl MetricSink for CarbonTransmitter {
    async fn send(&self, batch: &MetricBatch, endpoint: &Endpoint) -> Result<()> {
        if batch.is_empty() {
            tracing::debug!("Empty batch, nothing to send");
            return Ok(());
        }

        let lines = render_lines(batch);
        if self.test_mode {
            Self::render_for_inspection(&lines, endpoint);
            return Ok(());
        }

        tokio::time::timeout(endpoint.timeout, deliver(&lines, endpoint))
            .await
            .map_err(|_| TransmissionError::Timeout(endpoint.timeout))??;

        tracing::debug!(count = lines.len(), endpoint = %endpoint, "Batch sent");
        Ok(())
    }
}

async fn deliver(lines: &[String], endpoint: &Endpoint) -> Result<()> {
    let addr = resolve(endpoint).await?;
    if endpoint.use_udp {
        send_udp(addr, lines).await
    } else {
        send_tcp(addr, lines).await
    }
}

async fn resolve(endpoint: &Endpoint) -> Result<SocketAddr> {
    tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| TransmissionError::Resolve {
            host: endpoint.host.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| TransmissionError::NoAddress(endpoint.host.clone()))
}

async fn send_udp(addr: SocketAddr, lines: &[String]) -> Result<()> {
    let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = UdpSocket::bind(bind_addr).await?;
    for datagram in pack_datagrams(lines, MAX_DATAGRAM_BYTES) {
        socket.send_to(&datagram, addr).await?;
    }
    Ok(())
}

async fn send_tcp(addr: SocketAddr, lines: &[String]) -> Result<()> {
    let mut payload = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        payload.push_str(line);
        payload.push('\n');
    }

    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(payload.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Instant;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpSocket};

    fn batch() -> MetricBatch {
        let mut batch = MetricBatch::new(Utc.timestamp_opt(1_700_000_040, 0).unwrap());
        batch.insert("host1.disk.free", 500.0);
        batch.insert("host1.cpu.pct", 42.5);
        batch
    }

    fn endpoint(port: u16, use_udp: bool) -> Endpoint {
        Endpoint {
            host: "127.0.0.1".to_string(),
            port,
            use_udp,
            timeout: Duration::from_secs(5),
        }
    }

    /// Roughly 13 MB of lines, more than loopback socket buffers absorb.
    fn large_batch() -> MetricBatch {
        let mut batch = MetricBatch::new(Utc.timestamp_opt(1_700_000_040, 0).unwrap());
        let stem = "x".repeat(120);
        for i in 0..100_000 {
            batch.insert(format!("{stem}.m{i:06}"), 1.0);
        }
        batch
    }

    /// Accepts one connection and never reads from it.
    async fn silent_receiver() -> u16 {
        let socket = TcpSocket::new_v4().unwrap();
        socket.set_recv_buffer_size(4096).unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(1).unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });
        port
    }

    #[test]
    fn lines_are_sorted_by_path() {
        assert_eq!(
            render_lines(&batch()),
            vec![
                "host1.cpu.pct 42.5 1700000040".to_string(),
                "host1.disk.free 500 1700000040".to_string(),
            ]
        );
    }

    #[test]
    fn datagrams_respect_size_and_line_boundaries() {
        let lines: Vec<String> = (0..10).map(|i| format!("metric.{i} 1 0")).collect();
        let datagrams = pack_datagrams(&lines, 30);
        assert!(datagrams.len() > 1);
        for d in &datagrams {
            assert!(d.len() <= 30);
            assert_eq!(d.last(), Some(&b'\n'));
        }
        let joined: Vec<u8> = datagrams.concat();
        assert_eq!(String::from_utf8(joined).unwrap().lines().count(), 10);
    }

    #[test]
    fn oversized_line_travels_alone() {
        let lines = vec!["x".repeat(50), "short 1 0".to_string()];
        let datagrams = pack_datagrams(&lines, 20);
        assert_eq!(datagrams.len(), 2);
        assert_eq!(datagrams[0].len(), 51);
    }

    #[tokio::test]
    async fn tcp_delivers_all_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = String::new();
            socket.read_to_string(&mut received).await.unwrap();
            received
        });

        CarbonTransmitter::new(false)
            .send(&batch(), &endpoint(port, false))
            .await
            .unwrap();

        let received = server.await.unwrap();
        assert_eq!(
            received,
            "host1.cpu.pct 42.5 1700000040\nhost1.disk.free 500 1700000040\n"
        );
    }

    #[tokio::test]
    async fn udp_delivers_datagram() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();

        CarbonTransmitter::new(false)
            .send(&batch(), &endpoint(port, true))
            .await
            .unwrap();

        let mut buf = vec![0u8; 2048];
        let (n, _) = socket.recv_from(&mut buf).await.unwrap();
        let text = std::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.contains("host1.cpu.pct 42.5 1700000040\n"));
        assert!(text.contains("host1.disk.free 500 1700000040\n"));
    }

    #[tokio::test]
    async fn refused_connection_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = CarbonTransmitter::new(false)
            .send(&batch(), &endpoint(port, false))
            .await
            .unwrap_err();
        assert!(matches!(err, TransmissionError::Io(_)), "{err}");
    }

    #[tokio::test]
    async fn stalled_receiver_hits_timeout() {
        let port = silent_receiver().await;
        let batch = large_batch();
        let mut endpoint = endpoint(port, false);
        endpoint.timeout = Duration::from_millis(300);

        let started = Instant::now();
        let err = CarbonTransmitter::new(false)
            .send(&batch, &endpoint)
            .await
            .unwrap_err();
        assert!(
            matches!(err, TransmissionError::Timeout(t) if t == Duration::from_millis(300)),
            "{err}"
        );
        assert!(started.elapsed() < Duration::from_secs(5), "{:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_mode_performs_no_io() {
        let unreachable = Endpoint {
            host: "carbon.invalid".to_string(),
            port: 2003,
            use_udp: false,
            timeout: Duration::from_millis(10),
        };
        CarbonTransmitter::new(true)
            .send(&batch(), &unreachable)
            .await
            .unwrap();
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(endpoint(2003, true).to_string(), "udp://127.0.0.1:2003");
    }
}
