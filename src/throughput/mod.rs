//! Download and upload throughput measurement
//!
//! A measurement splits the requested size across several parallel streams
//! and reports the aggregate bytes moved over the shared elapsed window. When
//! the window closes before the transfer completes, the bytes moved so far are
//! divided by the window length, giving a lower bound instead of an error.
//!
//! [`ThroughputMeter::measure`] runs both directions inside a single window
//! of the configured timeout.

use crate::{
    client::{ByteStream, ProxyTransport},
    error::{AppError, Result},
    models::TestConfig,
};
use bytes::Bytes;
use futures::{future::join_all, stream, StreamExt, TryStreamExt};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::time::{timeout_at, Instant};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;
static ZEROS: [u8; UPLOAD_CHUNK_SIZE] = [0u8; UPLOAD_CHUNK_SIZE];

/// Timed, size-bounded transfers through a transport
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    streams: usize,
    timeout: Duration,
}

impl ThroughputMeter {
    pub fn new(streams: usize, timeout: Duration) -> Self {
        Self {
            streams: streams.max(1),
            timeout,
        }
    }

    pub fn from_config(config: &TestConfig) -> Self {
        Self::new(config.transfer_streams, config.transfer_timeout)
    }

    /// Download then upload inside one window of the meter's timeout.
    ///
    /// When both directions are enabled the download may use at most half
    /// the window; the upload gets whatever remains.
    pub async fn measure(
        &self,
        transport: &dyn ProxyTransport,
        endpoint: &str,
        download_size: u64,
        upload_size: u64,
    ) -> (Option<f64>, Option<f64>) {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let download_deadline = if upload_size > 0 {
            start + self.timeout / 2
        } else {
            deadline
        };

        let download = self
            .download_until(transport, endpoint, download_size, download_deadline)
            .await;
        let upload = self.upload_until(transport, endpoint, upload_size, deadline).await;
        (download, upload)
    }

    /// Download `size` bytes from `{endpoint}/__down`, returning bytes/second.
    ///
    /// `None` when `size` is zero or no stream moved a byte.
    pub async fn measure_download(
        &self,
        transport: &dyn ProxyTransport,
        endpoint: &str,
        size: u64,
    ) -> Option<f64> {
        self.download_until(transport, endpoint, size, Instant::now() + self.timeout)
            .await
    }

    /// Upload `size` zero bytes to `{endpoint}/__up`, returning bytes/second.
    ///
    /// `None` when `size` is zero or no stream moved a byte.
    pub async fn measure_upload(
        &self,
        transport: &dyn ProxyTransport,
        endpoint: &str,
        size: u64,
    ) -> Option<f64> {
        self.upload_until(transport, endpoint, size, Instant::now() + self.timeout)
            .await
    }

    async fn download_until(
        &self,
        transport: &dyn ProxyTransport,
        endpoint: &str,
        size: u64,
        deadline: Instant,
    ) -> Option<f64> {
        if size == 0 {
            return None;
        }

        let counter = Arc::new(AtomicU64::new(0));
        let streams = split_size(size, self.streams)
            .into_iter()
            .map(|chunk| {
                let url = download_url(endpoint, chunk);
                let counter = counter.clone();
                async move { download_stream(transport, &url, &counter).await }
            })
            .collect::<Vec<_>>();

        run_streams(streams, &counter, deadline).await
    }

    async fn upload_until(
        &self,
        transport: &dyn ProxyTransport,
        endpoint: &str,
        size: u64,
        deadline: Instant,
    ) -> Option<f64> {
        if size == 0 {
            return None;
        }

        let url = upload_url(endpoint);
        let counter = Arc::new(AtomicU64::new(0));
        let streams = split_size(size, self.streams)
            .into_iter()
            .map(|chunk| {
                let url = url.as_str();
                let body = zero_body(chunk, counter.clone());
                async move {
                    let status = transport.post(url, body, chunk).await?;
                    if (200..300).contains(&status) {
                        Ok(())
                    } else {
                        Err(AppError::http_request(format!("upload returned HTTP {}", status)))
                    }
                }
            })
            .collect::<Vec<_>>();

        run_streams(streams, &counter, deadline).await
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::from_config(&TestConfig::default())
    }
}

/// `{server}/__down?bytes=N`; a zero-byte download doubles as the probe URL
pub fn download_url(server: &str, bytes: u64) -> String {
    format!("{}/__down?bytes={}", server.trim_end_matches('/'), bytes)
}

pub fn upload_url(server: &str) -> String {
    format!("{}/__up", server.trim_end_matches('/'))
}

/// Aggregate bytes per second of `streams` run together until `deadline`
async fn run_streams<F>(streams: Vec<F>, counter: &AtomicU64, deadline: Instant) -> Option<f64>
where
    F: Future<Output = Result<()>>,
{
    let start = Instant::now();
    if deadline <= start {
        return None;
    }

    let elapsed = match timeout_at(deadline, join_all(streams)).await {
        Ok(_) => start.elapsed(),
        Err(_) => deadline - start,
    };

    let bytes = counter.load(Ordering::Relaxed);
    if bytes == 0 {
        return None;
    }

    let seconds = elapsed.as_secs_f64().max(1e-6);
    Some(bytes as f64 / seconds)
}

/// Split `size` into at most `streams` non-empty parts that sum to `size`
pub fn split_size(size: u64, streams: usize) -> Vec<u64> {
    let streams = (streams.max(1) as u64).min(size);
    if streams == 0 {
        return Vec::new();
    }

    let base = size / streams;
    let remainder = size % streams;
    (0..streams)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

async fn download_stream(transport: &dyn ProxyTransport, url: &str, counter: &AtomicU64) -> Result<()> {
    let response = transport.get(url).await?;
    if !response.is_success() {
        return Err(AppError::http_request(format!("download returned HTTP {}", response.status)));
    }

    let mut body = response.body;
    while let Some(chunk) = body.next().await {
        counter.fetch_add(chunk?.len() as u64, Ordering::Relaxed);
    }

    Ok(())
}

/// Body of `size` zero bytes; counts bytes as the transport pulls them
fn zero_body(size: u64, counter: Arc<AtomicU64>) -> ByteStream {
    stream::unfold(size, |remaining| async move {
        if remaining == 0 {
            return None;
        }
        let len = remaining.min(UPLOAD_CHUNK_SIZE as u64) as usize;
        Some((Ok::<Bytes, AppError>(Bytes::from_static(&ZEROS[..len])), remaining - len as u64))
    })
    .inspect_ok(move |chunk: &Bytes| {
        counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::sleep;

    /// Serves `bytes=N` downloads as 100-byte chunks, one every `chunk_delay`
    struct PacedTransport {
        chunk_delay: Duration,
        status: u16,
        requested: Mutex<Vec<String>>,
    }

    impl PacedTransport {
        fn new(chunk_delay: Duration) -> Self {
            Self {
                chunk_delay,
                status: 200,
                requested: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ProxyTransport for PacedTransport {
        async fn get(&self, url: &str) -> Result<TransportResponse> {
            self.requested.lock().unwrap().push(url.to_string());
            let bytes: u64 = url
                .rsplit("bytes=")
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            let delay = self.chunk_delay;
            let body = stream::unfold(bytes, move |remaining| async move {
                if remaining == 0 {
                    return None;
                }
                sleep(delay).await;
                let len = remaining.min(100);
                Some((Ok::<Bytes, AppError>(Bytes::from(vec![0u8; len as usize])), remaining - len))
            })
            .boxed();
            Ok(TransportResponse::new(self.status, body))
        }

        async fn post(&self, _url: &str, mut body: ByteStream, _len: u64) -> Result<u16> {
            while let Some(chunk) = body.next().await {
                chunk?;
                sleep(self.chunk_delay).await;
            }
            Ok(self.status)
        }
    }

    #[test]
    fn test_split_size() {
        assert_eq!(split_size(10, 3), vec![4, 3, 3]);
        assert_eq!(split_size(9, 3), vec![3, 3, 3]);
        assert_eq!(split_size(2, 5), vec![1, 1]);
        assert_eq!(split_size(7, 0), vec![7]);
        assert!(split_size(0, 4).is_empty());
        assert_eq!(split_size(50 * 1024 * 1024, 20).iter().sum::<u64>(), 50 * 1024 * 1024);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_completes_within_window() {
        let transport = PacedTransport::new(Duration::from_millis(10));
        let meter = ThroughputMeter::new(1, Duration::from_secs(5));

        // 10 chunks of 100 bytes, 10ms apart: 1000 bytes in 100ms
        let speed = meter.measure_download(&transport, "http://speed.test/", 1000).await.unwrap();
        assert!((speed - 10_000.0).abs() < 1.0, "speed = {}", speed);
        assert_eq!(
            transport.requested.lock().unwrap().as_slice(),
            ["http://speed.test/__down?bytes=1000".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_splits_across_streams() {
        let transport = PacedTransport::new(Duration::from_millis(10));
        let meter = ThroughputMeter::new(4, Duration::from_secs(5));

        // Four 250-byte streams in parallel: 3 chunks each, 30ms total
        let speed = meter.measure_download(&transport, "http://speed.test", 1000).await.unwrap();
        assert!((speed - 1000.0 / 0.03).abs() < 1.0, "speed = {}", speed);
        assert_eq!(transport.requested.lock().unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_timeout_gives_lower_bound() {
        let transport = PacedTransport::new(Duration::from_millis(10));
        let meter = ThroughputMeter::new(1, Duration::from_millis(500));

        // Would need 10s; only ~50 chunks fit in the window
        let speed = meter.measure_download(&transport, "http://speed.test", 100_000).await.unwrap();
        assert!(speed >= 9_800.0 && speed <= 10_000.0, "speed = {}", speed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_size_is_none() {
        let transport = PacedTransport::new(Duration::from_millis(10));
        let meter = ThroughputMeter::new(4, Duration::from_secs(1));
        assert!(meter.measure_download(&transport, "http://speed.test", 0).await.is_none());
        assert!(meter.measure_upload(&transport, "http://speed.test", 0).await.is_none());
        assert!(transport.requested.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_streams_are_none() {
        let mut transport = PacedTransport::new(Duration::from_millis(10));
        transport.status = 500;
        let meter = ThroughputMeter::new(2, Duration::from_secs(1));
        assert!(meter.measure_download(&transport, "http://speed.test", 1000).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_counts_pulled_bytes() {
        let transport = PacedTransport::new(Duration::from_millis(10));
        let meter = ThroughputMeter::new(1, Duration::from_secs(5));

        // 2 full chunks + 1 partial, 10ms each
        let size = (UPLOAD_CHUNK_SIZE * 2 + 100) as u64;
        let speed = meter.measure_upload(&transport, "http://speed.test", size).await.unwrap();
        assert!((speed - size as f64 / 0.03).abs() < 1.0, "speed = {}", speed);
    }

    #[tokio::test]
    async fn test_zero_body_length() {
        let counter = Arc::new(AtomicU64::new(0));
        let body = zero_body(150_000, counter.clone());
        let chunks: Vec<Bytes> = body.try_collect().await.unwrap();
        assert_eq!(chunks.iter().map(|c| c.len()).sum::<usize>(), 150_000);
        assert_eq!(counter.load(Ordering::Relaxed), 150_000);
        assert!(chunks.iter().all(|c| c.iter().all(|&b| b == 0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_shares_one_window() {
        let transport = PacedTransport::new(Duration::from_millis(10));
        let meter = ThroughputMeter::new(2, Duration::from_secs(1));

        // Neither direction could finish in a second
        let start = Instant::now();
        let (download, upload) = meter
            .measure(&transport, "http://speed.test", 1_000_000, 200 * UPLOAD_CHUNK_SIZE as u64)
            .await;

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        // Two streams of 100 bytes every 10ms, cut off after half a second
        let download = download.unwrap();
        assert!(download >= 19_600.0 && download <= 20_000.0, "download = {}", download);
        assert!(upload.unwrap() > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_download_only_uses_whole_window() {
        let transport = PacedTransport::new(Duration::from_millis(10));
        let meter = ThroughputMeter::new(1, Duration::from_secs(1));

        let start = Instant::now();
        let (download, upload) = meter.measure(&transport, "http://speed.test", 1_000_000, 0).await;

        assert_eq!(start.elapsed(), Duration::from_secs(1));
        assert!(download.is_some());
        assert!(upload.is_none());
    }

    #[test]
    fn test_endpoint_urls() {
        assert_eq!(download_url("https://speed.example.com/", 0), "https://speed.example.com/__down?bytes=0");
        assert_eq!(download_url("https://speed.example.com", 1024), "https://speed.example.com/__down?bytes=1024");
        assert_eq!(upload_url("https://speed.example.com/"), "https://speed.example.com/__up");
    }
}
