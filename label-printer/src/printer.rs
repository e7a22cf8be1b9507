//! Print sinks for sending rendered documents
//!
//! Supports:
//! - Network printers (raw TCP, port 9100)
//! - Spool directories (one file per document, picked up by a print spooler
//!   or copied to a printer share by the host)

use crate::error::{DeliveryError, DeliveryResult};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

/// Capability to deliver one rendered document
///
/// The pipeline only ever needs this narrow call, so real printers and test
/// doubles are interchangeable.
pub trait PrintSink: Send + Sync {
    /// Send one document; `Ok` means the sink accepted every byte
    fn deliver(&self, data: &[u8]) -> impl Future<Output = DeliveryResult<()>> + Send;

    /// Send documents in order, stopping at the first failure
    ///
    /// Returns how many documents were accepted.
    fn deliver_batch(
        &self,
        documents: &[&[u8]],
    ) -> impl Future<Output = DeliveryResult<usize>> + Send {
        async move {
            for (sent, data) in documents.iter().enumerate() {
                if let Err(e) = self.deliver(data).await {
                    debug!(sent, total = documents.len(), error = %e, "Batch delivery stopped");
                    return Err(e);
                }
            }
            Ok(documents.len())
        }
    }

    /// Check if the sink is reachable
    fn is_online(&self) -> impl Future<Output = bool> + Send;
}

impl<T: PrintSink> PrintSink for Arc<T> {
    fn deliver(&self, data: &[u8]) -> impl Future<Output = DeliveryResult<()>> + Send {
        (**self).deliver(data)
    }

    fn deliver_batch(
        &self,
        documents: &[&[u8]],
    ) -> impl Future<Output = DeliveryResult<usize>> + Send {
        (**self).deliver_batch(documents)
    }

    fn is_online(&self) -> impl Future<Output = bool> + Send {
        (**self).is_online()
    }
}

/// Network printer (TCP port 9100)
///
/// Zebra and most ZPL-compatible printers accept raw programs on port 9100.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> DeliveryResult<Self> {
        Self::from_addr(&format!("{}:{}", host, port))
    }

    /// Create from a socket address string (e.g., "192.168.1.50:9100")
    pub fn from_addr(addr: &str) -> DeliveryResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| DeliveryError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Set connect and write timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl PrintSink for NetworkPrinter {
    #[instrument(skip(self, data), fields(addr = %self.addr, data_len = data.len()))]
    async fn deliver(&self, data: &[u8]) -> DeliveryResult<()> {
        debug!("Connecting to printer");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| DeliveryError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| DeliveryError::Connection(format!("{}: {}", self.addr, e)))?;

        let write = async {
            stream.write_all(data).await?;
            stream.flush().await?;
            stream.shutdown().await
        };
        tokio::time::timeout(self.timeout, write)
            .await
            .map_err(|_| DeliveryError::Timeout(format!("Write timeout: {}", self.addr)))?
            .map_err(|e| {
                DeliveryError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Write failed: {}", e),
                ))
            })?;

        info!("Document sent");
        Ok(())
    }

    #[instrument(skip(self), fields(addr = %self.addr))]
    async fn is_online(&self) -> bool {
        let check_timeout = Duration::from_millis(500);

        match tokio::time::timeout(check_timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }
}

/// Spool directory printer
///
/// Writes each document as `label_<millis>_<uuid>.zpl`. The file is written
/// under a dot-prefixed temporary name and renamed into place, so a watcher
/// never picks up a partial document.
#[derive(Debug, Clone)]
pub struct SpoolDirPrinter {
    dir: PathBuf,
}

impl SpoolDirPrinter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name() -> String {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("label_{}_{}.zpl", millis, uuid::Uuid::new_v4().simple())
    }
}

impl PrintSink for SpoolDirPrinter {
    #[instrument(skip(self, data), fields(dir = %self.dir.display(), data_len = data.len()))]
    async fn deliver(&self, data: &[u8]) -> DeliveryResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = Self::file_name();
        let tmp = self.dir.join(format!(".{}.tmp", name));
        let target = self.dir.join(&name);

        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        info!(file = %name, "Document spooled");
        Ok(())
    }

    async fn is_online(&self) -> bool {
        match tokio::fs::metadata(&self.dir).await {
            Ok(meta) => meta.is_dir() && !meta.permissions().readonly(),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Spool directory unavailable");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_network_printer_new() {
        let printer = NetworkPrinter::new("192.168.1.50", 9100).unwrap();
        assert_eq!(printer.addr().port(), 9100);
    }

    #[test]
    fn test_invalid_addr() {
        let result = NetworkPrinter::from_addr("not-an-address");
        assert!(matches!(result, Err(DeliveryError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_network_printer_delivers_bytes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            socket.read_to_end(&mut received).await.unwrap();
            received
        });

        let printer = NetworkPrinter::from_addr(&addr.to_string())
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        printer.deliver(b"^XA^FDhello^FS^XZ").await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received, b"^XA^FDhello^FS^XZ");
    }

    #[tokio::test]
    async fn test_network_printer_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let printer = NetworkPrinter::from_addr(&addr.to_string())
            .unwrap()
            .with_timeout(Duration::from_secs(1));
        let err = printer.deliver(b"^XA^XZ").await.unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::Connection(_) | DeliveryError::Timeout(_)
        ));
        assert!(!printer.is_online().await);
    }

    #[tokio::test]
    async fn test_spool_printer_writes_one_file_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolDirPrinter::new(dir.path().join("zpl"));

        spool.deliver(b"^XA^FDone^FS^XZ").await.unwrap();
        spool.deliver(b"^XA^FDtwo^FS^XZ").await.unwrap();
        assert!(spool.is_online().await);

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(spool.dir()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            files.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(files.len(), 2);
        assert!(
            files
                .iter()
                .all(|f| f.starts_with("label_") && f.ends_with(".zpl"))
        );
    }

    #[tokio::test]
    async fn test_batch_stops_at_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolDirPrinter::new(dir.path().join("zpl"));
        let sent = spool
            .deliver_batch(&[b"^XA^XZ".as_slice(), b"^XA^XZ".as_slice()])
            .await
            .unwrap();
        assert_eq!(sent, 2);

        let refused = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let printer = Arc::new(
            NetworkPrinter::from_addr(&refused.to_string())
                .unwrap()
                .with_timeout(Duration::from_secs(1)),
        );
        assert!(printer.deliver_batch(&[b"^XA^XZ".as_slice()]).await.is_err());
    }

    #[tokio::test]
    async fn test_spool_printer_offline_when_dir_missing() {
        let dir = tempfile::tempdir().unwrap();
        let spool = SpoolDirPrinter::new(dir.path().join("missing"));
        assert!(!spool.is_online().await);
    }
}
