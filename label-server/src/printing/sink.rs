//! Printer sink selected at startup

use label_printer::{DeliveryResult, NetworkPrinter, PrintSink, SpoolDirPrinter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Where rendered documents are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterMode {
    /// Raw TCP to a ZPL printer
    Network,
    /// One file per document in a spool directory
    Spool,
}

impl FromStr for PrinterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" | "tcp" => Ok(Self::Network),
            "spool" | "file" => Ok(Self::Spool),
            other => Err(format!("unknown printer mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfiguredSink {
    Network(NetworkPrinter),
    Spool(SpoolDirPrinter),
}

impl ConfiguredSink {
    pub fn network(addr: &str, timeout: Duration) -> DeliveryResult<Self> {
        Ok(Self::Network(NetworkPrinter::from_addr(addr)?.with_timeout(timeout)))
    }

    pub fn spool(dir: impl Into<PathBuf>) -> Self {
        Self::Spool(SpoolDirPrinter::new(dir))
    }

    /// Human-readable target for health output
    pub fn describe(&self) -> String {
        match self {
            Self::Network(p) => format!("tcp://{}", p.addr()),
            Self::Spool(p) => format!("spool://{}", p.dir().display()),
        }
    }
}

impl PrintSink for ConfiguredSink {
    async fn deliver(&self, data: &[u8]) -> DeliveryResult<()> {
        match self {
            Self::Network(p) => p.deliver(data).await,
            Self::Spool(p) => p.deliver(data).await,
        }
    }

    async fn is_online(&self) -> bool {
        match self {
            Self::Network(p) => p.is_online().await,
            Self::Spool(p) => p.is_online().await,
        }
    }
}
