//! # label-printer
//!
//! ZPL label printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ZPL command building with field sanitisation
//! - Network printing (raw TCP, port 9100)
//! - Spool-directory printing (files picked up by a spooler or printer share)
//!
//! WHAT to print (the label layout, which jobs to send and how outcomes are
//! recorded) stays in label-server.
//!
//! ## Example
//!
//! ```ignore
//! use label_printer::{NetworkPrinter, Orientation, PrintSink, ZplBuilder};
//!
//! let mut zpl = ZplBuilder::new();
//! zpl.print_width(812).label_length(609);
//! zpl.field_typeset(295, 569).font(Orientation::Bottom, 34, 33).text("H12345");
//! let document = zpl.build();
//!
//! let printer = NetworkPrinter::from_addr("192.168.1.50:9100")?;
//! printer.deliver(document.as_bytes()).await?;
//! ```

mod error;
mod printer;
mod zpl;

// Re-exports
pub use error::{DeliveryError, DeliveryResult};
pub use printer::{NetworkPrinter, PrintSink, SpoolDirPrinter};
pub use zpl::{Orientation, ZplBuilder, sanitize_field};
