//! # Netops
//!
//! Async CLI session automation for Cisco-style switches and routers.
//!
//! Netops drives a device's interactive command line the way an operator
//! would: it logs in over whichever transport is reachable, tracks the CLI
//! mode from the prompt, moves between user, privileged and configuration
//! modes as commands require, and turns tabular `show` output into records.
//!
//! ## Features
//!
//! - SSH (russh), Telnet and serial console transports with ordered fallback
//! - Prompt-based mode tracking (`>`, `#`, `(config)#`, `(config-if)#`, ...)
//! - Mode-scoped blocks: `privileged`, `configuration`, `interface`, `lines`
//! - Regex parser tree for structured `show` output
//! - Bounded per-host fan-out for batch runs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netops::{Credentials, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netops::Error> {
//!     let mut session = Session::builder("192.168.1.1").build()?;
//!     session.open(Credentials::new("admin", "secret")).await?;
//!
//!     let version = session.exec("show version").await?;
//!     println!("{}", version);
//!
//!     session
//!         .configuration_and_save(async |s| {
//!             s.set("ip domain-name", "example.net").await?;
//!             Ok(())
//!         })
//!         .await?;
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod channel;
pub mod error;
pub mod logging;
pub mod mode;
pub mod parser;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export main types for convenience
pub use error::Error;
pub use logging::SessionLog;
pub use mode::Mode;
pub use parser::{MatchRecord, ParseOutput, ParserTree};
pub use session::{Session, SessionBuilder, SessionOptions};
pub use transport::{Credentials, HostKeyVerification, TransportKind, TransportOptions};
