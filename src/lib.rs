//! Typed access to keys and encrypted files through the `gpg` command-line
//! tool.
//!
//! This crate runs `gpg` as a subprocess, parses its `--with-colons` key
//! listings and `--list-packets` dumps into Rust types, and drives
//! encryption, decryption, import and export.
//!
//! # Example
//!
//! ```no_run
//! use gpg_cli::{Config, Gpg};
//!
//! #[tokio::main]
//! async fn main() -> gpg_cli::Result<()> {
//!     let gpg = Gpg::new(Config::default());
//!
//!     let keys = gpg.list_public_keys().await?;
//!     for key in keys.iter() {
//!         println!("{key}");
//!     }
//!
//!     let recipients = gpg.recipients("secret.gpg").await?;
//!     println!("encrypted for {}", recipients.join(", "));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Requirements
//!
//! - `gpg2`, `gpg1` or `gpg` on `PATH`, or an explicit [`Config::binary`]
//! - The parsers ([`parse_colons`], [`parse_recipients`]) need no gpg at all

mod cache;
mod config;
mod error;
mod gpg;
mod packet;
mod parse;
mod runner;
mod types;
mod validation;

pub use cache::KeyCache;
pub use config::{Config, DEFAULT_ARGS};
pub use error::{Error, Result};
pub use gpg::Gpg;
pub use packet::{PUBKEY_ENC_PACKET, parse_recipients, split_packet};
pub use parse::parse_colons;
pub use runner::{Invocation, ProcessRunner, RunOutput, Runner};
pub use types::{Algorithm, Capabilities, Identity, Key, KeyKind, KeyList, Validity};
pub use validation::{normalize_keyid, validate_selector};
