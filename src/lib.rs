//! ClassCraft client
//!
//! Uploads student roster CSV files to a ClassCraft service, either to have
//! students sorted into classes or to have MAP scores added, tracks upload
//! progress, and fetches the generated file.

pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod form;
pub mod progress;
pub mod session;
pub mod status;
pub mod view;

// Re-export main types for easy access
pub use crate::client::{ClassCraftApi, HttpClient, ServerResponse};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::download::{DownloadedFile, Downloader};
pub use crate::error::{ClientError, FailureKind, Result};
pub use crate::form::{ClassCount, SelectedFile};
pub use crate::progress::{Progress, ProgressReporter, UploadProgress};
pub use crate::session::{Session, SessionEvent, SessionState};
pub use crate::status::{DownloadOffer, Flow, StatusMessage};
pub use crate::view::TerminalView;
