//! # Satchel
//!
//! A submission reliability layer for survey-style forms. Satchel persists
//! every submission to disk before the first network attempt and retries
//! transient failures with jittered exponential backoff. Recent failures are
//! re-driven on the next startup, so a flaky connection or a killed process
//! never silently loses a response.
//!
//! The remote collector is treated as a write-only sink: it never
//! acknowledges payloads, so delivery is judged by whether the HTTP exchange
//! completed at all. Satchel can be embedded in desktop apps, kiosks, or
//! custom services, or driven from the command line via the companion
//! `satchel-cli` crate.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use satchel::{
//!     CollectorClient, PendingStore, Selection, SubmitConfig, Submitter,
//!     SubmissionRequest,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> satchel::Result<()> {
//! let config = SubmitConfig {
//!     endpoint: Some("https://collector.example.com/ingest".to_string()),
//!     ..SubmitConfig::default()
//! };
//!
//! let store = Arc::new(PendingStore::open(&config.data_dir));
//! let transport = Arc::new(CollectorClient::from_config(&config)?);
//! let submitter = Submitter::new(store, transport, config);
//!
//! let request = SubmissionRequest::new(
//!     "Avery Quinn",
//!     "Operations",
//!     vec![Selection {
//!         course: "Incident response".to_string(),
//!         reason: "On-call rotation starts next quarter".to_string(),
//!     }],
//!     "",
//!     &satchel::session_id(),
//!     "my-app/1.0",
//! )?;
//!
//! let receipt = submitter.submit(request).await?;
//! println!("delivered {} after {} attempt(s)", receipt.id, receipt.attempts);
//! # Ok(())
//! # }
//! ```
//!
//! ## Recovering after a crash
//!
//! ```rust,no_run
//! use satchel::Recovery;
//! # use std::sync::Arc;
//! # use satchel::{CollectorClient, PendingStore, SubmitConfig, Submitter};
//!
//! # #[tokio::main]
//! # async fn main() -> satchel::Result<()> {
//! # let config = SubmitConfig::from_env();
//! # let store = Arc::new(PendingStore::open(&config.data_dir));
//! # let transport = Arc::new(CollectorClient::from_config(&config)?);
//! # let submitter = Submitter::new(store, transport, config);
//! let mut recovery = Recovery::new(&submitter);
//! let report = recovery.sweep().await;
//! println!("recovered {} submission(s)", report.recovered.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod recovery;
pub mod store;
pub mod submitter;
pub mod transport;
pub mod types;

pub use config::SubmitConfig;
pub use error::{Result, SatchelError};
pub use guard::{RateLimiter, SubmissionGuard};
pub use recovery::{Recovery, SweepReport};
pub use store::PendingStore;
pub use submitter::{ProgressFn, Submitter};
pub use transport::{backoff_delay, AttemptOutcome, CollectorClient, Transport};
pub use types::{
    session_id, submission_id, PendingSubmission, Selection, SubmissionPayload,
    SubmissionReceipt, SubmissionRequest, SubmissionStatus, MAX_SELECTION,
};
