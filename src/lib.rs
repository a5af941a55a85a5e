//! Agreement Kit - fetch, present and acknowledge terms-of-service agreements.
//!
//! This library drives the client side of an agreement flow: it fetches the
//! agreement document for an app from a remote service, localizes it, exposes
//! it to a view layer through an observable state machine, and reports what
//! the user did with it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Agreement Kit                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐      │
//! │  │  Controller  │──▶│   Service    │──▶│     HTTP     │      │
//! │  │ (state/flag) │   │  (get/post)  │   │   (retry)    │      │
//! │  └──────────────┘   └──────────────┘   └──────────────┘      │
//! │     │       │                                                 │
//! │     ▼       ▼                                                 │
//! │  ┌──────────────┐   ┌──────────────┐                          │
//! │  │   Identity   │   │   Localize   │                          │
//! │  │ (device id)  │   │ (lang pick)  │                          │
//! │  └──────────────┘   └──────────────┘                          │
//! └──────────────────────────────────────────────────────────────┘
//!            ▲ state / dialog / dismiss        │ gestures
//!            └──────────── view layer ◀────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use agreement_kit::{
//!     AgreementClient, AgreementConfig, AgreementController, FileIdentityStore, HttpClient,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgreementConfig::new("https://example.com/api/agreements", "app-id", "1.0.0", "Privacy");
//! let client = AgreementClient::new(HttpClient::new(config.http_config())?);
//! let controller = AgreementController::with_config(
//!     Arc::new(client),
//!     Arc::new(FileIdentityStore::new()),
//!     config,
//! );
//!
//! controller.fetch().await;
//! if let Some(document) = controller.document() {
//!     controller.show_dialog();
//!     println!("{}", document.title_or_default());
//!     controller.accept_action().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod http;
pub mod identity;
pub mod localize;
pub mod service;

// Re-export key types at crate root for convenience
pub use config::{AgreementConfig, ConfigError};
pub use controller::{AgreementController, ControllerState};
pub use http::{HttpClient, HttpConfig, HttpRequest, HttpResponse, TransportError};
pub use identity::{DeviceIdentity, FileIdentityStore, FixedIdentity, IdentityError};
pub use localize::{select_for_language, LocalizedText};
pub use service::{
    AgreementAction, AgreementClient, AgreementDocument, AgreementService, ApiError, ApiErrorKind,
    RawAgreementPayload, RequestContext,
};

/// Library version, reported to the service as `sdkVersion`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
