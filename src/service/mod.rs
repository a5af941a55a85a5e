//! Access to the remote agreement service.
//!
//! [`AgreementService`] is the seam the controller talks to;
//! [`AgreementClient`] implements it over HTTP.

pub mod client;
pub mod types;

pub use client::{AgreementClient, AgreementService, ApiError, ApiErrorKind};
pub use types::{
    AgreementAction, AgreementDocument, ApiEnvelope, RawAgreementPayload, RequestContext,
    DEFAULT_ACCEPT_LABEL, DEFAULT_DECLINE_LABEL, DEFAULT_TITLE,
};
