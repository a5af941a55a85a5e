//! The agreement controller.
//!
//! Drives one agreement cycle at a time:
//!
//! ```text
//! Initial ──fetch──▶ ShowView ──accept/decline──▶ Initial
//!    │                  │
//!    │                  └─(background VIEW report)─▶ ActionAccepted | ActionError
//!    ├──fetch──▶ NoContent
//!    └──fetch──▶ FetchError
//! ```
//!
//! State and dialog visibility are published on `watch` channels, so a
//! subscriber always sees the latest value. The dismiss signal is a
//! separate queue because it must not be coalesced.

use super::state::ControllerState;
use crate::config::AgreementConfig;
use crate::identity::DeviceIdentity;
use crate::service::{AgreementAction, AgreementDocument, AgreementService, ApiError, RequestContext};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to an agreement controller. Clones share the same state.
#[derive(Clone)]
pub struct AgreementController {
    inner: Arc<Inner>,
}

struct Inner {
    service: Arc<dyn AgreementService>,
    identity: Arc<dyn DeviceIdentity>,
    config: Mutex<Option<AgreementConfig>>,
    /// Content item the next action is reported against
    item_id: Mutex<Option<String>>,
    document: Mutex<Option<AgreementDocument>>,
    state: watch::Sender<ControllerState>,
    dialog: watch::Sender<bool>,
    dismiss_tx: Sender<()>,
    dismiss_rx: Receiver<()>,
    /// Background action reports still running
    reports: Mutex<Vec<JoinHandle<()>>>,
    /// Bumped on every reset; reports from an earlier cycle are dropped
    cycle: AtomicU64,
    disposed: AtomicBool,
}

impl AgreementController {
    /// Create a controller with no configuration.
    pub fn new(service: Arc<dyn AgreementService>, identity: Arc<dyn DeviceIdentity>) -> Self {
        let (state, _) = watch::channel(ControllerState::Initial);
        let (dialog, _) = watch::channel(false);
        let (dismiss_tx, dismiss_rx) = unbounded();

        Self {
            inner: Arc::new(Inner {
                service,
                identity,
                config: Mutex::new(None),
                item_id: Mutex::new(None),
                document: Mutex::new(None),
                state,
                dialog,
                dismiss_tx,
                dismiss_rx,
                reports: Mutex::new(Vec::new()),
                cycle: AtomicU64::new(0),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a controller and apply `config`.
    pub fn with_config(
        service: Arc<dyn AgreementService>,
        identity: Arc<dyn DeviceIdentity>,
        config: AgreementConfig,
    ) -> Self {
        let controller = Self::new(service, identity);
        controller.set_config(config);
        controller
    }

    pub fn set_config(&self, config: AgreementConfig) {
        *self.inner.config.lock() = Some(config);
    }

    pub fn config(&self) -> Option<AgreementConfig> {
        self.inner.config.lock().clone()
    }

    /// Current state.
    pub fn state(&self) -> ControllerState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes. The receiver starts at the current value.
    pub fn subscribe_state(&self) -> watch::Receiver<ControllerState> {
        self.inner.state.subscribe()
    }

    pub fn dialog_visible(&self) -> bool {
        *self.inner.dialog.borrow()
    }

    pub fn subscribe_dialog(&self) -> watch::Receiver<bool> {
        self.inner.dialog.subscribe()
    }

    /// Queue of dismiss signals, one per decline.
    pub fn dismiss_events(&self) -> Receiver<()> {
        self.inner.dismiss_rx.clone()
    }

    /// The document of the current cycle, kept while action reports
    /// replace the `ShowView` state.
    pub fn document(&self) -> Option<AgreementDocument> {
        self.inner.document.lock().clone()
    }

    /// Fetch the configured agreement and publish the outcome.
    ///
    /// Does nothing when no configuration is set.
    pub async fn fetch(&self) {
        let Some((ctx, content_name, language)) = self.inner.fetch_params().await else {
            debug!("Fetch ignored: no request context");
            return;
        };

        match self.inner.service.fetch_document(&ctx, &content_name).await {
            Ok(payload) => match payload.localize(&language) {
                Some(document) => {
                    info!(id = %document.id, language = %language, "Agreement document fetched");
                    let item_id = document.id.clone();
                    *self.inner.item_id.lock() = Some(item_id.clone());
                    *self.inner.document.lock() = Some(document.clone());
                    self.inner.publish(ControllerState::ShowView(document));
                    self.spawn_report(ctx, item_id, AgreementAction::View);
                }
                None => {
                    info!(name = %content_name, "No agreement content available");
                    self.inner.publish(ControllerState::NoContent);
                }
            },
            Err(e) => {
                warn!(error = %e, "Failed to fetch agreement");
                self.inner.publish(ControllerState::FetchError(e));
            }
        }
    }

    /// Make the dialog visible. Called by the view once it observes
    /// `ShowView`.
    pub fn show_dialog(&self) {
        if self.inner.is_disposed() {
            return;
        }
        self.inner.dialog.send_replace(true);
    }

    /// The user accepted. Hides the dialog, reports `ACCEPT` and resets.
    ///
    /// The state is `Initial` when this returns, whatever the report outcome.
    pub async fn accept_action(&self) -> Result<(), ApiError> {
        self.hide_dialog();
        self.report_and_reset(AgreementAction::Accept).await
    }

    /// The user declined. Hides the dialog, emits one dismiss signal,
    /// reports `DECLINE` and resets.
    pub async fn decline_action(&self) -> Result<(), ApiError> {
        self.hide_dialog();
        if !self.inner.is_disposed() {
            // The controller holds a receiver, so the queue never disconnects.
            let _ = self.inner.dismiss_tx.send(());
        }
        self.report_and_reset(AgreementAction::Decline).await
    }

    /// Wait for all background action reports to finish.
    pub async fn flush_reports(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.reports.lock());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Action report task failed");
            }
        }
    }

    /// Stop publishing. In-flight requests still complete but their
    /// results are discarded.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
    }

    fn hide_dialog(&self) {
        if !self.inner.is_disposed() {
            self.inner.dialog.send_replace(false);
        }
    }

    fn spawn_report(&self, ctx: RequestContext, item_id: String, action: AgreementAction) {
        let inner = Arc::clone(&self.inner);
        let cycle = inner.cycle.load(Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let result = inner.service.submit_action(&ctx, &item_id, action).await;
            if inner.cycle.load(Ordering::SeqCst) != cycle {
                debug!(%action, "Dropping report result from a finished cycle");
                return;
            }
            inner.publish(outcome_state(action, result));
        });

        let mut reports = self.inner.reports.lock();
        reports.retain(|h| !h.is_finished());
        reports.push(handle);
    }

    async fn report_and_reset(&self, action: AgreementAction) -> Result<(), ApiError> {
        let item_id = self.inner.item_id.lock().clone();
        let ctx = self.inner.request_context().await;

        let result = match (item_id, ctx) {
            (Some(item_id), Some(ctx)) => {
                let result = self.inner.service.submit_action(&ctx, &item_id, action).await;
                self.inner.publish(outcome_state(action, result.clone()));
                result
            }
            _ => {
                debug!(%action, "No active agreement, action not reported");
                Ok(())
            }
        };

        self.inner.reset();
        result
    }
}

impl Inner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn publish(&self, state: ControllerState) {
        if self.is_disposed() {
            debug!(state = %state, "Controller disposed, state not published");
            return;
        }
        debug!(state = %state, "State transition");
        self.state.send_replace(state);
    }

    fn reset(&self) {
        self.cycle.fetch_add(1, Ordering::SeqCst);
        *self.item_id.lock() = None;
        *self.document.lock() = None;
        self.publish(ControllerState::Initial);
    }

    /// Request context, assigning the device id on first use.
    ///
    /// The identity lookup may touch the filesystem, so it runs on the
    /// blocking pool without the config lock held.
    async fn request_context(&self) -> Option<RequestContext> {
        let assigned = self.config.lock().as_ref()?.device_id.clone();
        let device_id = match assigned {
            Some(id) => id,
            None => {
                let identity = Arc::clone(&self.identity);
                match tokio::task::spawn_blocking(move || identity.get_or_create()).await {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(error = %e, "Device identity lookup failed");
                        return None;
                    }
                }
            }
        };

        let mut guard = self.config.lock();
        let config = guard.as_mut()?;
        if config.device_id.is_none() {
            debug!("Assigned device identifier");
        }
        let device_id = config.device_id.get_or_insert(device_id).clone();

        Some(RequestContext {
            route: config.service_route.clone(),
            app_id: config.app_id.clone(),
            app_version: config.app_version.clone(),
            device_id,
            sdk_version: crate::VERSION.to_string(),
        })
    }

    async fn fetch_params(&self) -> Option<(RequestContext, String, String)> {
        let ctx = self.request_context().await?;
        let guard = self.config.lock();
        let config = guard.as_ref()?;
        Some((ctx, config.content_name.clone(), config.language_tag.clone()))
    }
}

fn outcome_state(action: AgreementAction, result: Result<(), ApiError>) -> ControllerState {
    match result {
        Ok(()) => ControllerState::ActionAccepted(action),
        Err(e) => {
            warn!(%action, error = %e, "Failed to report agreement action");
            ControllerState::ActionError(e)
        }
    }
}
