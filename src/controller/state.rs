//! Observable controller state.

use crate::service::{AgreementAction, AgreementDocument, ApiError};

/// What the view layer should currently reflect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ControllerState {
    /// Nothing fetched yet, or the last cycle finished
    #[default]
    Initial,
    /// The service has no agreement for this app
    NoContent,
    /// A document is ready to be shown
    ShowView(AgreementDocument),
    /// The service acknowledged an action
    ActionAccepted(AgreementAction),
    /// An action report failed
    ActionError(ApiError),
    /// Fetching the document failed
    FetchError(ApiError),
}

impl ControllerState {
    pub fn name(&self) -> &'static str {
        match self {
            ControllerState::Initial => "initial",
            ControllerState::NoContent => "no_content",
            ControllerState::ShowView(_) => "show_view",
            ControllerState::ActionAccepted(_) => "action_accepted",
            ControllerState::ActionError(_) => "action_error",
            ControllerState::FetchError(_) => "fetch_error",
        }
    }

    pub fn document(&self) -> Option<&AgreementDocument> {
        match self {
            ControllerState::ShowView(document) => Some(document),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            ControllerState::ActionError(e) | ControllerState::FetchError(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerState::ShowView(document) => write!(f, "show_view({})", document.id),
            ControllerState::ActionAccepted(action) => write!(f, "action_accepted({action})"),
            ControllerState::ActionError(e) => write!(f, "action_error({e})"),
            ControllerState::FetchError(e) => write!(f, "fetch_error({e})"),
            other => f.write_str(other.name()),
        }
    }
}
