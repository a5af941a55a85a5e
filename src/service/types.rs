//! Wire and domain types for the agreement service.

use crate::localize::{select_for_language, LocalizedText};
use serde::{Deserialize, Deserializer, Serialize};

/// Shown when the service provides no localized header title.
pub const DEFAULT_TITLE: &str = "Terms of Service";
/// Shown when the service provides no localized accept label.
pub const DEFAULT_ACCEPT_LABEL: &str = "Accept";
/// Shown when the service provides no localized decline label.
pub const DEFAULT_DECLINE_LABEL: &str = "Decline";

/// Envelope around every fetch response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiEnvelope {
    #[serde(default)]
    pub data: Option<RawAgreementPayload>,
}

/// Agreement content exactly as the service sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAgreementPayload {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub title: Option<Vec<LocalizedText>>,
    pub description: Option<Vec<LocalizedText>>,
    pub force: Option<bool>,
    pub agreement_title: Option<Vec<LocalizedText>>,
    pub decline_button_title: Option<Vec<LocalizedText>>,
    pub accept_button_title: Option<Vec<LocalizedText>>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: Option<String>,
    pub sdk_version: Option<String>,
    pub created_at: Option<String>,
}

/// Identifiers and versions arrive as JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(text) => text,
        Scalar::Number(number) => number.to_string(),
    }))
}

impl RawAgreementPayload {
    /// Whether the service has content for this app.
    pub fn has_content(&self) -> bool {
        self.id.is_some()
    }

    /// Resolve every localized field for `language`.
    ///
    /// Returns `None` when the payload carries no `id`.
    pub fn localize(&self, language: &str) -> Option<AgreementDocument> {
        let id = self.id.clone()?;
        let pick = |entries: &Option<Vec<LocalizedText>>| {
            select_for_language(entries.as_deref(), language)
        };

        Some(AgreementDocument {
            id,
            version: self.version.clone(),
            title: pick(&self.title),
            agreement_title: pick(&self.agreement_title),
            body: pick(&self.description),
            accept_label: pick(&self.accept_button_title),
            decline_label: pick(&self.decline_button_title),
            sdk_version: self.sdk_version.clone(),
            created_at: self.created_at.clone(),
        })
    }
}

/// Localized agreement content ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgreementDocument {
    pub id: String,
    pub version: Option<String>,
    pub title: Option<String>,
    pub agreement_title: Option<String>,
    pub body: Option<String>,
    pub accept_label: Option<String>,
    pub decline_label: Option<String>,
    pub sdk_version: Option<String>,
    pub created_at: Option<String>,
}

impl AgreementDocument {
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    pub fn accept_label_or_default(&self) -> &str {
        self.accept_label.as_deref().unwrap_or(DEFAULT_ACCEPT_LABEL)
    }

    pub fn decline_label_or_default(&self) -> &str {
        self.decline_label.as_deref().unwrap_or(DEFAULT_DECLINE_LABEL)
    }
}

/// User action reported to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgreementAction {
    View,
    Accept,
    Decline,
}

impl AgreementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgreementAction::View => "VIEW",
            AgreementAction::Accept => "ACCEPT",
            AgreementAction::Decline => "DECLINE",
        }
    }
}

impl std::fmt::Display for AgreementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identification sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Base URL of the agreement endpoint
    pub route: String,
    pub app_id: String,
    pub app_version: String,
    pub device_id: String,
    /// Version of this library
    pub sdk_version: String,
}

/// Body of an action report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionBody<'a> {
    pub app_id: &'a str,
    pub version: &'a str,
    pub device_id: &'a str,
    pub sdk_version: &'a str,
    pub action: AgreementAction,
}
