use serde::{Deserialize, Serialize};

use crate::StatePatch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEffect {
    /// Push a state transition to the tab state store.
    Publish(StatePatch),
    /// Ask the page for its full document markup.
    ExtractHtml,
    /// Ask the analysis gateway for the accept-control selector.
    Analyze { html: String },
    /// Click the element matched by `selector` in the page.
    Click { selector: String },
    /// Submit a usage record to the analytics sink.
    Record(AnalyticsRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsStatus {
    Success,
    NotFound,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub event: String,
    pub status: AnalyticsStatus,
    pub url: String,
    pub banner_html_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub const EVENT_BANNER_CLICKED: &str = "banner_clicked";
pub const EVENT_BANNER_NOT_FOUND: &str = "banner_not_found";
pub const EVENT_SCAN_FAILED: &str = "scan_failed";
