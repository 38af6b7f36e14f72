use url::Url;

use crate::text::MAX_SNIPPET_CHARS;
use crate::{ErrorPayload, ScanStatus, TabId};

/// Result of one end-to-end scan attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Clicked(String),
    NotFound,
    Failed(ErrorPayload),
}

impl ScanOutcome {
    pub fn status(&self) -> ScanStatus {
        match self {
            ScanOutcome::Clicked(_) => ScanStatus::Success,
            ScanOutcome::NotFound => ScanStatus::NotFound,
            ScanOutcome::Failed(_) => ScanStatus::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPhase {
    Ready,
    Extracting,
    Analyzing,
    Clicking { selector: String },
    Finished(ScanOutcome),
}

/// Per-attempt scan state driven by [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMachine {
    tab_id: TabId,
    url: String,
    phase: ScanPhase,
    html_context: String,
    snippet_limit: usize,
}

impl ScanMachine {
    pub fn new(tab_id: TabId, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            url: url.into(),
            phase: ScanPhase::Ready,
            html_context: String::new(),
            snippet_limit: MAX_SNIPPET_CHARS,
        }
    }

    /// Overrides how many characters of markup are kept for analytics.
    pub fn with_snippet_limit(mut self, limit: usize) -> Self {
        self.snippet_limit = limit;
        self
    }

    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn phase(&self) -> &ScanPhase {
        &self.phase
    }

    /// Bounded excerpt of the page markup attached to analytics records.
    pub fn html_context(&self) -> &str {
        &self.html_context
    }

    pub fn outcome(&self) -> Option<&ScanOutcome> {
        match &self.phase {
            ScanPhase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, ScanPhase::Finished(_))
    }

    pub(crate) fn snippet_limit(&self) -> usize {
        self.snippet_limit
    }

    pub(crate) fn set_phase(&mut self, phase: ScanPhase) {
        self.phase = phase;
    }

    pub(crate) fn set_html_context(&mut self, context: String) {
        self.html_context = context;
    }
}

/// Only documents served over http(s) can be read and clicked by the page
/// collaborator; browser-internal and extension pages are off limits.
pub fn is_scannable_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}
