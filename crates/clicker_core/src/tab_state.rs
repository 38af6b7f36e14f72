use serde::{Deserialize, Serialize};

use crate::ErrorPayload;

pub type TabId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[default]
    Idle,
    Scanning,
    Analyzing,
    Success,
    NotFound,
    Error,
}

impl ScanStatus {
    /// Success, NotFound and Error end an attempt; a new scan restarts at Scanning.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Success | ScanStatus::NotFound | ScanStatus::Error
        )
    }
}

/// Scan lifecycle state of one tab. `error` is present iff `status` is `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabScanState {
    pub tab_id: TabId,
    pub status: ScanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl TabScanState {
    pub fn idle(tab_id: TabId, url: Option<String>) -> Self {
        Self {
            tab_id,
            status: ScanStatus::Idle,
            url,
            error: None,
        }
    }

    /// Field-wise merge of `patch` onto `self`.
    ///
    /// Fields the patch leaves unset keep their value. A resulting status other
    /// than `Error` drops any error carried over from an earlier transition.
    pub fn merged(&self, patch: &StatePatch) -> Self {
        let status = patch.status.unwrap_or(self.status);
        let url = patch.url.clone().or_else(|| self.url.clone());
        let error = if status == ScanStatus::Error {
            patch.error.clone().or_else(|| self.error.clone())
        } else {
            None
        };
        Self {
            tab_id: self.tab_id,
            status,
            url,
            error,
        }
    }
}

/// Partial update applied by the tab state store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ScanStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

impl StatePatch {
    pub fn status(status: ScanStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(error: ErrorPayload) -> Self {
        Self {
            status: Some(ScanStatus::Error),
            url: None,
            error: Some(error),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}
