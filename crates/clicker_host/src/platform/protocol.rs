//! Messages exchanged with the extension, tagged by `type`.

use clicker_core::{Settings, TabId, TabScanState, Tier};
use clicker_engine::{Command, Query, Reply, Request, TabEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlates a query with its reply frame.
pub type RequestId = u64;
/// Correlates a page call with its `call_result` frame.
pub type CallId = u64;

/// Settings as edited in the options page; the key arrives in clear.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub consent: Option<bool>,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl From<SettingsForm> for Settings {
    fn from(form: SettingsForm) -> Self {
        Settings::new(form.tier, form.consent, form.api_key.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Incoming {
    /// Sent once per connection; `session_id` changes when the browser
    /// restarts.
    SessionStarted {
        session_id: String,
    },
    StartScan,
    OpenSettings,
    SaveSettings {
        settings: SettingsForm,
    },
    GetStatus {
        id: RequestId,
        #[serde(default)]
        sender_tab: Option<TabId>,
    },
    TestCredential {
        id: RequestId,
        candidate: String,
    },
    TabNavigated {
        tab_id: TabId,
    },
    TabClosed {
        tab_id: TabId,
    },
    CallResult {
        call_id: CallId,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        error: Option<String>,
    },
}

/// Where an incoming message goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Session(String),
    Router {
        id: Option<RequestId>,
        request: Request,
    },
    Tab(TabEvent),
    CallResult {
        call_id: CallId,
        result: Result<Value, String>,
    },
}

impl Incoming {
    pub fn route(self) -> Route {
        match self {
            Incoming::SessionStarted { session_id } => Route::Session(session_id),
            Incoming::StartScan => command(Command::StartScan),
            Incoming::OpenSettings => command(Command::OpenSettings),
            Incoming::SaveSettings { settings } => command(Command::SaveSettings(settings.into())),
            Incoming::GetStatus { id, sender_tab } => Route::Router {
                id: Some(id),
                request: Request::Query(Query::GetStatus { sender_tab }),
            },
            Incoming::TestCredential { id, candidate } => Route::Router {
                id: Some(id),
                request: Request::Query(Query::TestCredential { candidate }),
            },
            Incoming::TabNavigated { tab_id } => Route::Tab(TabEvent::NavigationStarted(tab_id)),
            Incoming::TabClosed { tab_id } => Route::Tab(TabEvent::Closed(tab_id)),
            Incoming::CallResult {
                call_id,
                value,
                error,
            } => Route::CallResult {
                call_id,
                result: match error {
                    Some(error) => Err(error),
                    None => Ok(value),
                },
            },
        }
    }
}

fn command(command: Command) -> Route {
    Route::Router {
        id: None,
        request: Request::Command(command),
    }
}

/// Work the host asks the extension to do in a tab or the browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum PageCall {
    ExtractHtml {
        tab_id: TabId,
        source: &'static str,
    },
    RunScript {
        tab_id: TabId,
        name: &'static str,
        source: &'static str,
        args: Value,
    },
    ActiveTab,
    OpenOptionsPage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outgoing {
    Reply {
        id: RequestId,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply: Option<Reply>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    StatusUpdate {
        state: TabScanState,
    },
    Call {
        call_id: CallId,
        request: PageCall,
    },
}
