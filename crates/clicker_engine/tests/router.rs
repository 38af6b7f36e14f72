mod common;

use clicker_core::{ErrorKind, ScanStatus, Settings, Tier};
use clicker_engine::{ActiveTab, Command, Dispatch, Query, Reply, Request, SettingsStore};
use pretty_assertions::assert_eq;
use serde_json::json;

use common::{init_logging, test_engine, FakePage, TestEngine};

const URL: &str = "https://recipes.example.net/soup";
const PAGE: &str = "<html><body><button id=\"agree\">Agree</button></body></html>";

fn active() -> Option<ActiveTab> {
    Some(ActiveTab {
        id: 77,
        url: URL.to_string(),
    })
}

fn byok() -> Settings {
    Settings::new(Tier::Byok, None, Some("sk-test"))
}

async fn command(rig: &TestEngine, command: Command) {
    match rig.engine.router.dispatch(Request::Command(command)) {
        Dispatch::Accepted(handle) => handle.await.unwrap(),
        Dispatch::Deferred(_) => panic!("commands are not answered"),
    }
}

async fn query(rig: &TestEngine, query: Query) -> Reply {
    match rig.engine.router.dispatch(Request::Query(query)) {
        Dispatch::Deferred(reply) => reply.await.unwrap(),
        Dispatch::Accepted(_) => panic!("queries are answered"),
    }
}

#[tokio::test]
async fn start_scan_runs_on_the_active_tab() {
    init_logging();
    let rig = test_engine(
        byok(),
        FakePage::with_html(PAGE),
        active(),
        r##"{"selector": "#agree"}"##,
    );

    command(&rig, Command::StartScan).await;

    let state = rig.engine.store.get(77, None).await;
    assert_eq!(state.status, ScanStatus::Success);
    assert_eq!(rig.page.click_calls(), 1);
}

#[tokio::test]
async fn start_scan_without_active_tab_does_nothing() {
    init_logging();
    let rig = test_engine(byok(), FakePage::with_html(PAGE), None, "{}");

    command(&rig, Command::StartScan).await;

    assert_eq!(rig.page.extract_calls(), 0);
    assert!(rig.analytics.take().is_empty());
}

#[tokio::test]
async fn status_of_the_sender_tab() {
    init_logging();
    let rig = test_engine(byok(), FakePage::with_html(PAGE), active(), "{}");

    let reply = query(&rig, Query::GetStatus { sender_tab: Some(5) }).await;

    match reply {
        Reply::Status { state } => {
            assert_eq!(state.tab_id, 5);
            assert_eq!(state.status, ScanStatus::Idle);
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn status_falls_back_to_the_active_tab() {
    init_logging();
    let rig = test_engine(byok(), FakePage::with_html(PAGE), active(), "{}");

    let reply = query(&rig, Query::GetStatus { sender_tab: None }).await;

    match reply {
        Reply::Status { state } => {
            assert_eq!(state.tab_id, 77);
            assert_eq!(state.url.as_deref(), Some(URL));
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn status_without_any_tab() {
    init_logging();
    let rig = test_engine(byok(), FakePage::with_html(PAGE), None, "{}");

    let reply = query(&rig, Query::GetStatus { sender_tab: None }).await;

    assert_eq!(reply, Reply::NoActiveTab);
}

#[tokio::test]
async fn failed_scan_is_visible_to_status_queries() {
    init_logging();
    let rig = test_engine(
        Settings::new(Tier::Byok, None, None),
        FakePage::with_html(PAGE),
        active(),
        "{}",
    );

    command(&rig, Command::StartScan).await;
    let reply = query(&rig, Query::GetStatus { sender_tab: None }).await;

    match reply {
        Reply::Status { state } => {
            assert_eq!(state.status, ScanStatus::Error);
            assert_eq!(
                state.error.map(|error| error.code),
                Some(ErrorKind::CredentialInvalid)
            );
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[tokio::test]
async fn save_settings_writes_through_and_invalidates() {
    init_logging();
    let rig = test_engine(byok(), FakePage::with_html(PAGE), active(), "{}");
    rig.engine.credentials.get_client().await.unwrap();
    assert!(rig.engine.credentials.cached_signature().is_some());

    let next = Settings::new(Tier::Free, Some(true), None);
    command(&rig, Command::SaveSettings(next.clone())).await;

    assert_eq!(rig.settings.snapshot(), next);
    assert_eq!(rig.engine.credentials.cached_signature(), None);
}

#[tokio::test]
async fn open_settings_opens_the_page() {
    init_logging();
    let rig = test_engine(byok(), FakePage::with_html(PAGE), active(), "{}");

    command(&rig, Command::OpenSettings).await;

    assert_eq!(rig.settings_page.opened(), 1);
}

#[tokio::test]
async fn test_credential_replies_with_payload() {
    init_logging();
    let rig = test_engine(byok(), FakePage::with_html(PAGE), active(), "{}");

    let accepted = query(
        &rig,
        Query::TestCredential {
            candidate: "sk-candidate".to_string(),
        },
    )
    .await;
    let rejected = query(
        &rig,
        Query::TestCredential {
            candidate: String::new(),
        },
    )
    .await;

    assert_eq!(
        accepted,
        Reply::CredentialCheck {
            ok: true,
            error: None
        }
    );
    match rejected {
        Reply::CredentialCheck { ok, error } => {
            assert!(!ok);
            assert_eq!(error.map(|error| error.code), Some(ErrorKind::CredentialInvalid));
        }
        other => panic!("unexpected reply {other:?}"),
    }
}

#[test]
fn replies_serialize_with_a_kind_tag() {
    assert_eq!(
        serde_json::to_value(Reply::NoActiveTab).unwrap(),
        json!({ "kind": "no_active_tab" })
    );
    assert_eq!(
        serde_json::to_value(Reply::CredentialCheck {
            ok: true,
            error: None
        })
        .unwrap(),
        json!({ "kind": "credential_check", "ok": true })
    );
}
