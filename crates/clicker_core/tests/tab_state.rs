use clicker_core::{ErrorKind, ErrorPayload, ScanStatus, StatePatch, TabScanState};
use pretty_assertions::assert_eq;

#[test]
fn idle_state_has_no_error() {
    let state = TabScanState::idle(3, Some("https://example.com".to_string()));
    assert_eq!(state.status, ScanStatus::Idle);
    assert_eq!(state.error, None);
    assert_eq!(state.url.as_deref(), Some("https://example.com"));
}

#[test]
fn patches_merge_field_wise_in_order() {
    let patches = vec![
        StatePatch::status(ScanStatus::Scanning).with_url("https://a.example.com"),
        StatePatch::status(ScanStatus::Analyzing),
        StatePatch::failed(ErrorPayload::new(ErrorKind::ClickFailed, "covered")),
    ];

    let merged = patches
        .iter()
        .fold(TabScanState::idle(1, None), |state, patch| state.merged(patch));

    assert_eq!(
        merged,
        TabScanState {
            tab_id: 1,
            status: ScanStatus::Error,
            url: Some("https://a.example.com".to_string()),
            error: Some(ErrorPayload::new(ErrorKind::ClickFailed, "covered")),
        }
    );
}

#[test]
fn leaving_error_drops_the_stale_error() {
    let failed = TabScanState::idle(1, None).merged(&StatePatch::failed(ErrorPayload::new(
        ErrorKind::HtmlFetchFailed,
        "empty",
    )));
    let rescanning = failed.merged(&StatePatch::status(ScanStatus::Scanning));

    assert_eq!(rescanning.status, ScanStatus::Scanning);
    assert_eq!(rescanning.error, None);
}

#[test]
fn wire_format_uses_snake_case_status_and_stable_codes() {
    let state = TabScanState::idle(9, None).merged(&StatePatch::failed(ErrorPayload::new(
        ErrorKind::ConsentRequired,
        "consent",
    )));
    let json = serde_json::to_value(&state).unwrap();

    assert_eq!(json["tab_id"], 9);
    assert_eq!(json["status"], "error");
    assert_eq!(json["error"]["code"], "CONSENT_REQUIRED");
    assert_eq!(
        json["error"]["guidance"],
        ErrorKind::ConsentRequired.user_guidance()
    );
    assert!(json.get("url").is_none());
    assert_eq!(serde_json::from_value::<TabScanState>(json).unwrap(), state);

    let not_found = serde_json::to_value(ScanStatus::NotFound).unwrap();
    assert_eq!(not_found, "not_found");
}

#[test]
fn terminal_statuses() {
    assert!(ScanStatus::Success.is_terminal());
    assert!(ScanStatus::NotFound.is_terminal());
    assert!(ScanStatus::Error.is_terminal());
    assert!(!ScanStatus::Idle.is_terminal());
    assert!(!ScanStatus::Analyzing.is_terminal());
}
