use std::sync::Once;

use clicker_core::{
    update, AnalyticsStatus, ClickReport, ErrorKind, ErrorPayload, ScanEffect, ScanMachine,
    ScanMsg, ScanOutcome, ScanPhase, ScanStatus, StatePatch, EMPTY_PAGE_MESSAGE,
    GENERIC_FAILURE_MESSAGE,
};
use pretty_assertions::assert_eq;

const URL: &str = "https://news.example.com/article";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(clicker_logging::initialize_for_tests);
}

fn started() -> ScanMachine {
    let (machine, _) = update(ScanMachine::new(7, URL), ScanMsg::Start);
    machine
}

fn analyzing(html: &str) -> ScanMachine {
    let (machine, _) = update(started(), ScanMsg::HtmlExtracted(Some(html.to_string())));
    machine
}

fn records(effects: &[ScanEffect]) -> Vec<&clicker_core::AnalyticsRecord> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            ScanEffect::Record(record) => Some(record),
            _ => None,
        })
        .collect()
}

#[test]
fn start_publishes_scanning_before_extraction() {
    init_logging();
    let (machine, effects) = update(ScanMachine::new(7, URL), ScanMsg::Start);

    assert_eq!(machine.phase(), &ScanPhase::Extracting);
    assert_eq!(
        effects,
        vec![
            ScanEffect::Publish(StatePatch::status(ScanStatus::Scanning).with_url(URL)),
            ScanEffect::ExtractHtml,
        ]
    );
}

#[test]
fn restricted_page_fails_without_extraction() {
    init_logging();
    let (machine, effects) = update(ScanMachine::new(1, "chrome://settings"), ScanMsg::Start);

    assert!(machine.is_finished());
    assert!(!effects.contains(&ScanEffect::ExtractHtml));
    match machine.outcome() {
        Some(ScanOutcome::Failed(error)) => assert_eq!(error.code, ErrorKind::HtmlFetchFailed),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(records(&effects).len(), 1);
}

#[test]
fn missing_markup_fails_and_never_analyzes() {
    init_logging();
    for html in [None, Some(String::new()), Some("  \n ".to_string())] {
        let (machine, effects) = update(started(), ScanMsg::HtmlExtracted(html));

        assert!(effects
            .iter()
            .all(|effect| !matches!(effect, ScanEffect::Analyze { .. })));
        assert_eq!(
            machine.outcome(),
            Some(&ScanOutcome::Failed(ErrorPayload::new(
                ErrorKind::HtmlFetchFailed,
                EMPTY_PAGE_MESSAGE
            )))
        );
        assert_eq!(
            effects[0],
            ScanEffect::Publish(StatePatch::failed(ErrorPayload::new(
                ErrorKind::HtmlFetchFailed,
                EMPTY_PAGE_MESSAGE
            )))
        );
    }
}

#[test]
fn markup_moves_to_analyzing_with_full_html() {
    init_logging();
    let html = "<html><body><div id=\"cookie\">ok</div></body></html>";
    let (machine, effects) = update(started(), ScanMsg::HtmlExtracted(Some(html.to_string())));

    assert_eq!(machine.phase(), &ScanPhase::Analyzing);
    assert_eq!(machine.html_context(), html);
    assert_eq!(
        effects,
        vec![
            ScanEffect::Publish(StatePatch::status(ScanStatus::Analyzing)),
            ScanEffect::Analyze {
                html: html.to_string()
            },
        ]
    );
}

#[test]
fn analytics_snippet_is_bounded() {
    init_logging();
    let html = "x".repeat(500);
    let machine = ScanMachine::new(7, URL).with_snippet_limit(64);
    let (machine, _) = update(machine, ScanMsg::Start);
    let (machine, _) = update(machine, ScanMsg::HtmlExtracted(Some(html)));
    let (_, effects) = update(machine, ScanMsg::AnalysisFinished(Ok(None)));

    let record = records(&effects)[0];
    assert_eq!(record.banner_html_context.len(), 64);
}

#[test]
fn gateway_failure_is_propagated_with_record() {
    init_logging();
    let error = ErrorPayload::new(ErrorKind::ConsentRequired, "consent missing");
    let (machine, effects) = update(
        analyzing("<html/>"),
        ScanMsg::AnalysisFinished(Err(error.clone())),
    );

    assert_eq!(machine.outcome(), Some(&ScanOutcome::Failed(error.clone())));
    assert_eq!(effects[0], ScanEffect::Publish(StatePatch::failed(error)));
    let record = records(&effects)[0];
    assert_eq!(record.status, AnalyticsStatus::Error);
    assert_eq!(record.banner_html_context, "<html/>");
    assert!(record.reason.as_deref().unwrap().contains("consent missing"));
}

#[test]
fn no_selector_is_not_found_not_a_fault() {
    init_logging();
    let (machine, effects) = update(analyzing("<html/>"), ScanMsg::AnalysisFinished(Ok(None)));

    assert_eq!(machine.outcome(), Some(&ScanOutcome::NotFound));
    assert_eq!(
        effects[0],
        ScanEffect::Publish(StatePatch::status(ScanStatus::NotFound))
    );
    let record = records(&effects)[0];
    assert_eq!(record.status, AnalyticsStatus::NotFound);
    assert_eq!(record.url, URL);
    assert_eq!(record.selector, None);
}

#[test]
fn selector_requests_click_then_success() {
    init_logging();
    let (machine, effects) = update(
        analyzing("<html/>"),
        ScanMsg::AnalysisFinished(Ok(Some("#accept".to_string()))),
    );
    assert_eq!(
        effects,
        vec![ScanEffect::Click {
            selector: "#accept".to_string()
        }]
    );

    let (machine, effects) = update(machine, ScanMsg::ClickFinished(ClickReport::clicked()));
    assert_eq!(
        machine.outcome(),
        Some(&ScanOutcome::Clicked("#accept".to_string()))
    );
    assert_eq!(
        effects[0],
        ScanEffect::Publish(StatePatch::status(ScanStatus::Success))
    );
    let record = records(&effects)[0];
    assert_eq!(record.status, AnalyticsStatus::Success);
    assert_eq!(record.selector.as_deref(), Some("#accept"));
}

#[test]
fn refused_click_carries_collaborator_reason() {
    init_logging();
    let (machine, _) = update(
        analyzing("<html/>"),
        ScanMsg::AnalysisFinished(Ok(Some("#accept".to_string()))),
    );
    let reason = "Element '#accept' is covered by div#overlay";
    let (machine, effects) = update(machine, ScanMsg::ClickFinished(ClickReport::refused(reason)));

    let expected = ErrorPayload::new(ErrorKind::ClickFailed, reason);
    assert_eq!(machine.outcome(), Some(&ScanOutcome::Failed(expected.clone())));
    assert_eq!(effects[0], ScanEffect::Publish(StatePatch::failed(expected)));
    assert_eq!(records(&effects)[0].selector.as_deref(), Some("#accept"));
}

#[test]
fn fault_becomes_generic_error_with_detail_in_record() {
    init_logging();
    let (machine, effects) = update(
        analyzing("<html/>"),
        ScanMsg::Fault("script host vanished".to_string()),
    );

    assert_eq!(
        machine.outcome(),
        Some(&ScanOutcome::Failed(ErrorPayload::new(
            ErrorKind::GenericAnalysisError,
            GENERIC_FAILURE_MESSAGE
        )))
    );
    assert_eq!(
        records(&effects)[0].reason.as_deref(),
        Some("script host vanished")
    );
}

#[test]
fn out_of_phase_messages_are_ignored() {
    init_logging();
    let machine = started();
    let (same, effects) = update(machine.clone(), ScanMsg::ClickFinished(ClickReport::clicked()));
    assert_eq!(same, machine);
    assert!(effects.is_empty());

    let (finished, _) = update(analyzing("<html/>"), ScanMsg::AnalysisFinished(Ok(None)));
    let (after, effects) = update(finished.clone(), ScanMsg::Start);
    assert_eq!(after, finished);
    assert!(effects.is_empty());
}
