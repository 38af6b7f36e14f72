use crate::effect::{EVENT_BANNER_CLICKED, EVENT_BANNER_NOT_FOUND, EVENT_SCAN_FAILED};
use crate::scan::is_scannable_url;
use crate::text::prefix_chars;
use crate::{
    AnalyticsRecord, AnalyticsStatus, ErrorKind, ErrorPayload, ScanEffect, ScanMachine, ScanMsg,
    ScanOutcome, ScanPhase, ScanStatus, StatePatch,
};

pub const GENERIC_FAILURE_MESSAGE: &str = "An unexpected error occurred while scanning the page.";
pub const EMPTY_PAGE_MESSAGE: &str = "The page returned no content to analyze.";
pub const RESTRICTED_PAGE_MESSAGE: &str = "This kind of page cannot be scanned.";
pub const CLICK_REFUSED_MESSAGE: &str = "The element could not be clicked.";

/// Pure update function: applies a message to a scan and returns the effects
/// the driver must execute, in order.
///
/// Messages that do not fit the current phase are ignored, and a finished
/// scan accepts nothing further.
pub fn update(mut machine: ScanMachine, msg: ScanMsg) -> (ScanMachine, Vec<ScanEffect>) {
    if machine.is_finished() {
        return (machine, Vec::new());
    }

    let effects = match msg {
        ScanMsg::Start => {
            if machine.phase() != &ScanPhase::Ready {
                return (machine, Vec::new());
            }
            // Published before any IO so the UI shows progress immediately.
            let mut effects = vec![ScanEffect::Publish(
                StatePatch::status(ScanStatus::Scanning).with_url(machine.url()),
            )];
            if is_scannable_url(machine.url()) {
                machine.set_phase(ScanPhase::Extracting);
                effects.push(ScanEffect::ExtractHtml);
            } else {
                let error = ErrorPayload::new(ErrorKind::HtmlFetchFailed, RESTRICTED_PAGE_MESSAGE);
                effects.extend(finish(&mut machine, ScanOutcome::Failed(error), None, None));
            }
            effects
        }
        ScanMsg::HtmlExtracted(html) => {
            if machine.phase() != &ScanPhase::Extracting {
                return (machine, Vec::new());
            }
            match html.filter(|markup| !markup.trim().is_empty()) {
                None => {
                    let error = ErrorPayload::new(ErrorKind::HtmlFetchFailed, EMPTY_PAGE_MESSAGE);
                    finish(&mut machine, ScanOutcome::Failed(error), None, None)
                }
                Some(html) => {
                    let limit = machine.snippet_limit();
                    machine.set_html_context(prefix_chars(&html, limit).to_string());
                    machine.set_phase(ScanPhase::Analyzing);
                    vec![
                        ScanEffect::Publish(StatePatch::status(ScanStatus::Analyzing)),
                        ScanEffect::Analyze { html },
                    ]
                }
            }
        }
        ScanMsg::AnalysisFinished(result) => {
            if machine.phase() != &ScanPhase::Analyzing {
                return (machine, Vec::new());
            }
            match result {
                Err(error) => finish(&mut machine, ScanOutcome::Failed(error), None, None),
                Ok(None) => finish(&mut machine, ScanOutcome::NotFound, None, None),
                Ok(Some(selector)) => {
                    machine.set_phase(ScanPhase::Clicking {
                        selector: selector.clone(),
                    });
                    vec![ScanEffect::Click { selector }]
                }
            }
        }
        ScanMsg::ClickFinished(report) => {
            let ScanPhase::Clicking { selector } = machine.phase().clone() else {
                return (machine, Vec::new());
            };
            if report.success {
                finish(&mut machine, ScanOutcome::Clicked(selector), None, None)
            } else {
                let reason = report
                    .reason
                    .filter(|reason| !reason.trim().is_empty())
                    .unwrap_or_else(|| CLICK_REFUSED_MESSAGE.to_string());
                let error = ErrorPayload::new(ErrorKind::ClickFailed, reason);
                finish(&mut machine, ScanOutcome::Failed(error), Some(selector), None)
            }
        }
        ScanMsg::Fault(detail) => {
            let selector = match machine.phase() {
                ScanPhase::Clicking { selector } => Some(selector.clone()),
                _ => None,
            };
            let error = ErrorPayload::new(ErrorKind::GenericAnalysisError, GENERIC_FAILURE_MESSAGE);
            finish(&mut machine, ScanOutcome::Failed(error), selector, Some(detail))
        }
    };

    (machine, effects)
}

/// Moves the scan to its terminal phase and emits the final state transition
/// followed by the analytics record.
fn finish(
    machine: &mut ScanMachine,
    outcome: ScanOutcome,
    selector: Option<String>,
    reason: Option<String>,
) -> Vec<ScanEffect> {
    let (patch, record) = match &outcome {
        ScanOutcome::Clicked(clicked) => (
            StatePatch::status(ScanStatus::Success),
            AnalyticsRecord {
                event: EVENT_BANNER_CLICKED.to_string(),
                status: AnalyticsStatus::Success,
                url: machine.url().to_string(),
                banner_html_context: machine.html_context().to_string(),
                selector: Some(clicked.clone()),
                reason: None,
            },
        ),
        ScanOutcome::NotFound => (
            StatePatch::status(ScanStatus::NotFound),
            AnalyticsRecord {
                event: EVENT_BANNER_NOT_FOUND.to_string(),
                status: AnalyticsStatus::NotFound,
                url: machine.url().to_string(),
                banner_html_context: machine.html_context().to_string(),
                selector: None,
                reason: None,
            },
        ),
        ScanOutcome::Failed(error) => (
            StatePatch::failed(error.clone()),
            AnalyticsRecord {
                event: EVENT_SCAN_FAILED.to_string(),
                status: AnalyticsStatus::Error,
                url: machine.url().to_string(),
                banner_html_context: machine.html_context().to_string(),
                selector,
                reason: Some(reason.unwrap_or_else(|| error.to_string())),
            },
        ),
    };
    machine.set_phase(ScanPhase::Finished(outcome));
    vec![ScanEffect::Publish(patch), ScanEffect::Record(record)]
}
