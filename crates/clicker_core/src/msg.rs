use crate::{ClickReport, ErrorPayload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanMsg {
    /// A user asked for a scan of the tab.
    Start,
    /// Page markup arrived; `None` when the page returned nothing usable.
    HtmlExtracted(Option<String>),
    /// Gateway finished: a selector, no banner, or a classified failure.
    AnalysisFinished(Result<Option<String>, ErrorPayload>),
    /// The click collaborator reported back.
    ClickFinished(ClickReport),
    /// A collaborator failed in a way nobody classified.
    Fault(String),
}
