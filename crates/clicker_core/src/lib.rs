//! Clicker core: scan state machine, tab state model and failure taxonomy.
//!
//! Nothing in this crate performs IO. The engine executes the effects returned
//! by [`update`] and feeds the results back as [`ScanMsg`]s.
mod click;
mod effect;
mod error;
mod msg;
mod scan;
mod settings;
mod tab_state;
mod text;
mod update;

pub use click::{assess_click, ClickProbe, ClickReport, HitTest};
pub use effect::{
    AnalyticsRecord, AnalyticsStatus, ScanEffect, EVENT_BANNER_CLICKED, EVENT_BANNER_NOT_FOUND,
    EVENT_SCAN_FAILED,
};
pub use error::{ErrorKind, ErrorPayload};
pub use msg::ScanMsg;
pub use scan::{is_scannable_url, ScanMachine, ScanOutcome, ScanPhase};
pub use settings::{CredentialSignature, Settings, Tier};
pub use tab_state::{ScanStatus, StatePatch, TabId, TabScanState};
pub use text::{prefix_chars, strip_code_fence, MAX_ANALYSIS_CHARS, MAX_SNIPPET_CHARS};
pub use update::{
    update, CLICK_REFUSED_MESSAGE, EMPTY_PAGE_MESSAGE, GENERIC_FAILURE_MESSAGE,
    RESTRICTED_PAGE_MESSAGE,
};
