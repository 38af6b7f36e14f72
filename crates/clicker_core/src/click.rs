//! Click eligibility for a matched consent control.
//!
//! The page-side probe only gathers facts about the element and returns them as
//! plain data; the decision is made here so it can be tested without a page.

use serde::{Deserialize, Serialize};

/// Result of hit-testing the geometric centre of the matched element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitTest {
    /// The top-most element is the match itself or one of its descendants.
    pub is_target_or_descendant: bool,
    /// Short description (`tag#id.class`) of the top-most element.
    #[serde(default)]
    pub description: Option<String>,
}

/// Facts about the element matched by a selector, as seen in the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickProbe {
    pub found: bool,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub disabled: bool,
    /// `None` when nothing was hit (centre outside the viewport).
    #[serde(default)]
    pub hit: Option<HitTest>,
}

impl ClickProbe {
    pub fn not_found() -> Self {
        Self {
            found: false,
            visible: false,
            width: 0.0,
            height: 0.0,
            disabled: false,
            hit: None,
        }
    }
}

/// What the click collaborator reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ClickReport {
    pub fn clicked() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

/// Decides whether the probed element may be clicked. Returns the refusal
/// reason when it may not.
pub fn assess_click(selector: &str, probe: &ClickProbe) -> Result<(), String> {
    if !probe.found {
        return Err(format!("No element matches selector '{selector}'"));
    }
    if !probe.visible {
        return Err(format!("Element '{selector}' is not visible"));
    }
    if probe.width <= 0.0 || probe.height <= 0.0 {
        return Err(format!("Element '{selector}' has zero size"));
    }
    if probe.disabled {
        return Err(format!("Element '{selector}' is disabled"));
    }
    match &probe.hit {
        Some(hit) if hit.is_target_or_descendant => Ok(()),
        Some(hit) => {
            let blocker = hit.description.as_deref().unwrap_or("another element");
            Err(format!("Element '{selector}' is covered by {blocker}"))
        }
        None => Err(format!(
            "Element '{selector}' is outside the visible area of the page"
        )),
    }
}
