use std::sync::Arc;

use async_trait::async_trait;
use clicker_core::{assess_click, ClickProbe, ClickReport, TabId};
use clicker_logging::clicker_debug;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::PageError;

/// Page access for one tab: markup extraction and clicking.
#[async_trait]
pub trait PageBridge: Send + Sync {
    /// Full document markup, or `None` when the page has none to give.
    async fn extract_html(&self, tab_id: TabId) -> Result<Option<String>, PageError>;
    /// Clicks the element matched by `selector`, refusing when it is not
    /// genuinely clickable.
    async fn click(&self, tab_id: TabId, selector: &str) -> Result<ClickReport, PageError>;
}

/// Scripts run in the isolated context of a page.
///
/// Each script is a single function expression taking one plain `args`
/// object and returning a JSON-serializable value. They capture nothing from
/// the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageScript {
    ExtractHtml,
    ProbeClickTarget,
    ClickTarget,
}

impl PageScript {
    pub fn name(self) -> &'static str {
        match self {
            PageScript::ExtractHtml => "extract_html",
            PageScript::ProbeClickTarget => "probe_click_target",
            PageScript::ClickTarget => "click_target",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            PageScript::ExtractHtml => EXTRACT_HTML_JS,
            PageScript::ProbeClickTarget => PROBE_CLICK_TARGET_JS,
            PageScript::ClickTarget => CLICK_TARGET_JS,
        }
    }
}

const EXTRACT_HTML_JS: &str = r#"(function () {
  const root = document.documentElement;
  return root ? root.outerHTML : null;
})"#;

const PROBE_CLICK_TARGET_JS: &str = r#"(function (args) {
  let el = null;
  try {
    el = document.querySelector(args.selector);
  } catch (e) {
    el = null;
  }
  if (!el) {
    return { found: false };
  }
  const describe = (node) => {
    let text = node.tagName.toLowerCase();
    if (node.id) {
      text += '#' + node.id;
    }
    if (typeof node.className === 'string' && node.className.trim()) {
      text += '.' + node.className.trim().split(/\s+/).join('.');
    }
    return text;
  };
  el.scrollIntoView({ block: 'center', inline: 'center' });
  const style = window.getComputedStyle(el);
  const visible = style.display !== 'none'
    && style.visibility !== 'hidden'
    && parseFloat(style.opacity) !== 0;
  const rect = el.getBoundingClientRect();
  let hit = null;
  if (rect.width > 0 && rect.height > 0) {
    const top = document.elementFromPoint(rect.left + rect.width / 2, rect.top + rect.height / 2);
    if (top) {
      hit = {
        is_target_or_descendant: top === el || el.contains(top),
        description: describe(top),
      };
    }
  }
  return {
    found: true,
    visible: visible,
    width: rect.width,
    height: rect.height,
    disabled: el.disabled === true || el.getAttribute('aria-disabled') === 'true',
    hit: hit,
  };
})"#;

const CLICK_TARGET_JS: &str = r#"(function (args) {
  const el = document.querySelector(args.selector);
  if (!el) {
    return { clicked: false };
  }
  el.click();
  return { clicked: true };
})"#;

/// Executes page scripts in a tab's isolated world.
#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn run_script(
        &self,
        tab_id: TabId,
        script: PageScript,
        args: Value,
    ) -> Result<Value, PageError>;
}

#[async_trait]
impl<H: ScriptHost + ?Sized> ScriptHost for Arc<H> {
    async fn run_script(
        &self,
        tab_id: TabId,
        script: PageScript,
        args: Value,
    ) -> Result<Value, PageError> {
        (**self).run_script(tab_id, script, args).await
    }
}

#[derive(Debug, Deserialize)]
struct ClickAck {
    clicked: bool,
}

/// [`PageBridge`] built from the page scripts above: probe, decide, click.
pub struct ScriptedPage<H> {
    host: H,
}

impl<H: ScriptHost> ScriptedPage<H> {
    pub fn new(host: H) -> Self {
        Self { host }
    }
}

#[async_trait]
impl<H: ScriptHost> PageBridge for ScriptedPage<H> {
    async fn extract_html(&self, tab_id: TabId) -> Result<Option<String>, PageError> {
        let value = self
            .host
            .run_script(tab_id, PageScript::ExtractHtml, json!({}))
            .await?;
        match value {
            Value::String(html) => Ok(Some(html)),
            Value::Null => Ok(None),
            other => Err(PageError::Malformed(format!(
                "expected markup string, got {other}"
            ))),
        }
    }

    async fn click(&self, tab_id: TabId, selector: &str) -> Result<ClickReport, PageError> {
        let args = json!({ "selector": selector });
        let probe_value = self
            .host
            .run_script(tab_id, PageScript::ProbeClickTarget, args.clone())
            .await?;
        let probe: ClickProbe = serde_json::from_value(probe_value)
            .map_err(|err| PageError::Malformed(err.to_string()))?;

        if let Err(reason) = assess_click(selector, &probe) {
            clicker_debug!("Refusing click on tab {}: {}", tab_id, reason);
            return Ok(ClickReport::refused(reason));
        }

        let ack_value = self
            .host
            .run_script(tab_id, PageScript::ClickTarget, args)
            .await?;
        let ack: ClickAck = serde_json::from_value(ack_value)
            .map_err(|err| PageError::Malformed(err.to_string()))?;
        if ack.clicked {
            Ok(ClickReport::clicked())
        } else {
            Ok(ClickReport::refused(format!(
                "Element '{selector}' disappeared before it could be clicked"
            )))
        }
    }
}
