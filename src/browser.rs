//! Chrome bridge: one tab driven over the DevTools protocol.
//!
//! Everything the core crates need from the page (captures, input dispatch,
//! stability signals) runs as JavaScript evaluated on the tab. Element
//! addressing is an indirection layer refreshed on every capture: elements are
//! stamped with a monotonically assigned id kept on the page side, so the ids
//! in one serialization stay valid until the page itself is replaced.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use tracing::{debug, warn};

use agent_loop::ActionExecutor;
use dom_perceiver::{DomCapturePort, PerceiveError, RawRenderTree};
use stability_gate::{GateError, StabilitySignals};
use webpilot_core_types::{Action, ExecutorError};

/// Walks the live DOM and emits the raw render tree as JSON. Re-stamps the
/// id-to-element registry as a side effect, so dispatch scripts can resolve
/// the ids this capture hands out.
const CAPTURE_JS: &str = r#"
(() => {
  if (!window.__wp_ids) { window.__wp_ids = new WeakMap(); window.__wp_next_id = 1; }
  const ids = window.__wp_ids;
  window.__wp_elements = new Map();
  const nodes = [];

  function idFor(el) {
    if (!ids.has(el)) { ids.set(el, window.__wp_next_id++); }
    return ids.get(el);
  }

  function visit(node, parentIndex) {
    let entry = null;
    if (node.nodeType === 9) {
      entry = { id: idFor(node), kind: 'document', tag: '#document', parent: parentIndex };
    } else if (node.nodeType === 1) {
      const el = node;
      const id = idFor(el);
      window.__wp_elements.set(id, el);
      const style = getComputedStyle(el);
      const rect = el.getBoundingClientRect();
      entry = {
        id: id,
        kind: 'element',
        tag: el.tagName.toLowerCase(),
        parent: parentIndex,
        attributes: Array.from(el.attributes).map(a => [a.name, a.value]),
        bounds: [rect.x, rect.y, rect.width, rect.height],
        style: {
          display: style.display,
          visibility: style.visibility,
          opacity: style.opacity,
          cursor: style.cursor
        }
      };
      if ('value' in el && typeof el.value === 'string') { entry.value = el.value; }
      if (el.tagName === 'OPTION') { entry.selected = el.selected; }
    } else if (node.nodeType === 3) {
      const text = node.nodeValue || '';
      if (text.trim()) {
        entry = { id: 0, kind: 'text', tag: '#text', parent: parentIndex, text: text };
      }
    }

    let index = parentIndex;
    if (entry) { index = nodes.length; nodes.push(entry); }
    if (node.nodeType === 1 || node.nodeType === 9) {
      for (const child of node.childNodes) { visit(child, entry ? index : parentIndex); }
    }
  }

  visit(document, null);
  return JSON.stringify({ nodes });
})()
"#;

/// Installs the mutation observer; the in-flight request counter is patched in
/// once and left in place across waits.
const ATTACH_JS: &str = r#"
(() => {
  window.__wp_mutations = false;
  if (window.__wp_observer) { window.__wp_observer.disconnect(); }
  window.__wp_observer = new MutationObserver(() => { window.__wp_mutations = true; });
  window.__wp_observer.observe(document, { attributes: true, childList: true, subtree: true });

  if (window.__wp_inflight === undefined) {
    window.__wp_inflight = 0;
    const origFetch = window.fetch;
    window.fetch = function() {
      window.__wp_inflight++;
      return origFetch.apply(this, arguments).finally(() => {
        window.__wp_inflight = Math.max(0, window.__wp_inflight - 1);
      });
    };
    const origSend = XMLHttpRequest.prototype.send;
    XMLHttpRequest.prototype.send = function() {
      window.__wp_inflight++;
      this.addEventListener('loadend', () => {
        window.__wp_inflight = Math.max(0, window.__wp_inflight - 1);
      });
      return origSend.apply(this, arguments);
    };
  }
  return true;
})()
"#;

/// Read-and-reset mutation flag. A document still loading counts as mutating.
const MUTATED_JS: &str = r#"
(() => {
  const changed = window.__wp_mutations === true || document.readyState !== 'complete';
  window.__wp_mutations = false;
  return changed;
})()
"#;

const INFLIGHT_JS: &str = "(() => window.__wp_inflight || 0)()";

const DETACH_JS: &str = r#"
(() => {
  if (window.__wp_observer) { window.__wp_observer.disconnect(); delete window.__wp_observer; }
  delete window.__wp_mutations;
  return true;
})()
"#;

/// One live Chrome tab plus the browser that owns it.
pub struct ChromeBridge {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeBridge {
    /// Launch Chrome and open a blank tab.
    pub fn launch(headless: bool) -> Result<Self> {
        let options = LaunchOptions {
            headless,
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-gpu"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };
        let browser = Browser::new(options).context("browser launch failed")?;
        let tab = browser.new_tab()?;
        tab.navigate_to("about:blank")?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Navigate the tab and wait for the document body to exist.
    pub async fn open(&self, url: &str) -> Result<()> {
        let tab = self.tab.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<()> {
            tab.navigate_to(&url)?;
            tab.wait_for_element("body")?;
            Ok(())
        })
        .await
        .map_err(|err| anyhow!("navigation task panicked: {err}"))?
    }

    /// Evaluate a script on the tab without stalling the async runtime.
    async fn eval(&self, expression: String) -> Result<Option<Value>> {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || {
            tab.evaluate(&expression, false)
                .map(|object| object.value)
                .map_err(|err| anyhow!("script evaluation failed: {err}"))
        })
        .await
        .map_err(|err| anyhow!("evaluation task panicked: {err}"))?
    }

    async fn eval_dispatch(&self, action: &Action, expression: String) -> Result<(), ExecutorError> {
        let result = self
            .eval(expression)
            .await
            .map_err(|err| ExecutorError::Dispatch(err.to_string()))?;
        match result.as_ref().and_then(Value::as_str) {
            Some("ok") => Ok(()),
            Some("missing") => Err(ExecutorError::UnknownNode(
                action.target().unwrap_or(webpilot_core_types::NodeId(0)),
            )),
            other => Err(ExecutorError::Dispatch(format!(
                "unexpected dispatch result: {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl DomCapturePort for ChromeBridge {
    async fn capture(&self) -> Result<RawRenderTree, PerceiveError> {
        let value = self
            .eval(CAPTURE_JS.to_string())
            .await
            .map_err(|err| PerceiveError::capture(err.to_string()))?;
        let encoded = value
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| PerceiveError::capture("capture script returned no payload"))?;
        let raw: RawRenderTree = serde_json::from_str(encoded)
            .map_err(|err| PerceiveError::capture(format!("capture payload malformed: {err}")))?;
        debug!(nodes = raw.nodes.len(), "captured render tree");
        Ok(raw)
    }

    async fn current_url(&self) -> Result<String, PerceiveError> {
        let value = self
            .eval("window.location.href".to_string())
            .await
            .map_err(|err| PerceiveError::capture(err.to_string()))?;
        Ok(value
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string())
    }
}

#[async_trait]
impl StabilitySignals for ChromeBridge {
    async fn attach(&self) -> Result<(), GateError> {
        self.eval(ATTACH_JS.to_string())
            .await
            .map(|_| ())
            .map_err(|err| GateError::probe(err.to_string()))
    }

    async fn dom_mutated(&self) -> Result<bool, GateError> {
        let value = self
            .eval(MUTATED_JS.to_string())
            .await
            .map_err(|err| GateError::probe(err.to_string()))?;
        Ok(value.as_ref().and_then(Value::as_bool).unwrap_or(true))
    }

    async fn requests_in_flight(&self) -> Result<u64, GateError> {
        let value = self
            .eval(INFLIGHT_JS.to_string())
            .await
            .map_err(|err| GateError::probe(err.to_string()))?;
        Ok(value.as_ref().and_then(Value::as_u64).unwrap_or(0))
    }

    async fn detach(&self) -> Result<(), GateError> {
        self.eval(DETACH_JS.to_string())
            .await
            .map(|_| ())
            .map_err(|err| GateError::probe(err.to_string()))
    }
}

#[async_trait]
impl ActionExecutor for ChromeBridge {
    async fn dispatch(&self, action: &Action) -> Result<(), ExecutorError> {
        match action {
            Action::Navigate { url } => {
                self.open(url)
                    .await
                    .map_err(|err| ExecutorError::Dispatch(err.to_string()))?;
                Ok(())
            }
            Action::Click { node } => {
                let script = format!(
                    r#"(() => {{
  const el = window.__wp_elements && window.__wp_elements.get({node});
  if (!el) return 'missing';
  el.click();
  return 'ok';
}})()"#
                );
                self.eval_dispatch(action, script).await
            }
            Action::TypeText { node, text } => {
                let literal = js_string(text);
                let script = format!(
                    r#"(() => {{
  const el = window.__wp_elements && window.__wp_elements.get({node});
  if (!el) return 'missing';
  el.focus();
  el.value = {literal};
  el.dispatchEvent(new Event('input', {{ bubbles: true }}));
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return 'ok';
}})()"#
                );
                self.eval_dispatch(action, script).await
            }
            Action::SelectOption { node, value } => {
                let literal = js_string(value);
                let script = format!(
                    r#"(() => {{
  const el = window.__wp_elements && window.__wp_elements.get({node});
  if (!el) return 'missing';
  el.value = {literal};
  el.dispatchEvent(new Event('change', {{ bubbles: true }}));
  return 'ok';
}})()"#
                );
                self.eval_dispatch(action, script).await
            }
        }
    }
}

/// Encode a Rust string as a JavaScript string literal.
fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| {
        warn!("string not encodable as a JS literal; sending empty");
        "\"\"".to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_string_escapes_quotes_and_newlines() {
        assert_eq!(js_string("plain"), "\"plain\"");
        assert_eq!(js_string("a\"b"), "\"a\\\"b\"");
        assert_eq!(js_string("line\nbreak"), "\"line\\nbreak\"");
    }
}
