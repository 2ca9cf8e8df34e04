//! [`Locatable`] over a live page target.
//!
//! Every query evaluates the locator script in the page with the serialized
//! path, so nothing is cached between calls.

use std::time::Duration;

use async_trait::async_trait;
use chatscope_core::{Error, Locatable, LocatorPath, Result, WaitState};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::client::CdpClient;
use crate::error::CdpError;

const LOCATOR_JS: &str = include_str!("locator.js");

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct ProbeState {
    count: usize,
    visible: bool,
}

#[derive(Debug, Deserialize)]
struct ClickTarget {
    found: bool,
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    visible: bool,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
}

pub struct CdpPage {
    client: CdpClient,
    poll_interval: Duration,
}

impl CdpPage {
    /// Attach to a page target and enable the domains the driver uses.
    pub async fn connect(ws_url: &str) -> std::result::Result<Self, CdpError> {
        let client = CdpClient::connect(ws_url).await?;
        client.enable_domain("Runtime").await?;
        client.enable_domain("Page").await?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: CdpClient) -> Self {
        Self {
            client,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn client(&self) -> &CdpClient {
        &self.client
    }

    /// Evaluate a JavaScript expression and return its value.
    pub async fn evaluate(&self, expression: &str) -> std::result::Result<Value, CdpError> {
        let result = self
            .client
            .send_command("Runtime.evaluate", evaluate_params(expression))
            .await?;

        if let Some(message) = exception_message(&result) {
            return Err(CdpError::JsException { message });
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    pub async fn url(&self) -> Result<String> {
        let value = self.evaluate("location.href").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Driver(format!("location.href returned {value}")))
    }

    async fn run(&self, path: &LocatorPath, op: &str, arg: Option<&str>) -> Result<Value> {
        let expression = locator_expression(path, op, arg)?;
        match self.evaluate(&expression).await {
            Ok(value) => Ok(value),
            Err(CdpError::JsException { message }) if message.contains("SyntaxError") => {
                Err(Error::InvalidSelector {
                    selector: path.to_string(),
                    reason: message,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn probe(&self, path: &LocatorPath) -> Result<ProbeState> {
        Ok(serde_json::from_value(self.run(path, "state", None).await?)?)
    }

    async fn mouse_click(&self, x: f64, y: f64) -> Result<()> {
        for event in ["mousePressed", "mouseReleased"] {
            self.client
                .send_command("Input.dispatchMouseEvent", click_params(x, y, event))
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Locatable for CdpPage {
    async fn count(&self, path: &LocatorPath) -> Result<usize> {
        let value = self.run(path, "count", None).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| Error::Driver(format!("count of {path} returned {value}")))
    }

    async fn text_content(&self, path: &LocatorPath) -> Result<Option<String>> {
        Ok(self.run(path, "text", None).await?.as_str().map(str::to_string))
    }

    async fn attribute(&self, path: &LocatorPath, name: &str) -> Result<Option<String>> {
        Ok(self
            .run(path, "attr", Some(name))
            .await?
            .as_str()
            .map(str::to_string))
    }

    async fn click(&self, path: &LocatorPath) -> Result<()> {
        let target: ClickTarget = serde_json::from_value(self.run(path, "target", None).await?)?;
        if !target.found {
            return Err(Error::ElementNotFound(path.to_string()));
        }
        if target.disabled {
            return Err(Error::NotInteractable(format!("{path} is disabled")));
        }
        if !target.visible {
            return Err(Error::NotInteractable(format!("{path} is not visible")));
        }
        self.mouse_click(target.x, target.y).await?;
        debug!("Clicked {} at ({:.0}, {:.0})", path, target.x, target.y);
        Ok(())
    }

    async fn fill(&self, path: &LocatorPath, text: &str) -> Result<()> {
        let outcome = self.run(path, "fill", Some(text)).await?;
        match outcome.as_str() {
            Some("ok") => Ok(()),
            Some("missing") => Err(Error::ElementNotFound(path.to_string())),
            Some("disabled") => Err(Error::NotInteractable(format!("{path} is disabled"))),
            Some("not-editable") => Err(Error::NotInteractable(format!(
                "{path} is not an input, textarea or contenteditable element"
            ))),
            _ => Err(Error::Driver(format!("fill of {path} returned {outcome}"))),
        }
    }

    async fn wait_for(&self, path: &LocatorPath, state: WaitState, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let probe = self.probe(path).await?;
            let holds = match state {
                WaitState::Attached => probe.count > 0,
                WaitState::Detached => probe.count == 0,
                WaitState::Visible => probe.visible,
                WaitState::Hidden => !probe.visible,
            };
            if holds {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout {
                    target: path.to_string(),
                    state,
                    timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

/// Call expression running the locator script for `path`.
fn locator_expression(path: &LocatorPath, op: &str, arg: Option<&str>) -> Result<String> {
    Ok(format!(
        "({})({}, {}, {})",
        LOCATOR_JS.trim_end(),
        serde_json::to_string(path)?,
        serde_json::to_string(op)?,
        serde_json::to_string(&arg)?,
    ))
}

fn evaluate_params(expression: &str) -> Value {
    serde_json::json!({
        "expression": expression,
        "returnByValue": true,
        "awaitPromise": true,
    })
}

fn click_params(x: f64, y: f64, event_type: &str) -> Value {
    serde_json::json!({
        "type": event_type,
        "x": x,
        "y": y,
        "button": "left",
        "clickCount": 1,
    })
}

fn exception_message(result: &Value) -> Option<String> {
    let details = result.get("exceptionDetails")?;
    Some(
        details
            .get("exception")
            .and_then(|e| e.get("description"))
            .and_then(Value::as_str)
            .or_else(|| details.get("text").and_then(Value::as_str))
            .unwrap_or("unknown exception")
            .to_string(),
    )
}
