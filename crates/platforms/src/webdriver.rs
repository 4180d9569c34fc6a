//! Minimal W3C WebDriver client bound to an existing browser session.

use std::time::Duration;

use async_trait::async_trait;
use autopilot::AutopilotError;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tracing::debug;

/// Key the W3C protocol uses for element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Anything that can run a script in the page. Probes only need this.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, AutopilotError>;
}

pub struct WebDriver {
    client: Client,
    /// `{endpoint}/session/{id}`
    session_url: String,
}

impl WebDriver {
    /// Bind to a session another process already opened.
    pub fn attach(endpoint: &str, session_id: &str, timeout: Duration) -> Result<Self, AutopilotError> {
        let client = Client::builder()
            .user_agent("BoardAutopilot/1.0")
            .timeout(timeout)
            .build()
            .map_err(|e| AutopilotError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            session_url: format!(
                "{}/session/{}",
                endpoint.trim_end_matches('/'),
                session_id.trim()
            ),
        })
    }

    async fn command(&self, method: Method, path: &str, body: Value) -> Result<Value, AutopilotError> {
        let url = format!("{}{}", self.session_url, path);
        debug!(%method, path, "WebDriver <");

        let request = if method == Method::GET || method == Method::DELETE {
            self.client.request(method, &url)
        } else {
            self.client.request(method, &url).json(&body)
        };

        let resp = request
            .send()
            .await
            .map_err(|e| AutopilotError::Transport(format!("WebDriver request error: {e}")))?;
        let status = resp.status();

        let data: Value = resp
            .json()
            .await
            .map_err(|e| AutopilotError::Transport(format!("WebDriver JSON parse error: {e}")))?;

        if !status.is_success() {
            let code = data["value"]["error"].as_str().unwrap_or("unknown error");
            let message = data["value"]["message"].as_str().unwrap_or_default();
            return Err(classify_error(code, message));
        }
        Ok(data["value"].clone())
    }

    pub async fn refresh(&self) -> Result<(), AutopilotError> {
        self.command(Method::POST, "/refresh", json!({})).await?;
        Ok(())
    }

    /// First element matching `selector`, `None` if there is none.
    pub async fn find_css(&self, selector: &str) -> Result<Option<String>, AutopilotError> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, "/element", body).await {
            Ok(value) => Ok(value[ELEMENT_KEY].as_str().map(str::to_string)),
            Err(AutopilotError::BoardNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn perform_actions(&self, actions: Value) -> Result<(), AutopilotError> {
        self.command(Method::POST, "/actions", json!({ "actions": actions }))
            .await?;
        Ok(())
    }

    pub async fn release_actions(&self) -> Result<(), AutopilotError> {
        self.command(Method::DELETE, "/actions", Value::Null).await?;
        Ok(())
    }
}

#[async_trait]
impl ScriptRunner for WebDriver {
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, AutopilotError> {
        let body = json!({ "script": script, "args": args });
        self.command(Method::POST, "/execute/sync", body).await
    }
}

/// Script argument referring to an element id.
pub fn element_arg(id: &str) -> Value {
    json!({ ELEMENT_KEY: id })
}

/// Map a W3C error code to the autopilot taxonomy.
fn classify_error(code: &str, message: &str) -> AutopilotError {
    let detail = format!("{code}: {message}");
    match code {
        "invalid session id" | "no such window" => AutopilotError::SessionLost(detail),
        "no such element" | "stale element reference" => AutopilotError::BoardNotFound(detail),
        "unknown error" if message.contains("net::ERR_") => AutopilotError::Transport(detail),
        _ => AutopilotError::Observation(detail),
    }
}
