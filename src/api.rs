// API client module: a small blocking HTTP client for the meta-manager
// API. Each action sends one request and turns the reply into an
// `Outcome`; transport failures are folded into the outcome as well so a
// failed call never escapes as an error.

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::model::{ModelConfig, UpdateRequest};

/// Blocking API client holding the reqwest client and the API base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

/// Classified result of a register or update call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// 200/201 on register. `model_id` is `None` when the body had no
    /// `response.id`.
    Registered {
        status: StatusCode,
        model_id: Option<String>,
    },
    /// 400 on register whose body says the variant already exists.
    AlreadyExists { status: StatusCode },
    /// 200/201 on update.
    Updated { status: StatusCode },
    /// Any other status code.
    Rejected { status: StatusCode, body: String },
    /// Connect, timeout or body read failure.
    Transport(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::Registered { .. } | Outcome::AlreadyExists { .. } | Outcome::Updated { .. }
        )
    }

    /// Status code of the response, if one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Registered { status, .. }
            | Outcome::AlreadyExists { status }
            | Outcome::Updated { status }
            | Outcome::Rejected { status, .. } => Some(*status),
            Outcome::Transport(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct RegisterResponse {
    response: Option<RegisteredModel>,
}

#[derive(Deserialize)]
struct RegisteredModel {
    id: Option<serde_json::Value>,
}

fn is_created(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

/// Interpret the reply to a register call.
pub fn classify_register(status: StatusCode, body: &str) -> Outcome {
    if is_created(status) {
        return Outcome::Registered {
            status,
            model_id: registered_id(body),
        };
    }
    if status == StatusCode::BAD_REQUEST && body.contains("already exists") {
        return Outcome::AlreadyExists { status };
    }
    Outcome::Rejected {
        status,
        body: body.to_string(),
    }
}

/// Interpret the reply to an update call.
pub fn classify_update(status: StatusCode, body: &str) -> Outcome {
    if is_created(status) {
        Outcome::Updated { status }
    } else {
        Outcome::Rejected {
            status,
            body: body.to_string(),
        }
    }
}

fn registered_id(body: &str) -> Option<String> {
    let parsed: RegisterResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("register response is not the expected JSON: {}", e);
            return None;
        }
    };
    // The id is a string today but keep numbers readable too.
    match parsed.response?.id? {
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

impl ApiClient {
    /// Build a client for the API at `settings.api_url` with the configured
    /// request timeout.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        let base = Url::parse(settings.api_url.trim_end_matches('/'))
            .with_context(|| format!("Invalid API URL {:?}", settings.api_url))?;
        if base.cannot_be_a_base() {
            bail!("Invalid API URL {:?}: not a base URL", settings.api_url);
        }
        Ok(ApiClient { client, base })
    }

    pub fn register_url(&self) -> String {
        self.endpoint(&["v1", "models", "register"])
    }

    /// The model id is pushed as one escaped path segment, so `/`, `?` and
    /// `#` inside it stay part of the id.
    pub fn update_url(&self, model_id: &str) -> String {
        self.endpoint(&["v1", "models", "update", model_id])
    }

    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url.to_string()
    }

    /// POST the model variant to the register endpoint.
    pub fn register_model(&self, config: &ModelConfig) -> Outcome {
        let url = self.register_url();
        debug!("POST {} variant={}", url, config.variant);
        let req = self.client.post(&url).json(config);
        match self.exchange(req, "register") {
            Ok((status, body)) => log_rejection("register", classify_register(status, &body)),
            Err(e) => transport_failure(e),
        }
    }

    /// PUT the new serving configuration for `model_id`.
    pub fn update_model(&self, model_id: &str, update: &UpdateRequest) -> Outcome {
        let url = self.update_url(model_id);
        debug!("PUT {}", url);
        let req = self.client.put(&url).json(update);
        match self.exchange(req, "update") {
            Ok((status, body)) => log_rejection("update", classify_update(status, &body)),
            Err(e) => transport_failure(e),
        }
    }

    /// Send the request and read the whole body as text.
    fn exchange(&self, req: RequestBuilder, action: &str) -> Result<(StatusCode, String)> {
        let res = req
            .send()
            .with_context(|| format!("Failed to send {} request", action))?;
        let status = res.status();
        let body = res
            .text()
            .with_context(|| format!("Failed to read {} response body", action))?;
        debug!("{} responded {}", action, status);
        Ok((status, body))
    }
}

fn log_rejection(action: &str, outcome: Outcome) -> Outcome {
    if let Outcome::Rejected { status, body } = &outcome {
        warn!("{} rejected with {}: {}", action, status, body);
    }
    outcome
}

fn transport_failure(err: anyhow::Error) -> Outcome {
    warn!("request error: {:#}", err);
    Outcome::Transport(format!("{:#}", err))
}
