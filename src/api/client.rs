//! Request/response wrapper for the non-streaming backend endpoints.
//!
//! Every endpoint answers with a JSON envelope `{"code", "message", "data"}`.
//! A call succeeds when the HTTP status is 2xx and `code` is 200; callers get
//! the unwrapped `data`. Failures are normalized into [`ApiError`] with a
//! readable message pulled from the body when there is one.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Chat, ChatMessage, RenameChatRequest};
use crate::core::session::Session;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

pub const ENVELOPE_SUCCESS_CODE: i64 = 200;
pub const FALLBACK_ERROR_MESSAGE: &str = "no error message could be extracted";

#[derive(Debug, Clone)]
pub enum ApiError {
    /// The request needs a bearer token and the session has none.
    MissingCredential,
    Timeout,
    Network(String),
    /// Non-2xx HTTP status.
    Http { status: u16, message: String },
    /// 2xx response whose envelope carried a non-success code.
    Rejected { code: Option<i64>, message: String },
    InvalidResponse(String),
}

impl ApiError {
    fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::MissingCredential => {
                write!(f, "No access token available, run `streamchat auth` first")
            }
            ApiError::Timeout => write!(f, "Request timed out, please retry later"),
            ApiError::Network(detail) => write!(f, "Network error: {detail}"),
            ApiError::Http { status, message } => write!(f, "{status} {message}"),
            ApiError::Rejected { message, .. } => write!(f, "{message}"),
            ApiError::InvalidResponse(detail) => {
                write!(f, "Unexpected response from server: {detail}")
            }
        }
    }
}

impl StdError for ApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestData {
    None,
    Query(Vec<(String, String)>),
    Body(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub data: RequestData,
    pub requires_auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            data: RequestData::None,
            requires_auth: false,
        }
    }

    pub fn query(mut self, params: &[(&str, &str)]) -> Self {
        self.data = RequestData::Query(
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        );
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.data = RequestData::Body(body);
        self
    }

    pub fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    // No overall timeout; streamed replies are bounded by the stream timeout.
    stream_http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(ApiError::from_transport)?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()
            .map_err(ApiError::from_transport)?;
        Ok(Self {
            http,
            stream_http,
            base_url: base_url.into(),
        })
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            stream_http: http.clone(),
            http,
            base_url: base_url.into(),
        }
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Client for the streaming endpoint.
    pub fn stream_http(&self) -> &reqwest::Client {
        &self.stream_http
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn request(&self, session: &Session, request: ApiRequest) -> Result<Value, ApiError> {
        let token = if request.requires_auth {
            Some(session.token().ok_or(ApiError::MissingCredential)?)
        } else {
            None
        };

        let url = construct_api_url(&self.base_url, &request.path);
        debug!(method = request.method.as_str(), url = %url, "Sending API request");

        let mut builder = self.http.request(request.method.as_reqwest(), url);
        if let Some(token) = token {
            builder = add_auth_headers(builder, token);
        }
        builder = match &request.data {
            RequestData::None => builder,
            RequestData::Query(params) => builder.query(params),
            RequestData::Body(body) => builder.json(body),
        };

        let response = builder.send().await.map_err(ApiError::from_transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(ApiError::from_transport)?;

        let result = unwrap_envelope(status, &body);
        if let Err(err) = &result {
            warn!(path = %request.path, error = %err, "API request failed");
        }
        result
    }

    pub async fn list_chats(&self, session: &Session) -> Result<Vec<Chat>, ApiError> {
        let data = self
            .request(session, ApiRequest::new(Method::Get, "/chats").authenticated())
            .await?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        decode_data(data)
    }

    pub async fn create_chat(&self, session: &Session) -> Result<Chat, ApiError> {
        let data = self
            .request(
                session,
                ApiRequest::new(Method::Post, "/chat")
                    .json(Value::Object(Default::default()))
                    .authenticated(),
            )
            .await?;
        decode_data(data)
    }

    pub async fn chat_messages(
        &self,
        session: &Session,
        chat_id: &str,
    ) -> Result<Vec<ChatMessage>, ApiError> {
        let data = self
            .request(
                session,
                ApiRequest::new(Method::Get, "/chat/messages")
                    .query(&[("chat_id", chat_id)])
                    .authenticated(),
            )
            .await?;
        if data.is_null() {
            return Ok(Vec::new());
        }
        decode_data(data)
    }

    pub async fn rename_chat(
        &self,
        session: &Session,
        chat_id: &str,
        title: &str,
    ) -> Result<(), ApiError> {
        let body = serde_json::to_value(RenameChatRequest {
            chat_id: chat_id.to_string(),
            title: title.to_string(),
        })
        .map_err(|err| ApiError::InvalidResponse(err.to_string()))?;
        self.request(
            session,
            ApiRequest::new(Method::Put, "/chat").json(body).authenticated(),
        )
        .await?;
        Ok(())
    }
}

fn decode_data<T: DeserializeOwned>(data: Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|err| ApiError::InvalidResponse(err.to_string()))
}

pub(crate) fn unwrap_envelope(status: u16, body: &str) -> Result<Value, ApiError> {
    let trimmed = body.trim();
    let parsed = if trimmed.is_empty() {
        None
    } else {
        serde_json::from_str::<Value>(trimmed).ok()
    };

    if !(200..300).contains(&status) {
        return Err(ApiError::Http {
            status,
            message: error_message(parsed.as_ref()),
        });
    }

    let Some(value) = parsed else {
        if trimmed.is_empty() {
            return Ok(Value::Null);
        }
        return Err(ApiError::InvalidResponse("body is not valid JSON".to_string()));
    };

    match value.get("code") {
        None => {
            let data = value.get("data").cloned();
            Ok(data.unwrap_or(value))
        }
        Some(code) if code.as_i64() == Some(ENVELOPE_SUCCESS_CODE) => {
            Ok(value.get("data").cloned().unwrap_or(Value::Null))
        }
        Some(code) => Err(ApiError::Rejected {
            code: code.as_i64(),
            message: error_message(Some(&value)),
        }),
    }
}

pub(crate) fn error_message(value: Option<&Value>) -> String {
    value
        .and_then(extract_error_summary)
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string())
}

pub(crate) fn extract_error_summary(value: &Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                Value::String(s) => Some(s.to_string()),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })
        .or_else(|| {
            value
                .get("detail")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.trim().to_string()
    })
}
