//! HTTP client for the task API.
//!
//! Every call goes through [`ApiClient::request`], which attaches credentials,
//! encodes the body the way the [`Endpoint`] says, and folds all failures
//! into [`ApiError`]. The typed helpers below it decode the JSON payloads.

mod models;
pub mod transport;

pub use models::*;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::session::{self, SharedSession};

/// User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("tasky/", env!("TASKY_VERSION"));

#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response. `message` is the server's `detail` when it sent one.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// A 2xx response whose body was not the JSON we expected.
    #[error("invalid response from server: {message}")]
    Parse { status: u16, message: String },

    /// The request body could not be serialized.
    #[error("failed to encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Network(_) | ApiError::Encode(_) => None,
            ApiError::Api { status, .. } | ApiError::Parse { status, .. } => Some(*status),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Json,
    FormUrlEncoded,
}

impl Encoding {
    pub fn content_type(&self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::FormUrlEncoded => "application/x-www-form-urlencoded",
        }
    }
}

/// One backend route: how to call it and whether it needs credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub method: Method,
    pub path: String,
    pub encoding: Encoding,
    pub authenticated: bool,
}

impl Endpoint {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Endpoint {
            method,
            path: path.into(),
            encoding: Encoding::Json,
            authenticated: true,
        }
    }

    pub fn signup() -> Self {
        Endpoint {
            authenticated: false,
            ..Self::new(Method::Post, "/signup")
        }
    }

    /// OAuth2 password flow: the one form-encoded route.
    pub fn token() -> Self {
        Endpoint {
            encoding: Encoding::FormUrlEncoded,
            authenticated: false,
            ..Self::new(Method::Post, "/token")
        }
    }

    pub fn list_tasks() -> Self {
        Self::new(Method::Get, "/tasks")
    }

    pub fn create_task() -> Self {
        Self::new(Method::Post, "/tasks")
    }

    pub fn get_task(id: i64) -> Self {
        Self::new(Method::Get, format!("/tasks/{id}"))
    }

    pub fn update_task(id: i64) -> Self {
        Self::new(Method::Put, format!("/tasks/{id}"))
    }

    pub fn delete_task(id: i64) -> Self {
        Self::new(Method::Delete, format!("/tasks/{id}"))
    }
}

pub struct ApiClient<T = ReqwestTransport> {
    base_url: String,
    transport: T,
    session: SharedSession,
}

impl ApiClient<ReqwestTransport> {
    pub fn from_config(
        config: &crate::config::Config,
        session: SharedSession,
    ) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(USER_AGENT, config.timeout())?;
        Ok(Self::new(&config.api_url, transport, session))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(base_url: &str, transport: T, session: SharedSession) -> Self {
        ApiClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            session,
        }
    }

    /// Issue one request. An empty response body yields `Ok(None)`.
    pub fn request<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<Option<Value>, ApiError> {
        self.exchange(endpoint, body).map(|(_, value)| value)
    }

    /// `request` plus decoding into `D`.
    fn call<B: Serialize + ?Sized, D: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<D, ApiError> {
        let (status, value) = self.exchange(endpoint, body)?;
        decode(status, value).inspect_err(|e| log_failure(endpoint, e))
    }

    fn exchange<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<(u16, Option<Value>), ApiError> {
        self.send(endpoint, body)
            .inspect_err(|e| log_failure(endpoint, e))
    }

    fn send<B: Serialize + ?Sized>(
        &self,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<(u16, Option<Value>), ApiError> {
        let mut headers = Vec::new();

        if endpoint.authenticated {
            let current = session::snapshot(&self.session);
            if let Some(key) = current.api_key {
                headers.push(("X-API-Key", key));
            }
            if let Some(token) = current.bearer_token {
                headers.push(("Authorization", format!("Bearer {token}")));
            }
        }

        let body = match body {
            Some(b) => {
                headers.push(("Content-Type", endpoint.encoding.content_type().to_string()));
                Some(encode_body(endpoint.encoding, b)?)
            }
            None => None,
        };

        let request = HttpRequest {
            method: endpoint.method,
            url: format!("{}{}", self.base_url, endpoint.path),
            headers,
            body,
        };

        tracing::debug!(method = endpoint.method.as_str(), path = %endpoint.path, "sending request");
        let response = self.transport.send(request)?;
        let status = response.status;
        interpret(response).map(|value| (status, value))
    }

    pub fn signup(&self, registration: &Registration) -> Result<SignupResponse, ApiError> {
        self.call(&Endpoint::signup(), Some(registration))
    }

    pub fn login(&self, form: &LoginForm) -> Result<TokenResponse, ApiError> {
        self.call(&Endpoint::token(), Some(form))
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.call::<(), _>(&Endpoint::list_tasks(), None)
    }

    pub fn get_task(&self, id: i64) -> Result<Task, ApiError> {
        self.call::<(), _>(&Endpoint::get_task(id), None)
    }

    pub fn create_task(&self, task: &NewTask) -> Result<Task, ApiError> {
        self.call(&Endpoint::create_task(), Some(task))
    }

    /// Partial update carrying only the status. The updated task is returned
    /// when the server sends one.
    pub fn update_status(&self, id: i64, status: TaskStatus) -> Result<Option<Task>, ApiError> {
        self.call(&Endpoint::update_task(id), Some(&StatusUpdate { status }))
    }

    pub fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        self.request::<()>(&Endpoint::delete_task(id), None)?;
        Ok(())
    }
}

fn log_failure(endpoint: &Endpoint, error: &ApiError) {
    tracing::warn!(
        method = endpoint.method.as_str(),
        path = %endpoint.path,
        status = ?error.status(),
        "API error: {error}"
    );
}

fn encode_body<B: Serialize + ?Sized>(encoding: Encoding, body: &B) -> Result<Vec<u8>, ApiError> {
    let encoded = match encoding {
        Encoding::Json => serde_json::to_vec(body).map_err(|e| e.to_string()),
        Encoding::FormUrlEncoded => serde_urlencoded::to_string(body)
            .map(String::into_bytes)
            .map_err(|e| e.to_string()),
    };
    encoded.map_err(ApiError::Encode)
}

/// Turn a raw response into a JSON value or an error.
fn interpret(response: HttpResponse) -> Result<Option<Value>, ApiError> {
    let status = response.status;
    let text = response.body.trim();
    let parsed = if text.is_empty() {
        Ok(None)
    } else {
        serde_json::from_str::<Value>(text).map(Some)
    };

    if !(200..300).contains(&status) {
        let message = parsed
            .ok()
            .flatten()
            .as_ref()
            .and_then(detail_message)
            .unwrap_or_else(|| format!("Request failed with status {status}"));
        return Err(ApiError::Api { status, message });
    }

    parsed.map_err(|e| ApiError::Parse {
        status,
        message: e.to_string(),
    })
}

/// Pull a human-readable message out of an error body's `detail` field.
/// FastAPI validation errors put a list of `{msg, ...}` objects there.
fn detail_message(body: &Value) -> Option<String> {
    match body.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

/// Decode a payload; an empty body decodes as JSON `null`.
fn decode<D: DeserializeOwned>(status: u16, value: Option<Value>) -> Result<D, ApiError> {
    serde_json::from_value(value.unwrap_or(Value::Null)).map_err(|e| ApiError::Parse {
        status,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::transport::fake::FakeTransport;
    use super::*;
    use crate::session::{MemoryStorage, Session, SessionStore};

    fn client_with(session: Session) -> (ApiClient<FakeTransport>, FakeTransport) {
        let mut store = SessionStore::open(Box::new(MemoryStorage::default()));
        if session.is_authenticated() {
            store.save(session).unwrap();
        }
        let transport = FakeTransport::default();
        let client = ApiClient::new("http://api.test/", transport.clone(), store.into_shared());
        (client, transport)
    }

    fn logged_in() -> (ApiClient<FakeTransport>, FakeTransport) {
        client_with(Session::new(
            "tok1".into(),
            Some("key1".into()),
            "alice".into(),
        ))
    }

    const TASK_JSON: &str = r#"{"id":1,"title":"Buy milk","description":"2%","status":"pending","created_at":"2024-05-01T10:00:00"}"#;

    #[test]
    fn login_is_form_encoded_without_credentials() {
        let (client, transport) = logged_in();
        transport.reply(200, r#"{"access_token":"tok9","token_type":"bearer","api_key":"key9"}"#);

        let resp = client
            .login(&LoginForm {
                username: "alice".into(),
                password: "pw123".into(),
            })
            .unwrap();
        assert_eq!(resp.access_token, "tok9");
        assert_eq!(resp.api_key.as_deref(), Some("key9"));

        let req = transport.last_request();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "http://api.test/token");
        assert_eq!(req.body_text(), Some("username=alice&password=pw123"));
        assert_eq!(
            req.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(req.header("Authorization"), None);
        assert_eq!(req.header("X-API-Key"), None);
    }

    #[test]
    fn form_encoding_escapes_reserved_characters() {
        let (client, transport) = client_with(Session::default());
        transport.reply(200, r#"{"access_token":"t"}"#);
        client
            .login(&LoginForm {
                username: "a b".into(),
                password: "p&w=1".into(),
            })
            .unwrap();
        assert_eq!(
            transport.last_request().body_text(),
            Some("username=a+b&password=p%26w%3D1")
        );
    }

    #[test]
    fn signup_is_json_without_credentials() {
        let (client, transport) = logged_in();
        transport.reply(
            200,
            r#"{"id":1,"username":"bob","email":"bob@example.com","api_key":"k"}"#,
        );

        let resp = client
            .signup(&Registration {
                username: "bob".into(),
                email: "bob@example.com".into(),
                password: "secret".into(),
            })
            .unwrap();
        assert_eq!(resp.api_key.as_deref(), Some("k"));

        let req = transport.last_request();
        assert_eq!(req.url, "http://api.test/signup");
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("Authorization"), None);
        let body: Value = serde_json::from_str(req.body_text().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"username": "bob", "email": "bob@example.com", "password": "secret"})
        );
    }

    #[test]
    fn authenticated_calls_carry_both_headers() {
        let (client, transport) = logged_in();
        transport.reply(200, &format!("[{TASK_JSON}]"));

        let tasks = client.list_tasks().unwrap();
        assert_eq!(tasks.len(), 1);

        let req = transport.last_request();
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.url, "http://api.test/tasks");
        assert_eq!(req.header("X-API-Key"), Some("key1"));
        assert_eq!(req.header("Authorization"), Some("Bearer tok1"));
        assert_eq!(req.body, None);
        assert_eq!(req.header("Content-Type"), None);
    }

    #[test]
    fn missing_credentials_are_not_sent() {
        let (client, transport) = client_with(Session::default());
        transport.reply(401, r#"{"detail":"Not authenticated"}"#);

        let err = client.list_tasks().unwrap_err();
        let req = transport.last_request();
        assert_eq!(req.header("X-API-Key"), None);
        assert_eq!(req.header("Authorization"), None);
        assert_eq!(err.status(), Some(401));
        assert_eq!(err.to_string(), "Not authenticated");
    }

    #[test]
    fn session_changes_are_seen_by_the_next_request() {
        let shared = SessionStore::open(Box::new(MemoryStorage::default())).into_shared();
        let transport = FakeTransport::default();
        let client = ApiClient::new("http://api.test", transport.clone(), shared.clone());

        shared
            .lock()
            .unwrap()
            .save(Session::new("fresh".into(), Some("k".into()), "alice".into()))
            .unwrap();
        transport.reply(200, "[]");
        client.list_tasks().unwrap();
        assert_eq!(
            transport.last_request().header("Authorization"),
            Some("Bearer fresh")
        );
    }

    #[test]
    fn create_posts_json_body() {
        let (client, transport) = logged_in();
        transport.reply(201, TASK_JSON);

        let task = client
            .create_task(&NewTask {
                title: "Buy milk".into(),
                description: "2%".into(),
                status: TaskStatus::Pending,
            })
            .unwrap();
        assert_eq!(task.title, "Buy milk");

        let req = transport.last_request();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.url, "http://api.test/tasks");
        let body: Value = serde_json::from_str(req.body_text().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"title": "Buy milk", "description": "2%", "status": "pending"})
        );
    }

    #[test]
    fn update_status_is_partial_put() {
        let (client, transport) = logged_in();
        transport.reply(200, TASK_JSON);

        client.update_status(1, TaskStatus::Completed).unwrap();

        let req = transport.last_request();
        assert_eq!(req.method, Method::Put);
        assert_eq!(req.url, "http://api.test/tasks/1");
        let body: Value = serde_json::from_str(req.body_text().unwrap()).unwrap();
        assert_eq!(body, json!({"status": "completed"}));
    }

    #[test]
    fn delete_accepts_empty_body() {
        let (client, transport) = logged_in();
        transport.reply(204, "");

        client.delete_task(5).unwrap();
        let req = transport.last_request();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(req.url, "http://api.test/tasks/5");
    }

    #[test]
    fn empty_body_is_null_not_a_parse_failure() {
        let (client, transport) = logged_in();
        transport.reply(200, "   ");
        let value = client
            .request::<()>(&Endpoint::get_task(1), None)
            .unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn get_task_hits_item_route() {
        let (client, transport) = logged_in();
        transport.reply(200, TASK_JSON);
        let task = client.get_task(1).unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(transport.last_request().url, "http://api.test/tasks/1");
    }

    #[test]
    fn forbidden_detail_is_verbatim() {
        let (client, transport) = logged_in();
        transport.reply(403, r#"{"detail":"Invalid API key"}"#);
        let err = client.get_task(1).unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 403, .. }));
        assert_eq!(err.to_string(), "Invalid API key");
    }

    #[test]
    fn error_without_detail_gets_generic_message() {
        let (client, transport) = logged_in();
        transport.reply(500, "");
        let err = client.list_tasks().unwrap_err();
        assert_eq!(err.to_string(), "Request failed with status 500");
    }

    #[test]
    fn html_error_page_gets_generic_message() {
        let (client, transport) = logged_in();
        transport.reply(502, "<html>Bad Gateway</html>");
        let err = client.list_tasks().unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 502, .. }));
        assert_eq!(err.to_string(), "Request failed with status 502");
    }

    #[test]
    fn validation_errors_join_messages() {
        let (client, transport) = logged_in();
        transport.reply(
            422,
            r#"{"detail":[{"loc":["body","title"],"msg":"field required"},{"msg":"value is not a valid email address"}]}"#,
        );
        let err = client.list_tasks().unwrap_err();
        assert_eq!(
            err.to_string(),
            "field required; value is not a valid email address"
        );
    }

    #[test]
    fn invalid_json_on_success_is_parse_failure() {
        let (client, transport) = logged_in();
        transport.reply(200, "{not json");
        let err = client.list_tasks().unwrap_err();
        assert!(matches!(err, ApiError::Parse { status: 200, .. }));
    }

    #[test]
    fn wrong_shape_is_parse_failure() {
        let (client, transport) = logged_in();
        transport.reply(200, r#"{"unexpected":true}"#);
        let err = client.list_tasks().unwrap_err();
        assert!(matches!(err, ApiError::Parse { .. }));
    }

    #[test]
    fn network_failure_has_no_status() {
        let (client, transport) = logged_in();
        transport.fail("connection refused");
        let err = client.list_tasks().unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "network error: connection refused");
    }

    #[test]
    fn each_call_is_sent_exactly_once() {
        let (client, transport) = logged_in();
        transport.reply(500, "");
        let _ = client.delete_task(1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn endpoint_descriptors_mark_unauthenticated_routes() {
        assert!(!Endpoint::signup().authenticated);
        assert!(!Endpoint::token().authenticated);
        assert_eq!(Endpoint::token().encoding, Encoding::FormUrlEncoded);
        for ep in [
            Endpoint::list_tasks(),
            Endpoint::create_task(),
            Endpoint::get_task(1),
            Endpoint::update_task(1),
            Endpoint::delete_task(1),
        ] {
            assert!(ep.authenticated, "{} should be authenticated", ep.path);
            assert_eq!(ep.encoding, Encoding::Json);
        }
    }
}
