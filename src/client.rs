//! HTTP client implementations for the VaultCore API
//!
//! [`BaseClient`] sends plain requests. [`ApiClient`] is the authenticated
//! surface used by everything else: it injects the bearer token, refreshes the
//! session once on a 401 and retries, and turns responses into JSON values or
//! typed errors.
//!
//! Concurrent 401s share a single refresh call. The refresh runs on its own
//! task and is registered under a mutex as a shared handle; callers that find
//! one attach to it, and the task unregisters it once its outcome has been
//! written to the store, whether or not anyone is still waiting.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

use vaultcore_protocol::{ErrorBody, RefreshTokenRequest, RefreshTokenResponse};

use crate::config::ClientConfig;
use crate::error::{Result, VaultError};
use crate::store::{FileSessionStore, MemorySessionStore, SessionStore};

pub const REFRESH_ENDPOINT: &str = "/api/auth/refresh";

const JSON_CONTENT_TYPE: &str = "application/json";
const DEFAULT_ERROR_MESSAGE: &str = "API Error";

/// Called once when an unrecoverable authorization failure wipes the session
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

type InFlightRefresh = Shared<BoxFuture<'static, Result<String>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
enum RequestBody {
    Json(Value),
    Text(String),
}

/// Method, headers and body of one API call.
///
/// `Content-Type: application/json` is sent unless a `Content-Type` header
/// is given here.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new(Method::GET)
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Raw body, sent as is
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Text(body.into()));
        self
    }

    /// Headers to send, with the bearer token (if any) taking precedence over
    /// a caller-supplied `Authorization` header.
    fn header_map(&self, bearer: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| VaultError::invalid_input(format!("Invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| VaultError::invalid_input(format!("Invalid value for header {name}: {e}")))?;
            headers.insert(name, value);
        }

        if let Some(token) = bearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| VaultError::invalid_input("Access token is not a valid header value"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    fn body_bytes(&self) -> Result<Option<Vec<u8>>> {
        Ok(match &self.body {
            Some(RequestBody::Json(value)) => Some(serde_json::to_vec(value)?),
            Some(RequestBody::Text(text)) => Some(text.clone().into_bytes()),
            None => None,
        })
    }
}

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// Base HTTP client for API operations
#[derive(Debug, Clone)]
pub struct BaseClient {
    client: Client,
    config: Arc<ClientConfig>,
}

impl BaseClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder().timeout(Duration::from_secs(config.timeout));

        if !config.use_proxy {
            client_builder = client_builder.no_proxy();
        }

        let client = client_builder.build()?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one request. `endpoint` is a path on the API backend or an
    /// absolute URL.
    pub async fn send(
        &self,
        endpoint: &str,
        options: &RequestOptions,
        bearer: Option<&str>,
    ) -> Result<RawResponse> {
        let url = self.config.endpoint_url(endpoint);

        let mut request_builder = self
            .client
            .request(options.method.clone(), &url)
            .headers(options.header_map(bearer)?);

        if let Some(body) = options.body_bytes()? {
            request_builder = request_builder.body(body);
        }

        let response = request_builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }

    pub async fn post_json<T: Serialize>(&self, endpoint: &str, payload: &T) -> Result<RawResponse> {
        let options = RequestOptions::post().json(serde_json::to_value(payload)?);
        self.send(endpoint, &options, None).await
    }

    /// POST an `application/x-www-form-urlencoded` body
    pub async fn post_form<T: Serialize>(&self, url: &str, form: &T) -> Result<RawResponse> {
        let response = self
            .client
            .post(self.config.endpoint_url(url))
            .form(form)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}

struct Inner {
    base: BaseClient,
    session: Arc<dyn SessionStore>,
    refresh: Arc<Mutex<Option<InFlightRefresh>>>,
    expiry: Mutex<()>,
    on_session_expired: Mutex<Option<SessionExpiredHook>>,
}

/// Authenticated API client with transparent session refresh.
///
/// Clones share the session store and the in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.inner.base)
            .field("refresh_in_flight", &lock(&self.inner.refresh).is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(config: ClientConfig, session: Arc<dyn SessionStore>) -> Result<Self> {
        let base = BaseClient::new(config)?;
        Ok(Self {
            inner: Arc::new(Inner {
                base,
                session,
                refresh: Arc::new(Mutex::new(None)),
                expiry: Mutex::new(()),
                on_session_expired: Mutex::new(None),
            }),
        })
    }

    /// Client whose session lives in `config.session_path`, or in memory
    /// when no path is configured
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let session: Arc<dyn SessionStore> = match &config.session_path {
            Some(path) => Arc::new(FileSessionStore::new(path)),
            None => Arc::new(MemorySessionStore::new()),
        };
        Self::new(config, session)
    }

    pub fn config(&self) -> &ClientConfig {
        self.inner.base.config()
    }

    pub fn base(&self) -> &BaseClient {
        &self.inner.base
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.inner.session
    }

    /// Register the side effect run when an authorization failure ends the
    /// session, typically returning the user to an unauthenticated entry
    /// point. Replaces any previous hook.
    pub fn on_session_expired<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock(&self.inner.on_session_expired) = Some(Arc::new(hook));
    }

    pub async fn request<R: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<R> {
        let value = self.request_value(endpoint, options).await?;
        into_typed(value)
    }

    /// Issue a request and return the parsed JSON body.
    ///
    /// An empty success body is `{}`. A success body that is markup fails
    /// with an invalid-response error.
    pub async fn request_value(&self, endpoint: &str, options: RequestOptions) -> Result<Value> {
        let token = self.inner.session.access_token();
        debug!(method = %options.method, endpoint, "API request");

        let mut response = self
            .inner
            .base
            .send(endpoint, &options, token.as_deref())
            .await?;

        if response.status == StatusCode::UNAUTHORIZED {
            debug!(endpoint, "Access token rejected, refreshing session");

            if let Err(e) = self.coalesced_refresh(token.as_deref()).await {
                warn!(error = %e, "Session refresh failed");
                return Err(self.expire_session());
            }

            let Some(fresh) = self.inner.session.access_token() else {
                return Err(self.expire_session());
            };

            debug!(method = %options.method, endpoint, "Retrying with refreshed token");
            response = self
                .inner
                .base
                .send(endpoint, &options, Some(fresh.as_str()))
                .await?;

            if response.status == StatusCode::UNAUTHORIZED {
                warn!(endpoint, "Refreshed token rejected");
                return Err(self.expire_session());
            }
        }

        interpret_response(response)
    }

    pub async fn get<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R> {
        self.request(endpoint, RequestOptions::get()).await
    }

    pub async fn post<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let options = RequestOptions::post().json(serde_json::to_value(body)?);
        self.request(endpoint, options).await
    }

    pub async fn put<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let options = RequestOptions::put().json(serde_json::to_value(body)?);
        self.request(endpoint, options).await
    }

    pub async fn delete<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R> {
        self.request(endpoint, RequestOptions::delete()).await
    }

    /// Exchange the stored refresh token for a new access token, joining a
    /// refresh that is already in flight. Returns the new access token.
    ///
    /// A failed refresh ends the session the same way a failed retry does:
    /// the store is cleared, the session-expired hook runs, and the error is
    /// `SessionExpired`.
    pub async fn refresh_session(&self) -> Result<String> {
        match self.coalesced_refresh(None).await {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(error = %e, "Session refresh failed");
                Err(self.expire_session())
            }
        }
    }

    /// Join the in-flight refresh or start one. When `rejected_token` is no
    /// longer the stored token, a refresh has completed since it was sent and
    /// the stored token is returned without another network call.
    async fn coalesced_refresh(&self, rejected_token: Option<&str>) -> Result<String> {
        let pending = {
            let mut slot = lock(&self.inner.refresh);
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Joining in-flight session refresh");
                    pending.clone()
                }
                None => {
                    if let (Some(rejected), Some(current)) =
                        (rejected_token, self.inner.session.access_token())
                    {
                        if rejected != current {
                            debug!("Session already refreshed by another request");
                            return Ok(current);
                        }
                    }

                    let pending = self.start_refresh();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    fn start_refresh(&self) -> InFlightRefresh {
        let base = self.inner.base.clone();
        let session = Arc::clone(&self.inner.session);
        let slot = Arc::downgrade(&self.inner.refresh);

        // Runs to completion on its own task so a cancelled caller cannot
        // leave the slot holding a half-finished refresh.
        let task = tokio::spawn(async move {
            let outcome = perform_refresh(&base, session.as_ref()).await;
            clear_in_flight(&slot);
            outcome
        });

        task.map(|joined| {
            joined.unwrap_or_else(|e| {
                Err(VaultError::internal(format!("Session refresh task failed: {e}")))
            })
        })
        .boxed()
        .shared()
    }

    /// Wipe the session after an unrecoverable authorization failure. The
    /// hook runs only when a session was actually present, so concurrent
    /// failures notify once.
    fn expire_session(&self) -> VaultError {
        let _guard = lock(&self.inner.expiry);

        if self.inner.session.has_session() {
            self.inner.session.clear();
            info!("Session cleared after authorization failure");

            let hook = lock(&self.inner.on_session_expired).clone();
            if let Some(hook) = hook {
                hook();
            }
        }

        VaultError::session_expired()
    }
}

fn clear_in_flight(slot: &Weak<Mutex<Option<InFlightRefresh>>>) {
    if let Some(slot) = slot.upgrade() {
        lock(&slot).take();
    }
}

async fn perform_refresh(base: &BaseClient, session: &dyn SessionStore) -> Result<String> {
    let refresh_token = session
        .refresh_token()
        .ok_or_else(|| VaultError::authentication("No refresh token available"))?;

    let request = RefreshTokenRequest { refresh_token };
    let response = base.post_json(REFRESH_ENDPOINT, &request).await?;

    if !response.status.is_success() {
        return Err(VaultError::api(
            response.status.as_u16(),
            error_message(&response.body),
        ));
    }

    let tokens: RefreshTokenResponse = serde_json::from_str(&response.body).map_err(|e| {
        VaultError::authentication_with_source("Malformed refresh response", e)
    })?;

    let access_token = tokens
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| VaultError::authentication("Refresh response did not include an access token"))?;
    let rotated = tokens.refresh_token.filter(|token| !token.is_empty());

    session.replace_tokens(&access_token, rotated.as_deref());
    info!(rotated = rotated.is_some(), "Session refreshed");

    Ok(access_token)
}

/// Best-effort human-readable message from an error body: the `message`
/// field, then `error`, then the raw text.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .into_message()
            .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        Err(_) if body.trim().is_empty() => DEFAULT_ERROR_MESSAGE.to_string(),
        Err(_) => body.to_string(),
    }
}

fn interpret_response(response: RawResponse) -> Result<Value> {
    let status = response.status;
    if !status.is_success() {
        return Err(VaultError::api(status.as_u16(), error_message(&response.body)));
    }

    let body = response.body.trim();
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    match serde_json::from_str(body) {
        Ok(value) => Ok(value),
        Err(_) if body.starts_with('<') => Err(VaultError::invalid_response(
            status.as_u16(),
            "Invalid response from server (unexpected content type)",
        )),
        Err(e) => {
            warn!(status = status.as_u16(), error = %e, "Ignoring non-JSON success body");
            Ok(Value::Object(Map::new()))
        }
    }
}

/// Convert a response value to the caller's type. An empty body also
/// converts to `()` and `Option::None`.
fn into_typed<R: DeserializeOwned>(value: Value) -> Result<R> {
    let empty = value.as_object().is_some_and(Map::is_empty);
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(_) if empty => Ok(serde_json::from_value(Value::Null)?),
        Err(e) => Err(e.into()),
    }
}
