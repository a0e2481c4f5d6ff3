//! Cookie-bearing HTTP session against the cluster-management frontend.

use std::sync::Arc;
use parking_lot::RwLock;
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, error, info, warn};
use crate::auth::forms::{self, LoginForm};
use crate::config::HttpConfig;
use crate::error::{AuthError, ConsoleError, Result};
use crate::metadata::shapes::cluster_names;

pub const DEFAULT_CLUSTER: &str = "default";
const MAX_REDIRECTS: usize = 10;

/// Where the login page sent us.
fn is_login_url(url: &Url) -> bool {
    let lower = url.as_str().to_lowercase();
    lower.contains("login") || lower.contains("auth")
}

fn auth_network(e: reqwest::Error) -> ConsoleError {
    AuthError::Network(e.to_string()).into()
}

pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConsoleError::Configuration("management URL is required".to_string()));
    }
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&with_slash)
        .map_err(|e| ConsoleError::Configuration(format!("invalid management URL '{}': {}", trimmed, e)))
}

// ==========================================
// SESSION
// ==========================================

pub struct AuthSession {
    base_url: Url,
    client: Client,
    jar: Arc<Jar>,
    cluster: RwLock<String>,
    http: HttpConfig,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("base_url", &self.base_url.as_str())
            .field("cluster", &*self.cluster.read())
            .finish()
    }
}

impl AuthSession {
    fn new(base_url: Url, http: &HttpConfig) -> Result<Self> {
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .danger_accept_invalid_certs(http.accept_invalid_certs)
            .timeout(http.request_timeout())
            .build()
            .map_err(|e| ConsoleError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            client,
            jar,
            cluster: RwLock::new(DEFAULT_CLUSTER.to_string()),
            http: http.clone(),
        })
    }

    /// Logs in to the frontend at `base_url`. An already-authenticated landing
    /// page succeeds without submitting anything; otherwise the SSO link is
    /// followed when present, else the page's own login form is submitted.
    pub async fn login(base_url: &str, username: &str, password: &str, http: &HttpConfig) -> Result<Self> {
        let base = normalize_base_url(base_url)?;
        let session = Self::new(base, http)?;
        info!("Logging in to {} as '{}'", session.base_url, username);

        let resp = session.client.get(session.base_url.clone()).send().await.map_err(auth_network)?;
        let page_url = resp.url().clone();
        let body = resp.text().await.map_err(auth_network)?;

        if !is_login_url(&page_url) {
            info!("Already authenticated at {}", page_url);
            return Ok(session);
        }

        let outcome = if let Some(href) = forms::find_sso_link(&body) {
            session.sso_login(&page_url, &href, username, password).await
        } else if let Some(form) = forms::find_login_form(&body) {
            session.direct_login(&page_url, &form, username, password).await
        } else {
            Err(AuthError::NoLoginForm.into())
        };

        match outcome {
            Ok(()) => {
                info!("Login to {} succeeded", session.base_url);
                Ok(session)
            }
            Err(e) => {
                error!("Login to {} failed: {}", session.base_url, e);
                Err(e)
            }
        }
    }

    async fn sso_login(&self, page_url: &Url, href: &str, username: &str, password: &str) -> Result<()> {
        let sso_url = page_url
            .join(href)
            .map_err(|e| AuthError::SsoRedirect(format!("bad SSO link '{}': {}", href, e)))?;
        debug!("Following SSO link {}", sso_url);

        let resp = self.client.get(sso_url).send().await.map_err(auth_network)?;
        let sso_page = resp.url().clone();
        let body = resp.text().await.map_err(auth_network)?;

        let form = forms::first_form(&body)
            .ok_or_else(|| AuthError::SsoRedirect("no form on the SSO page".to_string()))?;
        let action = form
            .action
            .as_deref()
            .ok_or_else(|| AuthError::SsoRedirect("SSO form has no action".to_string()))?;
        let target = sso_page
            .join(action)
            .map_err(|e| AuthError::SsoRedirect(format!("bad SSO form action '{}': {}", action, e)))?;

        self.submit(target, &form.sso_submission(username, password)).await
    }

    async fn direct_login(&self, page_url: &Url, form: &LoginForm, username: &str, password: &str) -> Result<()> {
        let target = match form.action.as_deref() {
            Some(action) => page_url
                .join(action)
                .map_err(|e| AuthError::BadForm(format!("bad form action '{}': {}", action, e)))?,
            None => page_url.clone(),
        };
        debug!("Submitting login form to {}", target);
        self.submit(target, &form.direct_submission(username, password)).await
    }

    async fn submit(&self, target: Url, data: &[(String, String)]) -> Result<()> {
        let resp = self
            .client
            .post(target)
            .timeout(self.http.submit_timeout())
            .form(data)
            .send()
            .await
            .map_err(auth_network)?;

        let status = resp.status();
        let landed = resp.url().clone();
        if status == StatusCode::OK && !landed.as_str().to_lowercase().contains("login") {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        let message = forms::extract_error_message(&body).unwrap_or_else(|| "invalid credentials".to_string());
        debug!("Login rejected (status {}, landed on {})", status, landed);
        Err(AuthError::InvalidCredentials(message).into())
    }

    /// Logs in and resolves the cluster name in one go.
    pub async fn test_connection(
        base_url: &str,
        username: &str,
        password: &str,
        http: &HttpConfig,
    ) -> Result<(Self, Vec<String>)> {
        let session = Self::login(base_url, username, password, http).await?;
        let clusters = session.resolve_cluster().await?;
        Ok((session, clusters))
    }

    /// Drops the session together with its cookies.
    pub fn logout(self) {
        info!("Logged out of {}", self.base_url);
    }

    // ---------- API access ----------

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn cluster(&self) -> String {
        self.cluster.read().clone()
    }

    pub fn set_cluster(&self, name: impl Into<String>) {
        *self.cluster.write() = name.into();
    }

    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    /// Resolves `path` (no leading slash) against the base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ConsoleError::Configuration(format!("invalid API path '{}': {}", path, e)))
    }

    /// GETs a JSON document. Non-200 answers are `Network`, undecodable bodies
    /// are `ApiFormat`.
    pub async fn get_json(&self, url: Url) -> Result<Value> {
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ConsoleError::Network(format!("GET {} returned {}", url.path(), status)));
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ConsoleError::ApiFormat(format!("GET {}: {}", url.path(), e)))
    }

    /// Raw body of a frontend page, e.g. `fetch_text("rules")`.
    pub async fn fetch_text(&self, path: &str) -> Result<String> {
        let url = self.endpoint(path)?;
        let resp = self.client.get(url.clone()).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ConsoleError::Network(format!("GET {} returned {}", url.path(), status)));
        }
        Ok(resp.text().await?)
    }

    /// Adopts the first cluster listed by `/api/clusters`. An empty listing
    /// keeps the current name.
    pub async fn resolve_cluster(&self) -> Result<Vec<String>> {
        let body = self.get_json(self.endpoint("api/clusters")?).await?;
        let names = cluster_names(&body);
        match names.first() {
            Some(first) => {
                info!("Using cluster '{}'", first);
                self.set_cluster(first.clone());
            }
            None => warn!("No clusters listed, keeping '{}'", self.cluster()),
        }
        Ok(names)
    }
}
