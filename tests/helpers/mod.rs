#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use kconsole::config::{ConsoleConfig, HttpConfig};
use kconsole::error::{ConsoleError, Result};
use kconsole::kafka::{
    BrokerListing, BrokerTransport, ConnectionConfig, DeliveryReceipt, OutboundMessage, PollOutcome, RawRecord,
    SampleSource,
};
use kconsole::metadata::NormalizedRecord;

pub const USER: &str = "alice";
pub const PASSWORD: &str = "s3cret";
const SESSION_COOKIE: &str = "KSESSION=granted";

// ==========================================
// MOCK MANAGEMENT FRONTEND
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoginMode {
    /// Landing page is served straight away.
    Open,
    /// Landing page redirects to a local login form.
    Direct,
    /// Login page links to a Keycloak-like SSO page.
    Sso,
    /// Login page without any usable form.
    NoForm,
    /// Login form whose action cannot be resolved to a URL.
    BadAction,
}

pub struct MockState {
    pub mode: LoginMode,
    pub topics: Mutex<Vec<String>>,
    pub broker_count: AtomicUsize,
    pub group_count: AtomicUsize,
    /// Pages answering 500, keyed `"{segment}:{page}"`.
    pub failing_pages: Mutex<Vec<String>>,
    pub api_delay_ms: AtomicU64,
    /// Delay of the landing page, which every login starts with.
    pub landing_delay_ms: AtomicU64,
    pub posts: AtomicUsize,
    /// Every API listing request, as `"{segment}:{page}"`.
    pub requests: Mutex<Vec<String>>,
}

impl MockState {
    pub fn listing_requests(&self, segment: &str) -> Vec<u32> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| r.split_once(':'))
            .filter(|(s, _)| *s == segment)
            .filter_map(|(_, p)| p.parse().ok())
            .collect()
    }

    pub fn set_topics(&self, names: &[&str]) {
        *self.topics.lock() = names.iter().map(|s| s.to_string()).collect();
    }
}

pub struct MockFrontend {
    pub url: String,
    pub state: Arc<MockState>,
}

impl MockFrontend {
    pub async fn start(mode: LoginMode) -> Self {
        let state = Arc::new(MockState {
            mode,
            topics: Mutex::new(vec!["orders".to_string(), "orders-dlq".to_string(), "PAYMENTS_DLQ".to_string()]),
            broker_count: AtomicUsize::new(3),
            group_count: AtomicUsize::new(2),
            failing_pages: Mutex::new(Vec::new()),
            api_delay_ms: AtomicU64::new(0),
            landing_delay_ms: AtomicU64::new(0),
            posts: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/", get(landing))
            .route("/login", get(login_page).post(login_submit))
            .route("/oauth2/authorization/keycloak", get(sso_redirect))
            .route("/realms/ops/protocol/openid-connect/auth", get(sso_page))
            .route("/realms/ops/login-actions/authenticate", axum::routing::post(login_submit))
            .route("/rules", get(rules))
            .route("/api/clusters", get(clusters))
            .route("/api/clusters/{cluster}/{segment}", get(listing))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }
}

fn has_session(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains(SESSION_COOKIE))
}

async fn landing(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    let delay = state.landing_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.mode == LoginMode::Open || has_session(&headers) {
        return Html("<html><body><h1>Dashboard</h1></body></html>").into_response();
    }
    Redirect::to("/login").into_response()
}

async fn login_page(State(state): State<Arc<MockState>>) -> Html<&'static str> {
    match state.mode {
        LoginMode::Sso => Html(
            r#"<html><body><a href="/help">Help</a>
               <a href="/oauth2/authorization/keycloak">Log in with SSO</a></body></html>"#,
        ),
        LoginMode::NoForm => Html("<html><body><p>Maintenance</p></body></html>"),
        LoginMode::BadAction => Html(
            r#"<html><body><form action="http://[::1" method="post">
                 <input type="text" name="username">
                 <input type="password" name="password">
               </form></body></html>"#,
        ),
        _ => Html(
            r#"<html><body><form action="/login" method="post">
                 <input type="text" name="username">
                 <input type="password" name="password">
                 <input type="hidden" name="_csrf" value="tok-1">
                 <input type="submit" value="Sign in">
               </form></body></html>"#,
        ),
    }
}

async fn sso_redirect() -> Redirect {
    Redirect::to("/realms/ops/protocol/openid-connect/auth?client_id=kafka-ui")
}

async fn sso_page() -> Html<&'static str> {
    Html(
        r#"<html><body>
             <form id="kc-form-login" action="/realms/ops/login-actions/authenticate?session_code=c1" method="post">
               <input type="hidden" name="session_state" value="st-9">
               <input type="text" name="username">
               <input type="password" name="password">
             </form></body></html>"#,
    )
}

async fn login_submit(State(state): State<Arc<MockState>>, Form(form): Form<HashMap<String, String>>) -> Response {
    state.posts.fetch_add(1, Ordering::SeqCst);

    let expected_hidden = match state.mode {
        LoginMode::Sso => ("session_state", "st-9"),
        _ => ("_csrf", "tok-1"),
    };
    let hidden_ok = form.get(expected_hidden.0).map(String::as_str) == Some(expected_hidden.1);
    let creds_ok = form.get("username").map(String::as_str) == Some(USER)
        && form.get("password").map(String::as_str) == Some(PASSWORD);

    if hidden_ok && creds_ok {
        return (
            [(header::SET_COOKIE, format!("{}; Path=/", SESSION_COOKIE))],
            Redirect::to("/"),
        )
            .into_response();
    }

    Html(
        r#"<html><body><div class="alert alert-error">Invalid username or password.</div>
           <form><input name="username"><input type="password" name="password"></form></body></html>"#,
    )
    .into_response()
}

async fn rules() -> &'static str {
    "rule-a\nrule-b"
}

async fn clusters() -> Json<Value> {
    Json(json!([{"name": "local", "status": "online"}, {"name": "backup"}]))
}

async fn listing(
    State(state): State<Arc<MockState>>,
    Path((_cluster, segment)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let page: usize = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let per_page: usize = query.get("perPage").and_then(|p| p.parse().ok()).unwrap_or(100);
    let key = format!("{}:{}", segment, page);
    state.requests.lock().push(key.clone());

    let delay = state.api_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if state.failing_pages.lock().contains(&key) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let window = |total: usize| {
        let start = (page.saturating_sub(1) * per_page).min(total);
        start..(start + per_page).min(total)
    };

    let body = match segment.as_str() {
        "topics" => {
            let topics = state.topics.lock().clone();
            let items: Vec<Value> = topics[window(topics.len())]
                .iter()
                .map(|name| json!({"name": name, "partitionCount": 3, "segmentSize": 1024}))
                .collect();
            json!({"pageCount": 5, "topics": items})
        }
        "brokers" => {
            let total = state.broker_count.load(Ordering::SeqCst);
            let items: Vec<Value> = window(total)
                .map(|i| json!({"id": i, "host": format!("broker-{}", i), "port": 9092}))
                .collect();
            Value::Array(items)
        }
        "consumers" => {
            let total = state.group_count.load(Ordering::SeqCst);
            let items: Vec<Value> = window(total)
                .map(|i| json!({"groupId": format!("group-{}", i), "members": 1, "consumerLag": i}))
                .collect();
            json!({"pageCount": 1, "consumerGroups": items})
        }
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    Json(body).into_response()
}

pub fn fast_config() -> ConsoleConfig {
    let mut config = ConsoleConfig::default();
    config.http = HttpConfig {
        request_timeout_ms: 5_000,
        submit_timeout_ms: 5_000,
        accept_invalid_certs: true,
    };
    config.metadata.page_size = 10;
    config.dlq.idle_timeout_ms = 300;
    config.dlq.poll_interval_ms = 20;
    config
}

// ==========================================
// IN-MEMORY BROKER
// ==========================================

#[derive(Debug, Clone)]
pub enum FakeItem {
    Record(RawRecord),
    Error(String),
}

pub fn record(offset: i64, value: &[u8]) -> FakeItem {
    FakeItem::Record(RawRecord {
        partition: 0,
        offset,
        key: Some(format!("k{}", offset).into_bytes()),
        value: Some(value.to_vec()),
        create_time_ms: Some(1_700_000_000_000),
    })
}

#[derive(Default)]
pub struct FakeBroker {
    pub produced: Mutex<Vec<OutboundMessage>>,
    pub produce_calls: AtomicUsize,
    pub open_calls: AtomicUsize,
    pub closed: Arc<AtomicUsize>,
    pub group_ids: Mutex<Vec<String>>,
    pub topics: Mutex<HashMap<String, Vec<FakeItem>>>,
    pub reject_produce: AtomicBool,
    /// Brokers and topic names answered by `list_cluster`.
    pub listing: Mutex<BrokerListing>,
    pub list_calls: AtomicUsize,
    pub unreachable: AtomicBool,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_topic(self: &Arc<Self>, topic: &str, items: Vec<FakeItem>) -> Arc<Self> {
        self.topics.lock().insert(topic.to_string(), items);
        self.clone()
    }

    pub fn with_cluster(self: &Arc<Self>, brokers: usize, topics: &[&str]) -> Arc<Self> {
        *self.listing.lock() = BrokerListing {
            brokers: (0..brokers)
                .map(|i| NormalizedRecord::Broker { host: format!("kafka-{}", i), id: i as i64, port: 9092 })
                .collect(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
        };
        self.clone()
    }
}

#[async_trait]
impl BrokerTransport for FakeBroker {
    async fn produce(&self, _config: &ConnectionConfig, message: &OutboundMessage) -> Result<DeliveryReceipt> {
        self.produce_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_produce.load(Ordering::SeqCst) {
            return Err(ConsoleError::Broker("Message production error: MsgSizeTooLarge".to_string()));
        }
        let mut produced = self.produced.lock();
        produced.push(message.clone());
        Ok(DeliveryReceipt {
            topic: message.topic().to_string(),
            partition: message.partition().unwrap_or(0),
            offset: produced.len() as i64 - 1,
        })
    }

    fn open_sample_source(&self, _config: &ConnectionConfig, group_id: &str) -> Result<Box<dyn SampleSource>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.group_ids.lock().push(group_id.to_string());
        Ok(Box::new(FakeSource {
            topics: self.topics.lock().clone(),
            pending: VecDeque::new(),
            closed: self.closed.clone(),
            is_closed: false,
        }))
    }

    async fn list_cluster(&self, _config: &ConnectionConfig) -> Result<BrokerListing> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ConsoleError::Broker("Meta data fetch error: BrokerTransportFailure".to_string()));
        }
        Ok(self.listing.lock().clone())
    }
}

pub struct FakeSource {
    topics: HashMap<String, Vec<FakeItem>>,
    pending: VecDeque<FakeItem>,
    closed: Arc<AtomicUsize>,
    is_closed: bool,
}

impl SampleSource for FakeSource {
    fn assign_from_earliest(&mut self, topic: &str) -> Result<Vec<i32>> {
        match self.topics.get(topic) {
            Some(items) => {
                self.pending = items.iter().cloned().collect();
                Ok(vec![0])
            }
            None => Ok(Vec::new()),
        }
    }

    fn poll(&mut self, timeout: Duration) -> PollOutcome {
        match self.pending.pop_front() {
            Some(FakeItem::Record(r)) => PollOutcome::Record(r),
            Some(FakeItem::Error(e)) => PollOutcome::Error(e),
            None => {
                std::thread::sleep(timeout);
                PollOutcome::Empty
            }
        }
    }

    fn close(&mut self) {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
