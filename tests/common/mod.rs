#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use api_conformance::client::{ApiClient, Credential};
use api_conformance::Config;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, Method, StatusCode},
    routing::{any, delete, get, post},
    Form, Json, Router,
};
use serde_json::{json, Value};

pub const API_KEY: &str = "test-key";
pub const RECIPE_ID: i64 = 716429;

type Params = Query<HashMap<String, String>>;
type Reply = (StatusCode, Json<Value>);

/// A local stand-in for the remote API, answering the way the real service
/// was observed to answer.
pub struct StubApi {
    pub base_url: String,
    pub state: Arc<StubState>,
}

#[derive(Default)]
pub struct StubState {
    users: Mutex<HashMap<String, StubUser>>,
    next_id: AtomicI64,
    pub connects: AtomicUsize,
    pub hits: AtomicUsize,
}

struct StubUser {
    hash: String,
    items: BTreeMap<i64, String>,
}

impl StubApi {
    pub async fn spawn() -> Self {
        let state = Arc::new(StubState {
            next_id: AtomicI64::new(1000),
            ..StubState::default()
        });

        let app = Router::new()
            .route("/recipes/{id}/information", get(recipe_information))
            .route("/recipes/{id}/similar", get(similar_recipes))
            .route("/recipes/cuisine", post(classify_cuisine))
            .route("/recipes/analyze", post(analyze_recipe))
            .route("/food/products/classify", post(classify_product))
            .route("/users/connect", post(connect_user))
            .route("/mealplanner/{username}/shopping-list/items", post(add_item))
            .route(
                "/mealplanner/{username}/shopping-list/items/{id}",
                delete(delete_item),
            )
            .route("/slow", get(slow))
            .route("/text", get(text))
            .route("/echo", any(echo))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn items_for(&self, username: &str) -> usize {
        self.state
            .users
            .lock()
            .expect("users lock")
            .get(username)
            .map_or(0, |user| user.items.len())
    }

    pub fn total_items(&self) -> usize {
        self.state
            .users
            .lock()
            .expect("users lock")
            .values()
            .map(|user| user.items.len())
            .sum()
    }
}

pub struct TestEnvironment {
    pub stub: StubApi,
    pub config: Config,
    pub client: ApiClient,
}

impl TestEnvironment {
    pub async fn new() -> Self {
        Self::with_config(|config| config.with_credential(Credential::new(API_KEY))).await
    }

    pub async fn without_credential() -> Self {
        Self::with_config(|config| config).await
    }

    pub async fn with_config(adjust: impl FnOnce(Config) -> Config) -> Self {
        init_test_logging();
        let stub = StubApi::spawn().await;
        let config = adjust(Config::new(stub.base_url.clone()).with_timeout(Duration::from_secs(5)));
        let client = ApiClient::new(&config);
        Self {
            stub,
            config,
            client,
        }
    }
}

/// A base URL nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind a throwaway listener");
    let addr = listener.local_addr().expect("throwaway listener address");
    drop(listener);
    format!("http://{}", addr)
}

pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

fn authorized(state: &StubState, params: &HashMap<String, String>) -> Result<(), Reply> {
    state.hits.fetch_add(1, Ordering::SeqCst);
    match params.get("apiKey") {
        Some(key) if key == API_KEY => Ok(()),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "failure", "code": 401, "message": "You are not authorized."})),
        )),
    }
}

fn not_found() -> Reply {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"status": "failure", "code": 404})),
    )
}

fn success(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

async fn recipe_information(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    Query(params): Params,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    match id.parse::<i64>() {
        Ok(RECIPE_ID) => {}
        _ => return not_found(),
    }

    let nutrition = match params.get("includeNutrition").map(String::as_str) {
        Some("true") => json!({"nutrients": [{"name": "Calories", "amount": 584.46}]}),
        _ => Value::Null,
    };
    success(json!({
        "id": RECIPE_ID,
        "title": "Pasta with Garlic, Scallions, Cauliflower & Breadcrumbs",
        "nutrition": nutrition,
    }))
}

async fn similar_recipes(
    State(state): State<Arc<StubState>>,
    Path(id): Path<String>,
    Query(params): Params,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    let Ok(id) = id.parse::<i64>() else {
        return not_found();
    };
    let number = match params.get("number").map(|n| n.parse::<usize>()) {
        None => 3,
        Some(Ok(n)) if (1..=100).contains(&n) => n,
        Some(Ok(_)) => 3,
        Some(Err(_)) => return not_found(),
    };
    if id != RECIPE_ID {
        return success(json!([]));
    }

    let recipes: Vec<Value> = (0..number)
        .map(|i| json!({"id": 1000 + i, "title": format!("Similar recipe {}", i)}))
        .collect();
    success(Value::Array(recipes))
}

async fn classify_cuisine(
    State(state): State<Arc<StubState>>,
    Query(params): Params,
    Form(form): Form<HashMap<String, String>>,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    let title = form.get("title").map(String::as_str).unwrap_or_default();
    let cuisine = if title.contains("Taco") {
        "Mexican"
    } else {
        "Mediterranean"
    };
    success(json!({"cuisine": cuisine, "cuisines": [cuisine], "confidence": 0.85}))
}

async fn analyze_recipe(
    State(state): State<Arc<StubState>>,
    Query(params): Params,
    body: String,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    match serde_json::from_str::<Value>(&body) {
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "failure", "code": 500})),
        ),
        Ok(value) if value.as_object().map_or(true, |o| o.is_empty()) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "failure", "code": 400})),
        ),
        Ok(value) => success(json!({"title": value["title"], "nutrition": null})),
    }
}

async fn classify_product(
    State(state): State<Arc<StubState>>,
    Query(params): Params,
    body: String,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    let Ok(value) = serde_json::from_str::<Value>(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "failure", "code": 400})),
        );
    };
    match value["title"].as_str() {
        Some(title) if !title.is_empty() => {
            let category = if title.contains("Peanut Butter") {
                "creamy peanut butter"
            } else {
                "2 percent milk"
            };
            success(json!({"cleanTitle": title, "category": category}))
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "failure", "code": 500})),
        ),
    }
}

async fn connect_user(
    State(state): State<Arc<StubState>>,
    Query(params): Params,
    body: String,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    state.connects.fetch_add(1, Ordering::SeqCst);
    let requested = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["username"].as_str().map(str::to_string))
        .unwrap_or_else(|| "anonymous".to_string());

    let n = state.next_id.fetch_add(1, Ordering::SeqCst);
    let username = format!("{}-{}", requested, n);
    let hash = format!("hash-{}", n);
    state.users.lock().expect("users lock").insert(
        username.clone(),
        StubUser {
            hash: hash.clone(),
            items: BTreeMap::new(),
        },
    );
    success(json!({"username": username, "hash": hash, "spoonacularPassword": "secret"}))
}

async fn add_item(
    State(state): State<Arc<StubState>>,
    Path(username): Path<String>,
    Query(params): Params,
    body: String,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    let item = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v["item"].as_str().map(str::to_string))
        .unwrap_or_default();
    let name = item.split_whitespace().last().unwrap_or_default().to_string();

    let mut users = state.users.lock().expect("users lock");
    match users.get_mut(&username) {
        Some(user) if params.get("hash") == Some(&user.hash) => {
            let id = state.next_id.fetch_add(1, Ordering::SeqCst);
            user.items.insert(id, name.clone());
            success(json!({"id": id, "name": name, "aisle": "Misc"}))
        }
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "failure", "code": 401})),
        ),
    }
}

async fn delete_item(
    State(state): State<Arc<StubState>>,
    Path((username, id)): Path<(String, String)>,
    Query(params): Params,
) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    let mut users = state.users.lock().expect("users lock");
    let Some(user) = users.get_mut(&username) else {
        return not_found();
    };
    if params.get("hash") != Some(&user.hash) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "failure", "code": 401})),
        );
    }
    match id.parse::<i64>().ok().and_then(|id| user.items.remove(&id)) {
        Some(_) => success(json!({"status": "success"})),
        None => not_found(),
    }
}

async fn slow(State(state): State<Arc<StubState>>, Query(params): Params) -> Reply {
    if let Err(reply) = authorized(&state, &params) {
        return reply;
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    success(json!({"status": "late"}))
}

async fn text() -> &'static str {
    "pong"
}

async fn echo(method: Method, Query(params): Params, headers: HeaderMap, body: String) -> Json<Value> {
    Json(json!({
        "method": method.as_str(),
        "query": params,
        "content_type": headers.get("content-type").and_then(|v| v.to_str().ok()),
        "body": body,
    }))
}
