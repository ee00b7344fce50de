use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEMO_LOGIN: &str = "demo@example.com";
pub const DEMO_HASH: &str = "demo-hash";
pub const SESSION_COOKIE: &str = "session_id";
pub const DEFAULT_LIMIT_ROWS: usize = 500;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub color: String,
    pub name: String,
    pub sort: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub sort: i64,
    pub is_main: bool,
    pub statuses: BTreeMap<String, Status>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub pipeline_id: i64,
    pub status_id: i64,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "USER_LOGIN")]
    pub login: String,
    #[serde(rename = "USER_HASH")]
    pub hash: String,
}

#[derive(Deserialize)]
pub struct NewPipeline {
    pub name: String,
    #[serde(default)]
    pub statuses: BTreeMap<String, Status>,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub sort: i64,
}

#[derive(Deserialize)]
pub struct PipelineUpdate {
    pub name: Option<String>,
    pub is_main: Option<bool>,
    pub sort: Option<i64>,
    pub statuses: Option<BTreeMap<String, Status>>,
}

#[derive(Default, Deserialize)]
pub struct PipelineChanges {
    #[serde(default)]
    pub add: Vec<NewPipeline>,
    #[serde(default)]
    pub update: BTreeMap<String, PipelineUpdate>,
}

#[derive(Deserialize)]
pub struct SetPipelinesBody {
    pub pipelines: PipelineChanges,
}

#[derive(Deserialize)]
pub struct SetPipelinesRequest {
    pub request: SetPipelinesBody,
}

#[derive(Deserialize)]
pub struct DeletePipelineBody {
    pub id: i64,
}

#[derive(Deserialize)]
pub struct DeletePipelineRequest {
    pub request: DeletePipelineBody,
}

#[derive(Deserialize)]
pub struct NewLead {
    pub name: String,
    pub pipeline_id: i64,
    pub status_id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct LeadUpdate {
    pub id: i64,
    pub status_id: i64,
    pub updated_at: i64,
}

#[derive(Deserialize)]
pub struct SetLeadsRequest {
    #[serde(default)]
    pub add: Vec<NewLead>,
    #[serde(default)]
    pub update: Vec<LeadUpdate>,
}

#[derive(Debug)]
pub struct Store {
    login: String,
    hash: String,
    sessions: HashSet<Uuid>,
    pipelines: BTreeMap<i64, Pipeline>,
    leads: BTreeMap<i64, Lead>,
    next_id: i64,
}

impl Store {
    fn new(login: &str, hash: &str) -> Self {
        Self {
            login: login.to_string(),
            hash: hash.to_string(),
            sessions: HashSet::new(),
            pipelines: BTreeMap::new(),
            leads: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Router accepting the demo credentials.
pub fn app() -> Router {
    app_for(DEMO_LOGIN, DEMO_HASH)
}

pub fn app_for(login: &str, hash: &str) -> Router {
    let db: Db = Arc::new(RwLock::new(Store::new(login, hash)));
    Router::new()
        .route("/private/api/auth.php", post(login_handler))
        .route("/private/api/v2/json/pipelines/list", get(list_pipelines))
        .route("/private/api/v2/json/pipelines/set", post(set_pipelines))
        .route("/private/api/v2/json/pipelines/delete", post(delete_pipeline))
        .route("/api/v2/leads", get(list_leads).post(set_leads))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Extract the session id from the `Cookie` header(s).
pub fn session_from(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().strip_prefix(SESSION_COOKIE)?.strip_prefix('='))
        .find_map(|id| id.parse().ok())
}

async fn authorize(db: &Db, headers: &HeaderMap) -> Result<(), StatusCode> {
    let session = session_from(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if db.read().await.sessions.contains(&session) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

fn id_filter(query: &HashMap<String, String>) -> Result<Option<i64>, StatusCode> {
    query
        .get("id")
        .map(|id| id.parse().map_err(|_| StatusCode::BAD_REQUEST))
        .transpose()
}

async fn login_handler(State(db): State<Db>, Json(input): Json<LoginRequest>) -> Response {
    let mut store = db.write().await;
    if input.login != store.login || input.hash != store.hash {
        info!(login = %input.login, "login rejected");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"response": {"auth": false}})),
        )
            .into_response();
    }
    let session = Uuid::new_v4();
    store.sessions.insert(session);
    info!(login = %input.login, "login accepted");
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}={session}; Path=/"))],
        Json(json!({"response": {"auth": true}})),
    )
        .into_response()
}

async fn list_pipelines(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&db, &headers).await?;
    let filter = id_filter(&query)?;
    let store = db.read().await;
    let pipelines: Map<String, Value> = store
        .pipelines
        .values()
        .filter(|p| filter.is_none_or(|id| p.id == id))
        .map(|p| (p.id.to_string(), json!(p)))
        .collect();
    debug!(count = pipelines.len(), "listed pipelines");
    Ok(Json(json!({"response": {"pipelines": pipelines}})))
}

async fn set_pipelines(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<SetPipelinesRequest>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&db, &headers).await?;
    let changes = input.request.pipelines;
    let mut store = db.write().await;

    // Reject the whole batch before applying any of it.
    for key in changes.update.keys() {
        let id: i64 = key.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
        if !store.pipelines.contains_key(&id) {
            return Err(StatusCode::NOT_FOUND);
        }
    }

    let mut added = Vec::new();
    for new in changes.add {
        let id = store.allocate_id();
        store.pipelines.insert(
            id,
            Pipeline {
                id,
                name: new.name,
                sort: new.sort,
                is_main: new.is_main,
                statuses: new.statuses,
            },
        );
        added.push(json!({"id": id}));
    }

    let mut updated = Vec::new();
    for (key, update) in changes.update {
        let id: i64 = key.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
        let pipeline = store.pipelines.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
        if let Some(name) = update.name {
            pipeline.name = name;
        }
        if let Some(is_main) = update.is_main {
            pipeline.is_main = is_main;
        }
        if let Some(sort) = update.sort {
            pipeline.sort = sort;
        }
        if let Some(statuses) = update.statuses {
            pipeline.statuses = statuses;
        }
        updated.push(id);
    }

    Ok(Json(
        json!({"response": {"pipelines": {"add": added, "update": updated}}}),
    ))
}

async fn delete_pipeline(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<DeletePipelineRequest>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&db, &headers).await?;
    let id = input.request.id;
    let mut store = db.write().await;
    store.pipelines.remove(&id).ok_or(StatusCode::NOT_FOUND)?;
    store.leads.retain(|_, lead| lead.pipeline_id != id);
    Ok(Json(json!({"response": {"pipelines": {"delete": [id]}}})))
}

async fn list_leads(
    State(db): State<Db>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, StatusCode> {
    authorize(&db, &headers).await?;
    let filter = id_filter(&query)?;
    let limit = match query.get("limit_rows") {
        Some(limit) => limit.parse().map_err(|_| StatusCode::BAD_REQUEST)?,
        None => DEFAULT_LIMIT_ROWS,
    };
    let store = db.read().await;
    let items: Vec<&Lead> = store
        .leads
        .values()
        .filter(|lead| filter.is_none_or(|id| lead.id == id))
        .take(limit)
        .collect();
    if items.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(json!({"_embedded": {"items": items}})).into_response())
}

async fn set_leads(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<SetLeadsRequest>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut store = db.write().await;

    if input
        .add
        .iter()
        .any(|lead| !store.pipelines.contains_key(&lead.pipeline_id))
    {
        return Err(StatusCode::BAD_REQUEST);
    }
    if input
        .update
        .iter()
        .any(|update| !store.leads.contains_key(&update.id))
    {
        return Err(StatusCode::NOT_FOUND);
    }

    let mut items = Vec::new();
    for new in input.add {
        let id = store.allocate_id();
        store.leads.insert(
            id,
            Lead {
                id,
                name: new.name,
                pipeline_id: new.pipeline_id,
                status_id: new.status_id,
                updated_at: 0,
                extra: new.extra,
            },
        );
        items.push(json!({"id": id}));
    }
    for update in input.update {
        if let Some(lead) = store.leads.get_mut(&update.id) {
            lead.status_id = update.status_id;
            lead.updated_at = update.updated_at;
            items.push(json!({"id": update.id}));
        }
    }
    Ok(Json(json!({"_embedded": {"items": items}})))
}
