//! In-process fake of the ServeRest API
#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path as FsPath;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serverest_tester::utils::Config;

type Reply = (StatusCode, Json<Value>);

const TOKEN_INVALID: &str =
    "Token de acesso ausente, inválido, expirado ou usuário utilizado no token não existe mais";

#[derive(Default)]
struct Store {
    users: HashMap<String, Value>,
    products: HashMap<String, Value>,
    /// Authorization header value -> user id
    tokens: HashMap<String, String>,
    /// user id -> cart id
    carts: HashMap<String, Value>,
    next_id: u64,
}

impl Store {
    fn id(&mut self) -> String {
        self.next_id += 1;
        format!("id{:014}", self.next_id)
    }
}

/// Shared state for the fake, with counters the tests assert on
#[derive(Default)]
pub struct FakeState {
    store: Mutex<Store>,
    pub user_creates: AtomicUsize,
    pub logins: AtomicUsize,
    /// Answer this many upcoming user creations with a duplicate e-mail error
    pub forced_duplicates: AtomicUsize,
}

impl FakeState {
    pub fn user_creates(&self) -> usize {
        self.user_creates.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn force_duplicates(&self, n: usize) {
        self.forced_duplicates.store(n, Ordering::SeqCst);
    }

    pub fn user_count(&self) -> usize {
        self.store.lock().map(|s| s.users.len()).unwrap_or(0)
    }

    pub fn product_count(&self) -> usize {
        self.store.lock().map(|s| s.products.len()).unwrap_or(0)
    }

    pub fn has_user(&self, email: &str) -> bool {
        self.store
            .lock()
            .map(|s| s.users.values().any(|u| u["email"] == email))
            .unwrap_or(false)
    }

    /// Delete every account, as the public service does periodically
    pub fn wipe_users(&self) {
        if let Ok(mut store) = self.store.lock() {
            store.users.clear();
            store.tokens.clear();
        }
    }
}

/// Start the fake on an ephemeral port; returns its base URL and state
pub async fn spawn() -> (String, Arc<FakeState>) {
    let state = Arc::new(FakeState::default());

    let app = Router::new()
        .route("/usuarios", get(list_users).post(create_user))
        .route(
            "/usuarios/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/login", post(login))
        .route("/produtos", get(list_products).post(create_product))
        .route(
            "/produtos/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/carrinhos", get(list_carts).post(create_cart))
        .route("/carrinhos/cancelar-compra", delete(cancel_purchase))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service()).await.unwrap();
    });

    (format!("http://{}", addr), state)
}

/// Config pointing at the fake with every file under `dir`
pub fn config_for(base_url: &str, dir: &FsPath) -> Config {
    let mut config = Config {
        base_url: base_url.to_string(),
        credentials_file: dir.join("fixtures").join("session-credentials.json"),
        reports_dir: dir.join("reports"),
        results_dir: dir.join("reports").join("results"),
        retries: 0,
        test_timeout_ms: 10_000,
        ..Config::default()
    };
    config.provisioning.initial_backoff_ms = 1;
    config.provisioning.max_backoff_ms = 5;
    config
}

fn reply(status: StatusCode, body: Value) -> Reply {
    (status, Json(body))
}

fn message(status: StatusCode, text: &str) -> Reply {
    reply(status, json!({ "message": text }))
}

/// Resolve the caller from the Authorization header; `admin` requires an administrator
fn authorize(store: &Store, headers: &HeaderMap, admin: bool) -> Result<String, Reply> {
    let user_id = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|token| store.tokens.get(token))
        .filter(|id| store.users.contains_key(*id))
        .ok_or_else(|| message(StatusCode::UNAUTHORIZED, TOKEN_INVALID))?;

    if admin && store.users[user_id]["administrador"] != "true" {
        return Err(message(
            StatusCode::FORBIDDEN,
            "Rota exclusiva para administradores",
        ));
    }
    Ok(user_id.clone())
}

fn filtered(items: Vec<&Value>, query: &HashMap<String, String>) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| {
            query.iter().all(|(key, expected)| match &item[key] {
                Value::String(s) => s == expected,
                Value::Number(n) => n.to_string() == *expected,
                _ => false,
            })
        })
        .cloned()
        .collect()
}

async fn list_users(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let store = state.store.lock().unwrap();
    let users = filtered(store.users.values().collect(), &query);
    reply(
        StatusCode::OK,
        json!({ "quantidade": users.len(), "usuarios": users }),
    )
}

async fn create_user(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Reply {
    state.user_creates.fetch_add(1, Ordering::SeqCst);

    let forced = state
        .forced_duplicates
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    let mut store = state.store.lock().unwrap();
    if forced || store.users.values().any(|u| u["email"] == body["email"]) {
        return message(StatusCode::BAD_REQUEST, "Este email já está sendo usado");
    }

    let id = store.id();
    let mut user = body;
    user["_id"] = json!(id);
    store.users.insert(id.clone(), user);
    reply(
        StatusCode::CREATED,
        json!({ "message": "Cadastro realizado com sucesso", "_id": id }),
    )
}

async fn get_user(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Reply {
    let store = state.store.lock().unwrap();
    match store.users.get(&id) {
        Some(user) => reply(StatusCode::OK, user.clone()),
        None => message(StatusCode::BAD_REQUEST, "Usuário não encontrado"),
    }
}

async fn update_user(
    State(state): State<Arc<FakeState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = state.store.lock().unwrap();
    let mut user = body;
    user["_id"] = json!(id);
    store.users.insert(id, user);
    message(StatusCode::OK, "Registro alterado com sucesso")
}

async fn delete_user(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Reply {
    let mut store = state.store.lock().unwrap();
    match store.users.remove(&id) {
        Some(_) => message(StatusCode::OK, "Registro excluído com sucesso"),
        None => message(StatusCode::OK, "Nenhum registro excluído"),
    }
}

async fn login(State(state): State<Arc<FakeState>>, Json(body): Json<Value>) -> Reply {
    state.logins.fetch_add(1, Ordering::SeqCst);

    let mut store = state.store.lock().unwrap();
    let user_id = store
        .users
        .values()
        .find(|u| u["email"] == body["email"] && u["password"] == body["password"])
        .and_then(|u| u["_id"].as_str())
        .map(str::to_string);

    match user_id {
        Some(user_id) => {
            let token = format!("Bearer token-{}", store.id());
            store.tokens.insert(token.clone(), user_id);
            reply(
                StatusCode::OK,
                json!({ "message": "Login realizado com sucesso", "authorization": token }),
            )
        }
        None => message(StatusCode::UNAUTHORIZED, "Email e/ou senha inválidos"),
    }
}

async fn list_products(
    State(state): State<Arc<FakeState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let store = state.store.lock().unwrap();
    let products = filtered(store.products.values().collect(), &query);
    reply(
        StatusCode::OK,
        json!({ "quantidade": products.len(), "produtos": products }),
    )
}

async fn create_product(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = state.store.lock().unwrap();
    if let Err(denied) = authorize(&store, &headers, true) {
        return denied;
    }
    if store.products.values().any(|p| p["nome"] == body["nome"]) {
        return message(StatusCode::BAD_REQUEST, "Já existe produto com esse nome");
    }

    let id = store.id();
    let mut product = body;
    product["_id"] = json!(id);
    store.products.insert(id.clone(), product);
    reply(
        StatusCode::CREATED,
        json!({ "message": "Cadastro realizado com sucesso", "_id": id }),
    )
}

async fn get_product(State(state): State<Arc<FakeState>>, Path(id): Path<String>) -> Reply {
    let store = state.store.lock().unwrap();
    match store.products.get(&id) {
        Some(product) => reply(StatusCode::OK, product.clone()),
        None => message(StatusCode::BAD_REQUEST, "Produto não encontrado"),
    }
}

async fn update_product(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = state.store.lock().unwrap();
    if let Err(denied) = authorize(&store, &headers, true) {
        return denied;
    }
    let mut product = body;
    product["_id"] = json!(id);
    store.products.insert(id, product);
    message(StatusCode::OK, "Registro alterado com sucesso")
}

async fn delete_product(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let mut store = state.store.lock().unwrap();
    if let Err(denied) = authorize(&store, &headers, true) {
        return denied;
    }
    match store.products.remove(&id) {
        Some(_) => message(StatusCode::OK, "Registro excluído com sucesso"),
        None => message(StatusCode::OK, "Nenhum registro excluído"),
    }
}

async fn list_carts(State(state): State<Arc<FakeState>>) -> Reply {
    let store = state.store.lock().unwrap();
    let carts: Vec<Value> = store.carts.values().cloned().collect();
    reply(
        StatusCode::OK,
        json!({ "quantidade": carts.len(), "carrinhos": carts }),
    )
}

async fn create_cart(
    State(state): State<Arc<FakeState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut store = state.store.lock().unwrap();
    let user_id = match authorize(&store, &headers, false) {
        Ok(id) => id,
        Err(denied) => return denied,
    };
    if store.carts.contains_key(&user_id) {
        return message(
            StatusCode::BAD_REQUEST,
            "Não é permitido possuir mais de 1 carrinho",
        );
    }

    let id = store.id();
    let mut cart = body;
    cart["_id"] = json!(id);
    cart["idUsuario"] = json!(user_id);
    store.carts.insert(user_id, cart);
    reply(
        StatusCode::CREATED,
        json!({ "message": "Cadastro realizado com sucesso", "_id": id }),
    )
}

async fn cancel_purchase(State(state): State<Arc<FakeState>>, headers: HeaderMap) -> Reply {
    let mut store = state.store.lock().unwrap();
    let user_id = match authorize(&store, &headers, false) {
        Ok(id) => id,
        Err(denied) => return denied,
    };
    match store.carts.remove(&user_id) {
        Some(_) => message(
            StatusCode::OK,
            "Registro excluído com sucesso. Estoque dos produtos reabastecido",
        ),
        None => message(
            StatusCode::OK,
            "Não foi encontrado carrinho para esse usuário",
        ),
    }
}
