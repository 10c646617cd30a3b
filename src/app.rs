use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::TokenService;
use crate::authz::{Authorizer, ScopeTable};
use crate::config::AppConfig;
use crate::database::DocumentStore;
use crate::handlers::{protected, public};
use crate::middleware::{long_token_middleware, optional_long_token_middleware};
use crate::services::{ClassroomService, SchoolService, StudentService, UserService};

/// Shared, read-only request state. Everything mutable lives in the store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
    pub tokens: Arc<TokenService>,
    pub authz: Authorizer,
    pub schools: SchoolService,
    pub classrooms: ClassroomService,
    pub students: StudentService,
    pub users: UserService,
}

impl AppState {
    /// Wire services around a store. Fails when a token secret is missing or
    /// the scope table does not parse.
    pub fn new(config: AppConfig, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        let tokens = Arc::new(TokenService::new(&config.security).context("token service")?);
        let scopes = Arc::new(ScopeTable::builtin().context("scope table")?);
        let authz = Authorizer::new(scopes, store.clone(), config.store.delete_strategy);
        info!("Parent deletes use {:?}", authz.integrity.strategy());

        Ok(Self {
            schools: SchoolService::new(store.clone(), authz.clone()),
            classrooms: ClassroomService::new(store.clone(), authz.clone()),
            students: StudentService::new(store.clone(), authz.clone()),
            users: UserService::new(store.clone(), tokens.clone(), authz.clone()),
            config: Arc::new(config),
            store,
            tokens,
            authz,
        })
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(public::health))
        .route("/api/user/login", post(public::login))
        .merge(bootstrap_routes(&state))
        .merge(protected_routes(&state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.api.max_request_size_bytes));

    if state.config.security.enable_cors {
        app = app.layer(cors_layer(&state.config.security.cors_origins));
    }
    if state.config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

fn bootstrap_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/user/createUser", post(public::create_user))
        .route_layer(from_fn_with_state(state.clone(), optional_long_token_middleware))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    use protected::{classroom, school, student, token};

    Router::new()
        .route("/api/token/createShortToken", post(token::create_short_token))
        // Schools
        .route("/api/school/create", post(school::create))
        .route("/api/school/getAll", get(school::get_all))
        .route("/api/school/getByID/:id", get(school::get_by_id))
        .route("/api/school/update/:id", put(school::update))
        .route("/api/school/delete/:id", delete(school::delete))
        // Classrooms
        .route("/api/classroom/create", post(classroom::create))
        .route("/api/classroom/getAll", get(classroom::get_all))
        .route("/api/classroom/getByID/:id", get(classroom::get_by_id))
        .route("/api/classroom/getStudents/:id", get(classroom::get_students))
        .route("/api/classroom/update/:id", put(classroom::update))
        .route("/api/classroom/delete/:id", delete(classroom::delete))
        // Students
        .route("/api/student/create", post(student::create))
        .route("/api/student/getAll", get(student::get_all))
        .route("/api/student/getByID/:id", get(student::get_by_id))
        .route("/api/student/update/:id", put(student::update))
        .route("/api/student/delete/:id", delete(student::delete))
        .route_layer(from_fn_with_state(state.clone(), long_token_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}
