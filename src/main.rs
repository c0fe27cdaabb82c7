pub mod auth;
pub mod config;
pub mod db;
pub mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{get, post, put},
    Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use auth::{
    models::{LoginRequest, RefreshRequest, SignupRequest, UpdateRoleRequest, UpdateStatusRequest},
    AuthService, AuthorizationGate, Clock, InMemoryUserDirectory, PasswordService, PgUserDirectory,
    RedisRevocationStore, RequireRole, RevocationStore, Role, RoleSet, SystemClock, TokenCodec, TokenPair,
    TokenService, UserDirectory, UserResponse,
};
use config::{AppConfig, FirstAdminConfig, RateLimitConfig};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::signup_handler,
        auth::handlers::login_handler,
        auth::handlers::refresh_handler,
        auth::handlers::logout_handler,
        users::handlers::me_handler,
        users::handlers::get_user_handler,
        users::handlers::update_role_handler,
        users::handlers::update_status_handler,
    ),
    components(
        schemas(
            Role,
            UserResponse,
            SignupRequest,
            LoginRequest,
            RefreshRequest,
            TokenPair,
            UpdateRoleRequest,
            UpdateStatusRequest
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Signup, login and token lifecycle"),
        (name = "users", description = "Endpoints for any signed-in user"),
        (name = "admin", description = "Moderator and admin account management")
    ),
    info(
        title = "Photo Share API",
        version = "1.0.0",
        description = "Authentication and authorization for the photo sharing service"
    )
)]
struct ApiDoc;

/// Registers the bearer scheme referenced by protected paths
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub gate: Arc<AuthorizationGate>,
}

/// Wrap every route of `router` in a role check
fn require_roles(router: Router<AppState>, gate: &Arc<AuthorizationGate>, allowed: RoleSet) -> Router<AppState> {
    let guard = RequireRole::new(gate.clone(), allowed);
    router.route_layer(middleware::from_fn(move |request: Request, next: Next| {
        guard.clone().middleware(request, next)
    }))
}

/// Creates and configures the application router
///
/// Role requirements are declared per route group. The admin lookup lists
/// Moderator and Admin explicitly; no role implies another.
pub fn create_router(state: AppState, rate_limit: Option<RateLimitConfig>) -> Router {
    let gate = state.gate.clone();

    let mut credential_routes = Router::new()
        .route("/api/auth/signup", post(auth::signup_handler))
        .route("/api/auth/login", post(auth::login_handler));

    if let Some(limit) = rate_limit {
        match GovernorConfigBuilder::default()
            .per_second(limit.per_second)
            .burst_size(limit.burst_size)
            .finish()
        {
            Some(governor) => {
                tracing::info!(
                    "Rate limiting signup/login: {}/s, burst {}",
                    limit.per_second,
                    limit.burst_size
                );
                credential_routes = credential_routes.layer(GovernorLayer {
                    config: Box::leak(Box::new(governor)),
                });
            }
            None => tracing::warn!("Ignoring invalid rate limit configuration {:?}", limit),
        }
    }

    let public_routes = Router::new().route("/api/auth/refresh", post(auth::refresh_handler));

    let signed_in_routes = require_roles(
        Router::new()
            .route("/api/auth/logout", post(auth::logout_handler))
            .route("/api/users/me", get(users::me_handler)),
        &gate,
        RoleSet::any(),
    );

    let staff_routes = require_roles(
        Router::new().route("/api/admin/users/:id", get(users::get_user_handler)),
        &gate,
        RoleSet::of(&[Role::Moderator, Role::Admin]),
    );

    let admin_routes = require_roles(
        Router::new()
            .route("/api/admin/users/:id/role", put(users::update_role_handler))
            .route("/api/admin/users/:id/status", put(users::update_status_handler)),
        &gate,
        RoleSet::of(&[Role::Admin]),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(credential_routes)
        .merge(public_routes)
        .merge(signed_in_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build shared state from already-constructed collaborators
pub fn assemble_state(
    directory: Arc<dyn UserDirectory>,
    revocations: Option<Arc<dyn RevocationStore>>,
    passwords: PasswordService,
    clock: Arc<dyn Clock>,
    config: &config::AuthConfig,
) -> Result<AppState, auth::AuthError> {
    let codec = TokenCodec::new(&config.secret, config.algorithm, clock)?;
    let tokens = Arc::new(TokenService::new(
        codec,
        config.access_ttl_minutes,
        config.refresh_ttl_days,
    )?);

    let auth = AuthService::new(
        directory.clone(),
        passwords,
        tokens.clone(),
        revocations.clone(),
        config.directory_timeout,
    )?;
    let gate = AuthorizationGate::new(
        tokens,
        directory,
        revocations,
        config.role_check,
        config.directory_timeout,
    );

    Ok(AppState {
        auth: Arc::new(auth),
        gate: Arc::new(gate),
    })
}

/// Connect the configured backends and build shared state
async fn build_state(config: &AppConfig) -> Result<AppState, Box<dyn std::error::Error>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let directory: Arc<dyn UserDirectory> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::create_pool(url, config.auth.directory_timeout).await?;
            db::run_migrations(&pool).await?;
            Arc::new(PgUserDirectory::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory user directory");
            Arc::new(InMemoryUserDirectory::new())
        }
    };

    let revocations: Option<Arc<dyn RevocationStore>> = match &config.redis_url {
        Some(url) => {
            tracing::info!("Connecting to Redis revocation store...");
            Some(Arc::new(
                RedisRevocationStore::connect(url, clock.clone(), config.auth.directory_timeout).await?,
            ))
        }
        None => {
            tracing::info!("No revocation store configured, tokens are stateless");
            None
        }
    };

    let state = assemble_state(
        directory,
        revocations,
        PasswordService::default(),
        clock,
        &config.auth,
    )?;
    seed_first_admin(&state, config.first_admin.as_ref()).await?;
    Ok(state)
}

/// Create the configured admin account if it does not exist yet
pub async fn seed_first_admin(state: &AppState, first_admin: Option<&FirstAdminConfig>) -> Result<(), auth::AuthError> {
    let Some(admin) = first_admin else {
        return Ok(());
    };
    tracing::info!("Ensuring admin account {} exists", admin.email);
    state.auth.ensure_admin(&admin.email, &admin.password).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_share_api=info,tower_http=info".into()),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Photo Share API - Starting...");

    let config = AppConfig::from_env().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        e
    })?;
    tracing::info!(
        "Tokens: {:?}, access {}m, refresh {}d, role check {:?}",
        config.auth.algorithm,
        config.auth.access_ttl_minutes,
        config.auth.refresh_ttl_days,
        config.auth.role_check
    );

    let state = build_state(&config).await?;
    let app = create_router(state, config.rate_limit);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Photo Share API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    // Peer addresses feed the per-IP rate limiter
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
