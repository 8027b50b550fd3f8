//! FSD User Service
//!
//! Account, token and permission backend for an FSD network.
//! Reads configuration from TOML file (~/.config/fsd-user-service/config.toml).

use std::sync::Arc;
use std::time::Instant;

use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fsd_user_service::application::identity::{ensure_admin, AdminAccount};
use fsd_user_service::application::{
    AuthService, PermissionService, RoleService, SideEffects, UserService,
};
use fsd_user_service::config::LoggingConfig;
use fsd_user_service::domain::{PermissionRegistry, RoleRepository, UserRepository};
use fsd_user_service::infrastructure::clients::{AuditBus, InMemoryEmailCodeStore, TracingMailer};
use fsd_user_service::infrastructure::crypto::JwtClaimFactory;
use fsd_user_service::infrastructure::database::migrator::Migrator;
use fsd_user_service::infrastructure::database::{SeaOrmRoleRepository, SeaOrmUserRepository};
use fsd_user_service::shared::ShutdownCoordinator;
use fsd_user_service::{config_path, create_api_router, init_database, AppConfig, AppState};

const MAIL_OUTBOX_CAPACITY: usize = 256;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let path = config_path();
    let app_cfg = match AppConfig::load(&path) {
        Ok(cfg) => {
            init_tracing(&cfg.logging);
            info!(path = %path.display(), "Configuration loaded");
            cfg
        }
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }
    };

    info!(version = env!("CARGO_PKG_VERSION"), "Starting FSD user service");

    // ── Database ───────────────────────────────────────────────
    let db = match init_database(&app_cfg.database).await {
        Ok(db) => db,
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    info!("Running database migrations...");
    if let Err(e) = Migrator::up(&db, None).await {
        error!(error = %e, "Failed to run migrations");
        return Err(e.into());
    }
    info!("Migrations completed");

    let users: Arc<dyn UserRepository> = Arc::new(SeaOrmUserRepository::new(db.clone()));
    let roles: Arc<dyn RoleRepository> = Arc::new(SeaOrmRoleRepository::new(db.clone()));
    let registry = Arc::new(PermissionRegistry::builtin());
    let bcrypt_cost = app_cfg.security.bcrypt_cost;

    let admin = AdminAccount {
        cid: app_cfg.admin.cid,
        username: app_cfg.admin.username.clone(),
        email: app_cfg.admin.email.clone(),
        password: app_cfg.admin.password.clone(),
    };
    if let Err(e) = ensure_admin(users.as_ref(), &registry, &admin, bcrypt_cost).await {
        error!(error = %e, "Failed to create default admin");
    }

    // ── Collaborators and side-effect pipeline ─────────────────
    let audit_bus = AuditBus::new();
    let mailer = Arc::new(TracingMailer::new(MAIL_OUTBOX_CAPACITY));
    let codes = Arc::new(InMemoryEmailCodeStore::with_limit(
        app_cfg.email_code.ttl(),
        app_cfg.email_code.max_pending,
    ));
    let side_effects = SideEffects::new(Arc::new(audit_bus), mailer, codes.clone());

    let tokens = Arc::new(JwtClaimFactory::new(app_cfg.security.jwt_config()));
    info!(
        access_ttl_secs = app_cfg.security.access_token_ttl_secs,
        refresh_ttl_secs = app_cfg.security.refresh_token_ttl_secs,
        "JWT configured"
    );

    // ── Services ───────────────────────────────────────────────
    let state = AppState {
        auth: Arc::new(AuthService::new(users.clone(), tokens.clone())),
        users: Arc::new(UserService::new(users.clone(), side_effects.clone(), bcrypt_cost)),
        roles: Arc::new(RoleService::new(roles.clone(), side_effects.clone())),
        permissions: Arc::new(PermissionService::new(
            users,
            roles,
            registry,
            side_effects.clone(),
        )),
        tokens,
        codes,
        side_effects: side_effects.clone(),
        db: Some(db.clone()),
        started_at: Instant::now(),
    };

    // Initialize shutdown coordinator
    let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
    let shutdown_signal = shutdown.signal();
    shutdown.start_signal_listener();

    // Start REST API server with graceful shutdown
    let api_router = create_api_router(state);
    let api_addr = app_cfg.server.address();
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!(addr = %api_addr, "REST API server listening");
    info!("Swagger UI available at http://{}/docs/", api_addr);

    let api_shutdown = shutdown_signal.clone();
    let served = axum::serve(
        listener,
        api_router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        api_shutdown.wait().await;
        info!("REST API server received shutdown signal");
    })
    .await;

    if let Err(e) = &served {
        error!(error = %e, "REST API server error");
    }

    // Let committed mutations finish their audit and mail work
    let pending = side_effects.in_flight();
    if pending > 0 {
        info!(pending, "Waiting for side effects");
    }
    if !shutdown.drain(side_effects.wait_idle()).await {
        warn!(pending = side_effects.in_flight(), "Side effects abandoned at shutdown");
    }

    if let Err(e) = db.close().await {
        warn!(error = %e, "Error closing database connection");
    } else {
        info!("Database connection closed");
    }

    info!("FSD user service shutdown complete");
    served.map_err(Into::into)
}
