use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use auto_nanny_backend::{
    AppState,
    chat::registry::InProcessRegistry,
    config::Config,
    db,
    entities::user::{self, UserRole},
    entities::{franchise, pricing_coefficients, tariff, user_role},
    gateways::{geo::GeoClient, payment::PaymentClient, push::PushClient, sms::SmsClient},
    routes, scheduler,
    utils::rate_window::RateWindow,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auto_nanny_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    tracing::info!("Starting server at {}", config.server_addr());

    let db = db::connect(&config)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Connected to database");

    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    tracing::info!("Migrations complete");

    seed_defaults(&db, &config).await;

    let state = AppState {
        db,
        geo: Arc::new(GeoClient::new(&config)),
        payment: Arc::new(PaymentClient::new(&config)),
        push: Arc::new(PushClient::new(&config)),
        sms: Arc::new(SmsClient::new(&config)),
        sockets: Arc::new(InProcessRegistry::new()),
        verify_limiter: Arc::new(RateWindow::new(
            config.meeting_code_max_fails,
            Duration::from_secs(config.meeting_code_fail_window_secs),
        )),
        config,
    };

    scheduler::spawn(state.clone());

    let app = routes::create_router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = state
        .config
        .server_addr()
        .parse()
        .expect("Invalid address");
    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Failed to start server");
}

/// Seed rows the service cannot run without: the root franchise, an
/// active coefficient set, a default tariff and an admin account.
async fn seed_defaults(db: &sea_orm::DatabaseConnection, config: &Config) {
    let franchise_id = match franchise::Entity::find_by_id(config.default_franchise_id)
        .one(db)
        .await
        .expect("Failed to check for franchise")
    {
        Some(row) => row.id,
        None => {
            let row = franchise::ActiveModel {
                name: Set(config.default_franchise_name.clone()),
                active: Set(true),
                ..Default::default()
            }
            .insert(db)
            .await
            .expect("Failed to create franchise");
            tracing::info!(franchise_id = row.id, "default franchise created");
            row.id
        }
    };

    let coefficients = pricing_coefficients::Entity::find()
        .filter(pricing_coefficients::Column::Active.eq(true))
        .one(db)
        .await
        .expect("Failed to check for pricing coefficients");
    if coefficients.is_none() {
        pricing_coefficients::ActiveModel {
            vm: Set(25.0),
            s1: Set(2.0),
            kc: Set(2.0),
            ks: Set(10.0),
            kg: Set(1.0),
            t1: Set(144.0),
            m: Set(35.0),
            x5: Set(1.0),
            p_insurance: Set(0.0),
            active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create pricing coefficients");
        tracing::info!("default pricing coefficients created");
    }

    let default_tariff = tariff::Entity::find()
        .filter(tariff::Column::FranchiseId.eq(franchise_id))
        .filter(tariff::Column::Active.eq(true))
        .one(db)
        .await
        .expect("Failed to check for tariff");
    if default_tariff.is_none() {
        tariff::ActiveModel {
            franchise_id: Set(franchise_id),
            title: Set("Базовый".to_string()),
            cost_per_km: Set(Decimal::new(35, 0)),
            active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create tariff");
        tracing::info!("default tariff created");
    }

    seed_admin(db, franchise_id).await;
}

async fn seed_admin(db: &sea_orm::DatabaseConnection, franchise_id: i32) {
    let admin_phone = "+70000000000";

    let existing = user::Entity::find()
        .filter(user::Column::Phone.eq(admin_phone))
        .one(db)
        .await
        .expect("Failed to check for admin");
    if existing.is_some() {
        return;
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(b"admin123", &salt)
        .expect("Failed to hash admin password")
        .to_string();

    let admin = user::ActiveModel {
        phone: Set(admin_phone.to_string()),
        password_hash: Set(password_hash),
        surname: Set("Админ".to_string()),
        name: Set("Главный".to_string()),
        franchise_id: Set(Some(franchise_id)),
        active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create admin");

    user_role::ActiveModel {
        user_id: Set(admin.id),
        role: Set(UserRole::Admin),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create admin role");

    tracing::info!(admin_id = admin.id, "admin account created");
}
