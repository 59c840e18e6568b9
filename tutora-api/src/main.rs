use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tutora_api::{
    app,
    state::{AppState, AuthConfig},
    worker,
};
use tutora_catalog::PlanCatalog;
use tutora_core::{CustomerStore, OtpStore};
use tutora_entitlement::{AttachPolicy, BookingAttacher, PurchaseReconciler};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutora_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = tutora_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Tutora API on port {}", config.server.port);

    // Postgres document store
    let db = tutora_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.ensure_schema().await.expect("Failed to prepare schema");
    let store: Arc<dyn CustomerStore> = Arc::new(tutora_store::PgCustomerStore::new(db.pool.clone()));

    // Redis Connection
    let redis_client = tutora_store::RedisClient::new(&config.redis.url)
        .await
        .expect("Failed to connect to Redis");
    let redis_arc = Arc::new(redis_client);
    let otp: Arc<dyn OtpStore> = redis_arc.clone();

    // Kafka Connection
    let kafka_producer = tutora_store::EventProducer::new(&config.kafka.brokers)
        .expect("Failed to create Kafka producer");
    let kafka_arc = Arc::new(kafka_producer);

    let reconciler = Arc::new(PurchaseReconciler::new(PlanCatalog::standard()));
    let attacher = Arc::new(BookingAttacher::new(AttachPolicy {
        rebind_fallback: config.business_rules.rebind_fallback,
    }));

    let app_state = AppState {
        store: store.clone(),
        otp,
        redis: redis_arc.clone(),
        kafka: kafka_arc.clone(),
        reconciler,
        attacher,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        business_rules: config.business_rules.clone(),
    };

    tokio::spawn(worker::start_archival_worker(
        store,
        kafka_arc,
        config.business_rules.sweep_interval_hours,
    ));

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
