use std::sync::Arc;

use tracing::{error, info};

use junkmail::{
    start_reconciler, Config, Database, EphemeralStore, MemoryStore, RedisStore, Retention,
    RetentionPolicy, SessionSettings, SmtpServer, StorageEngine, StoreBackend,
};

#[tokio::main]
async fn main() {
    // Load configuration
    let mut config = match Config::load("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Initialize logging
    if let Err(e) = junkmail::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        junkmail::logging::init_console_only(&config.logging.level);
    }

    info!("junkmail - disposable email receiver");
    info!(
        "SMTP configured on {}:{} for domain {}",
        config.smtp.host, config.smtp.port, config.smtp.domain
    );

    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> junkmail::Result<()> {
    let db = Database::open(&config.database.path).await?;
    let default_retention = Retention::new(config.retention.default_secs)?;
    let retention = Arc::new(RetentionPolicy::load(db.clone(), default_retention).await?);

    match config.store.backend {
        StoreBackend::Redis => {
            let store = RedisStore::connect(&config.store.url).await?;
            serve(store, db, retention, &config).await
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; received mail is lost on restart");
            serve(MemoryStore::new(), db, retention, &config).await
        }
    }
}

async fn serve<S: EphemeralStore>(
    store: S,
    db: Database,
    retention: Arc<RetentionPolicy>,
    config: &Config,
) -> junkmail::Result<()> {
    store.ping().await?;

    let engine = Arc::new(StorageEngine::new(
        store,
        db.clone(),
        retention,
        config.addresses.permanent,
    ));

    let reconciler = config
        .reconcile
        .enabled
        .then(|| start_reconciler(engine.clone(), &config.reconcile));

    let server = SmtpServer::bind(&config.smtp).await?;
    let settings = SessionSettings::from_config(&config.smtp);

    let result = tokio::select! {
        result = server.serve(engine, settings) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    if let Some(handle) = reconciler {
        handle.abort();
    }
    db.close().await;
    result
}
