// src/main.rs

use std::{error::Error, sync::Arc, time::Duration};

use prism_backend::{
    config::Config,
    models::user::{NewUser, ROLE_ADMIN},
    routes,
    services::notifier::Notifier,
    state::AppState,
    store::{PgStore, PortalStore},
    utils::{
        email::{LogMailer, Mailer, SmtpMailer},
        hash::hash_password,
        storage::{MemoryStorage, ObjectStorage, S3Storage},
    },
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let pool = connect_with_retry(&config.database_url).await?;
    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    let store: Arc<dyn PortalStore> = Arc::new(PgStore::new(pool));

    // Seed Admin User
    if let Err(e) = seed_admin_user(store.as_ref(), &config).await {
        tracing::error!("Failed to seed admin user: {}", e);
    }

    let storage: Arc<dyn ObjectStorage> = match &config.s3 {
        Some(s3) => {
            tracing::info!(endpoint = %s3.endpoint, bucket = %s3.bucket, "using S3 object storage");
            Arc::new(S3Storage::new(s3))
        }
        None => {
            tracing::warn!("S3_ENDPOINT not set, objects are kept in memory and lost on restart");
            Arc::new(MemoryStorage::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp, &config.mail_from)?),
        None => {
            tracing::warn!("SMTP_HOST not set, notification emails are only logged");
            Arc::new(LogMailer)
        }
    };

    let state = AppState {
        store,
        storage,
        notifier: Notifier::new(mailer),
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Connects to Postgres, retrying while the database comes up.
async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

async fn seed_admin_user(store: &dyn PortalStore, config: &Config) -> Result<(), Box<dyn Error>> {
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        if store.find_user_by_email(email).await?.is_none() {
            tracing::info!("Seeding admin user: {}", email);
            store
                .insert_user(NewUser {
                    email: email.trim().to_lowercase(),
                    name: "Administrator".to_string(),
                    password: hash_password(password)?,
                    role: ROLE_ADMIN.to_string(),
                })
                .await?;
            tracing::info!("Admin user created successfully.");
        }
    }
    Ok(())
}
