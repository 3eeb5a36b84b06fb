mod auth;
mod availability;
mod booking;
mod db;
mod error;
mod identity;
mod models;
mod policy;
mod routes;
mod state;

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::auth::TokenVerifier;
use crate::state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/salon.db".to_string());
    db::ensure_sqlite_dir(&db_url)?;

    let connect_options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool).await?;

    let jwt_secret = match env::var("AUTH_JWT_SECRET") {
        Ok(secret) => secret,
        Err(_) => {
            log::warn!("AUTH_JWT_SECRET not set. Using an insecure default. Set AUTH_JWT_SECRET in production.");
            "insecure-dev-secret".to_string()
        }
    };

    let state = AppState {
        db: pool.clone(),
        verifier: Arc::new(TokenVerifier::new(&jwt_secret)),
    };

    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5000);

    let address = format!("0.0.0.0:{port}");
    log::info!("Starting salon booking API on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .service(web::resource("/health").route(web::get().to(health)))
            .configure(routes::auth::configure)
            .configure(routes::bookings::configure)
            .configure(routes::availability::configure)
            .configure(routes::services::configure)
            .configure(routes::users::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}
