use std::{env, fs, path::Path};

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    auth::new_id,
    models::{Role, ServiceGender},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Starts a write transaction up front. A deferred transaction that reads
/// before writing takes a shared lock first and gets SQLITE_BUSY on the
/// upgrade when another writer raced it; IMMEDIATE makes concurrent writers
/// queue on the busy timeout instead.
pub async fn begin_immediate(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
    Ok(())
}

pub async fn commit(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("COMMIT").execute(&mut *conn).await?;
    Ok(())
}

/// Best-effort rollback for error paths.
pub async fn rollback(conn: &mut SqliteConnection) {
    if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        log::error!("rollback failed: {err}");
    }
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = if let Some(path) = db_url.strip_prefix("sqlite://") {
        Some(path)
    } else if let Some(path) = db_url.strip_prefix("sqlite:") {
        Some(path)
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_admin(pool).await?;
    seed_services(pool).await?;
    Ok(())
}

/// Binds the first admin to an externally authenticated identity. Roles are
/// otherwise only assigned through the admin user-management endpoints.
async fn seed_admin(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing =
        sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
            .bind(Role::Admin)
            .fetch_optional(pool)
            .await?;

    if existing.is_some() {
        return Ok(());
    }

    let Ok(uid) = env::var("SEED_ADMIN_UID") else {
        log::warn!("No admin user exists and SEED_ADMIN_UID is not set. Set SEED_ADMIN_UID to the auth uid that should become admin.");
        return Ok(());
    };

    let name = env::var("SEED_ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string());

    sqlx::query(
        r#"INSERT INTO users (id, uid, name, email, phone, role, is_active, created_at)
           VALUES (?, ?, ?, '', '', ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(&uid)
    .bind(&name)
    .bind(Role::Admin)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    log::info!("Seeded admin user for auth uid {uid}");
    Ok(())
}

async fn seed_services(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM services")
        .fetch_one(pool)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let catalog: &[(&str, &str, i64, f64, ServiceGender)] = &[
        (
            "Classic Haircut",
            "Scissor cut with hot towel finish",
            30,
            35.0,
            ServiceGender::Unisex,
        ),
        (
            "Beard Trim",
            "Shape-up and line work",
            15,
            20.0,
            ServiceGender::Male,
        ),
        (
            "Cut & Beard Combo",
            "Haircut plus full beard service",
            45,
            50.0,
            ServiceGender::Male,
        ),
        (
            "Blow Dry & Style",
            "Wash, blow dry and styling",
            30,
            40.0,
            ServiceGender::Female,
        ),
    ];

    for (name, description, duration, price, gender) in catalog {
        sqlx::query(
            r#"INSERT INTO services (id, name, description, duration, price, gender, is_active, created_at)
               VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(description)
        .bind(duration)
        .bind(price)
        .bind(gender)
        .bind(Utc::now().to_rfc3339())
        .execute(pool)
        .await?;
    }

    Ok(())
}
