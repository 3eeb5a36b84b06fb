use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;

use crate::{
    auth::bearer_validator,
    error::ApiError,
    models::{Role, UserRow},
    policy::{self, Operation},
    state::AppState,
};

#[derive(Deserialize)]
struct RoleBody {
    role: Role,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserBody {
    is_active: Option<bool>,
    role: Option<Role>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/users")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .service(web::resource("").route(web::get().to(list)))
            .service(web::resource("/{id}/role").route(web::patch().to(update_role)))
            .service(web::resource("/{id}").route(web::patch().to(update))),
    );
}

async fn list(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
) -> Result<HttpResponse, ApiError> {
    policy::authorize(&user, Operation::ManageUsers)?;

    let users = sqlx::query_as::<_, UserRow>(
        r#"SELECT id, uid, name, email, phone, role, is_active, active_session_token, created_at
           FROM users ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(users))
}

async fn update_role(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    path: web::Path<String>,
    body: web::Json<RoleBody>,
) -> Result<HttpResponse, ApiError> {
    policy::authorize(&user, Operation::ManageUsers)?;

    let id = path.into_inner();
    let mut target = fetch_user(&state, &id).await?;

    target.role = body.role;
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(target.role)
        .bind(&target.id)
        .execute(&state.db)
        .await?;

    log::info!("user {} role set to {:?} by {}", target.id, target.role, user.id);
    Ok(HttpResponse::Ok().json(target))
}

/// Admin edit of account state. Users are never deleted; deactivation is the
/// retirement path.
async fn update(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    path: web::Path<String>,
    body: web::Json<UpdateUserBody>,
) -> Result<HttpResponse, ApiError> {
    policy::authorize(&user, Operation::ManageUsers)?;

    let id = path.into_inner();
    let mut target = fetch_user(&state, &id).await?;

    if let Some(is_active) = body.is_active {
        target.is_active = is_active;
    }
    if let Some(role) = body.role {
        target.role = role;
    }

    sqlx::query("UPDATE users SET is_active = ?, role = ? WHERE id = ?")
        .bind(target.is_active)
        .bind(target.role)
        .bind(&target.id)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(target))
}

async fn fetch_user(state: &web::Data<AppState>, id: &str) -> Result<UserRow, ApiError> {
    sqlx::query_as::<_, UserRow>(
        r#"SELECT id, uid, name, email, phone, role, is_active, active_session_token, created_at
           FROM users WHERE id = ? LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("user not found".into()))
}
