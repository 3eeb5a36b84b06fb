use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde_json::json;

use crate::{auth::bearer_validator, error::ApiError, models::UserRow, state::AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/auth")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .service(web::resource("/login").route(web::post().to(login)))
            .service(web::resource("/logout").route(web::post().to(logout)))
            .service(web::resource("/me").route(web::get().to(me))),
    );
}

// Identity resolution already ran in the bearer validator; login only has to
// report the role the frontend should route to.
async fn login(user: web::ReqData<UserRow>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(json!({ "role": user.role })))
}

async fn logout(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
) -> Result<HttpResponse, ApiError> {
    sqlx::query("UPDATE users SET active_session_token = NULL WHERE id = ?")
        .bind(&user.id)
        .execute(&state.db)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "status": "ok" })))
}

async fn me(user: web::ReqData<UserRow>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(user.into_inner()))
}
