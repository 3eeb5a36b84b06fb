use actix_web::{guard, web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::Deserialize;

use crate::{
    auth::{bearer_validator, new_id},
    error::ApiError,
    models::{ServiceGender, ServiceRow, UserRow},
    policy::{self, Operation},
    state::AppState,
};

#[derive(Deserialize)]
struct ServicesQuery {
    gender: Option<ServiceGender>,
}

#[derive(Deserialize)]
struct CreateServiceBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    duration: i64,
    price: f64,
    #[serde(default)]
    gender: Option<ServiceGender>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateServiceBody {
    name: Option<String>,
    description: Option<String>,
    duration: Option<i64>,
    price: Option<f64>,
    gender: Option<ServiceGender>,
    is_active: Option<bool>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Catalog reads are public; mutations are admin-only and need the bearer
    // middleware, hence the method-guarded resource pairs.
    cfg.service(
        web::resource("/api/services")
            .guard(guard::Get())
            .route(web::get().to(list)),
    )
    .service(
        web::resource("/api/services")
            .guard(guard::Post())
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/services/{id}")
            .guard(guard::Get())
            .route(web::get().to(get)),
    )
    .service(
        web::resource("/api/services/{id}")
            .guard(guard::Patch())
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .route(web::patch().to(update)),
    );
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ServicesQuery>,
) -> Result<HttpResponse, ApiError> {
    let services = match query.gender {
        Some(gender) => {
            sqlx::query_as::<_, ServiceRow>(
                r#"SELECT id, name, description, duration, price, gender, is_active, created_at
                   FROM services
                   WHERE is_active = 1 AND (gender = ? OR gender = 'unisex')
                   ORDER BY name"#,
            )
            .bind(gender)
            .fetch_all(&state.db)
            .await?
        }
        None => {
            sqlx::query_as::<_, ServiceRow>(
                r#"SELECT id, name, description, duration, price, gender, is_active, created_at
                   FROM services WHERE is_active = 1 ORDER BY name"#,
            )
            .fetch_all(&state.db)
            .await?
        }
    };

    Ok(HttpResponse::Ok().json(services))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let service = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, name, description, duration, price, gender, is_active, created_at
           FROM services WHERE id = ? AND is_active = 1 LIMIT 1"#,
    )
    .bind(path.into_inner())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("service not found".into()))?;

    Ok(HttpResponse::Ok().json(service))
}

async fn create(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    body: web::Json<CreateServiceBody>,
) -> Result<HttpResponse, ApiError> {
    policy::authorize(&user, Operation::ManageServices)?;

    let body = body.into_inner();
    if body.name.trim().is_empty() || body.duration <= 0 || body.price < 0.0 {
        return Err(ApiError::Validation(
            "name, duration and price are required".into(),
        ));
    }

    let service = ServiceRow {
        id: new_id(),
        name: body.name.trim().to_string(),
        description: body.description.unwrap_or_default(),
        duration: body.duration,
        price: body.price,
        gender: body.gender.unwrap_or(ServiceGender::Unisex),
        is_active: true,
        created_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        r#"INSERT INTO services (id, name, description, duration, price, gender, is_active, created_at)
           VALUES (?, ?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(&service.id)
    .bind(&service.name)
    .bind(&service.description)
    .bind(service.duration)
    .bind(service.price)
    .bind(service.gender)
    .bind(&service.created_at)
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Created().json(service))
}

async fn update(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    path: web::Path<String>,
    body: web::Json<UpdateServiceBody>,
) -> Result<HttpResponse, ApiError> {
    policy::authorize(&user, Operation::ManageServices)?;

    let id = path.into_inner();
    let mut service = sqlx::query_as::<_, ServiceRow>(
        r#"SELECT id, name, description, duration, price, gender, is_active, created_at
           FROM services WHERE id = ? LIMIT 1"#,
    )
    .bind(&id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::NotFound("service not found".into()))?;

    let body = body.into_inner();
    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(ApiError::Validation("name cannot be blank".into()));
        }
        service.name = name.trim().to_string();
    }
    if let Some(description) = body.description {
        service.description = description;
    }
    if let Some(duration) = body.duration {
        if duration <= 0 {
            return Err(ApiError::Validation("duration must be positive".into()));
        }
        service.duration = duration;
    }
    if let Some(price) = body.price {
        if price < 0.0 {
            return Err(ApiError::Validation("price cannot be negative".into()));
        }
        service.price = price;
    }
    if let Some(gender) = body.gender {
        service.gender = gender;
    }
    if let Some(is_active) = body.is_active {
        service.is_active = is_active;
    }

    sqlx::query(
        r#"UPDATE services SET name = ?, description = ?, duration = ?, price = ?, gender = ?, is_active = ?
           WHERE id = ?"#,
    )
    .bind(&service.name)
    .bind(&service.description)
    .bind(service.duration)
    .bind(service.price)
    .bind(service.gender)
    .bind(service.is_active)
    .bind(&service.id)
    .execute(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(service))
}
