use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde::Deserialize;

use crate::{
    auth::bearer_validator,
    booking::{self, CreateBookingParams},
    error::ApiError,
    models::{normalize_date, BookingStatus, UserRow},
    state::AppState,
};

#[derive(Deserialize)]
struct BookingsQuery {
    status: Option<BookingStatus>,
    date: Option<String>,
}

#[derive(Deserialize)]
struct BarberBookingsQuery {
    date: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/bookings")
            .wrap(HttpAuthentication::bearer(bearer_validator))
            .service(
                web::resource("")
                    .route(web::post().to(create))
                    .route(web::get().to(list_own)),
            )
            .service(
                web::resource("/barber/{barber_id}").route(web::get().to(list_for_barber)),
            )
            .service(web::resource("/{id}/cancel").route(web::patch().to(cancel)))
            .service(web::resource("/{id}/complete").route(web::patch().to(complete))),
    );
}

async fn create(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    body: web::Json<CreateBookingParams>,
) -> Result<HttpResponse, ApiError> {
    let booking = booking::create_booking(&state.db, &body, &user).await?;
    log::info!(
        "booking {} created for barber {} at {} {}",
        booking.id,
        booking.barber_id,
        booking.booking_date,
        booking.slot_start_time
    );
    Ok(HttpResponse::Created().json(booking))
}

async fn list_own(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    query: web::Query<BookingsQuery>,
) -> Result<HttpResponse, ApiError> {
    let date = query.date.as_deref().map(normalize_date).transpose()?;
    let bookings = booking::list_user_bookings(&state.db, &user.id, query.status, date).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn list_for_barber(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    path: web::Path<String>,
    query: web::Query<BarberBookingsQuery>,
) -> Result<HttpResponse, ApiError> {
    let barber_id = path.into_inner();
    let date = query.date.as_deref().map(normalize_date).transpose()?;
    let bookings = booking::list_barber_bookings(&state.db, &barber_id, date, &user).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

async fn cancel(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = booking::cancel_booking(&state.db, &path.into_inner(), &user).await?;
    log::info!("booking {} cancelled by {}", booking.id, user.id);
    Ok(HttpResponse::Ok().json(booking))
}

async fn complete(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let booking = booking::complete_booking(&state.db, &path.into_inner(), &user).await?;
    Ok(HttpResponse::Ok().json(booking))
}
