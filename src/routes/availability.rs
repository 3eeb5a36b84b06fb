use actix_web::{web, HttpResponse};
use actix_web_httpauth::middleware::HttpAuthentication;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    auth::bearer_validator,
    availability::{self, SlotInput},
    booking,
    error::ApiError,
    models::{normalize_date, AvailabilityDay, BarberSummary, BookingDetailsRow, UserRow},
    policy::{self, Operation},
    state::AppState,
};

#[derive(Deserialize)]
struct DateQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetAvailabilityBody {
    barber_id: String,
    date: String,
    slots: Vec<SlotInput>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BarberDayStats {
    total_slots: usize,
    booked_slots: usize,
    free_slots: usize,
    utilization: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BarberDayView {
    #[serde(flatten)]
    barber: BarberSummary,
    availability: AvailabilityDay,
    bookings: Vec<BookingDetailsRow>,
    stats: BarberDayStats,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/availability/{barber_id}").route(web::get().to(get_day)))
        .service(
            web::resource("/api/availability")
                .wrap(HttpAuthentication::bearer(bearer_validator))
                .route(web::post().to(set_day)),
        )
        .service(
            web::resource("/api/barbers/with-availability")
                .wrap(HttpAuthentication::bearer(bearer_validator))
                .route(web::get().to(barbers_with_availability)),
        )
        .service(web::resource("/api/barbers").route(web::get().to(barbers)));
}

async fn get_day(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse, ApiError> {
    let barber_id = path.into_inner();
    let Some(raw_date) = query.date.as_deref() else {
        return Err(ApiError::Validation("date parameter is required".into()));
    };
    let date = normalize_date(raw_date)?;

    let day = availability::get_availability(&state.db, &barber_id, date).await?;
    Ok(HttpResponse::Ok().json(day))
}

async fn set_day(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    body: web::Json<SetAvailabilityBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let date = normalize_date(&body.date)?;

    let day =
        availability::set_availability(&state.db, &body.barber_id, date, &body.slots, &user)
            .await?;
    Ok(HttpResponse::Ok().json(day))
}

async fn barbers(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let barbers = availability::list_barbers(&state.db).await?;
    Ok(HttpResponse::Ok().json(barbers))
}

/// Day dashboard for staff: every active barber with their slots, active
/// bookings and a small utilization summary.
async fn barbers_with_availability(
    state: web::Data<AppState>,
    user: web::ReqData<UserRow>,
    query: web::Query<DateQuery>,
) -> Result<HttpResponse, ApiError> {
    policy::authorize(&user, Operation::ViewDayDashboard)?;

    let date = match query.date.as_deref() {
        Some(raw) => normalize_date(raw)?,
        None => Utc::now().date_naive(),
    };

    let mut views = Vec::new();
    for barber in availability::list_barbers(&state.db).await? {
        let availability = availability::get_availability(&state.db, &barber.id, date).await?;
        let bookings =
            booking::list_barber_bookings(&state.db, &barber.id, Some(date), &user).await?;

        let total_slots = availability.slots.len();
        let booked_slots = availability.slots.iter().filter(|s| s.is_booked).count();
        let utilization = if total_slots > 0 {
            ((booked_slots as f64 / total_slots as f64) * 100.0).round() as i64
        } else {
            0
        };

        views.push(BarberDayView {
            barber,
            availability,
            bookings,
            stats: BarberDayStats {
                total_slots,
                booked_slots,
                free_slots: total_slots - booked_slots,
                utilization,
            },
        });
    }

    Ok(HttpResponse::Ok().json(views))
}
