use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    auth::new_id,
    db,
    error::{ApiError, ApiResult},
    identity,
    models::{normalize_date, BookingDetailsRow, BookingRow, BookingStatus, Role, UserRow},
    policy::{self, Operation},
};

const SELECT_BOOKING: &str = r#"SELECT id, user_id, barber_id, service_id, booking_date, slot_start_time, slot_end_time,
              status, availability_id, customer_name, customer_phone, booked_by, created_at
       FROM bookings"#;

const SELECT_DETAILS: &str = r#"SELECT b.id, b.user_id, b.barber_id, b.service_id, b.booking_date,
              b.slot_start_time, b.slot_end_time, b.status, b.availability_id,
              b.customer_name, b.customer_phone, b.booked_by, b.created_at,
              bu.name AS barber_name, cu.name AS user_name, cu.phone AS user_phone,
              s.name AS service_name, s.duration AS service_duration, s.price AS service_price
       FROM bookings b
       JOIN users bu ON bu.id = b.barber_id
       JOIN users cu ON cu.id = b.user_id
       JOIN services s ON s.id = b.service_id"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingParams {
    pub barber_id: String,
    pub service_id: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

/// Reserves a slot and creates the booking in one write transaction. Of N
/// concurrent attempts on the same slot exactly one commits; the rest see
/// ALREADY_BOOKED. Nothing partial survives an abort, including a walk-in
/// user created along the way.
pub async fn create_booking(
    db: &SqlitePool,
    params: &CreateBookingParams,
    actor: &UserRow,
) -> ApiResult<BookingDetailsRow> {
    policy::authorize(actor, Operation::CreateBooking)?;

    if params.barber_id.trim().is_empty()
        || params.service_id.trim().is_empty()
        || params.date.trim().is_empty()
        || params.start_time.trim().is_empty()
        || params.end_time.trim().is_empty()
    {
        return Err(ApiError::Validation(
            "barberId, serviceId, date, startTime and endTime are required".into(),
        ));
    }
    let date = normalize_date(&params.date)?;

    let mut conn = db.acquire().await?;
    db::begin_immediate(&mut conn).await?;

    let booking_id = match reserve_slot(&mut conn, params, actor, date).await {
        Ok(booking_id) => booking_id,
        Err(err) => {
            db::rollback(&mut conn).await;
            return Err(err);
        }
    };
    if let Err(err) = db::commit(&mut conn).await {
        db::rollback(&mut conn).await;
        return Err(err.into());
    }
    drop(conn);

    fetch_details(db, &booking_id).await
}

async fn reserve_slot(
    conn: &mut SqliteConnection,
    params: &CreateBookingParams,
    actor: &UserRow,
    date: NaiveDate,
) -> ApiResult<String> {
    let start_time = params.start_time.trim();
    let end_time = params.end_time.trim();

    let day: Option<(String,)> =
        sqlx::query_as("SELECT id FROM availability_days WHERE barber_id = ? AND date = ?")
            .bind(&params.barber_id)
            .bind(date)
            .fetch_optional(&mut *conn)
            .await?;
    let Some((day_id,)) = day else {
        return Err(ApiError::NotFound(
            "no availability found for this barber on this date".into(),
        ));
    };

    let slot: Option<(bool,)> = sqlx::query_as(
        "SELECT is_booked FROM slots WHERE day_id = ? AND start_time = ? AND end_time = ?",
    )
    .bind(&day_id)
    .bind(start_time)
    .bind(end_time)
    .fetch_optional(&mut *conn)
    .await?;
    let Some((is_booked,)) = slot else {
        return Err(ApiError::NotFound(
            "slot not found in barber availability".into(),
        ));
    };
    if is_booked {
        return Err(ApiError::AlreadyBooked);
    }

    let service: Option<(String,)> =
        sqlx::query_as("SELECT id FROM services WHERE id = ? AND is_active = 1")
            .bind(&params.service_id)
            .fetch_optional(&mut *conn)
            .await?;
    if service.is_none() {
        return Err(ApiError::NotFound("service not found".into()));
    }

    // Walk-in: a receptionist booking on behalf of an unauthenticated
    // customer identified by name + phone. Everyone else books for
    // themselves.
    let customer_name = params.customer_name.as_deref().map(str::trim).unwrap_or("");
    let customer_phone = params.customer_phone.as_deref().map(str::trim).unwrap_or("");
    let walk_in = actor.role == Role::Receptionist
        && !customer_name.is_empty()
        && !customer_phone.is_empty();

    let (beneficiary, booked_by) = if walk_in {
        let user = identity::ensure_walk_in(&mut *conn, customer_name, customer_phone).await?;
        (user, Some(actor.id.clone()))
    } else {
        (actor.clone(), None)
    };

    let booking_id = new_id();
    sqlx::query(
        r#"INSERT INTO bookings (id, user_id, barber_id, service_id, booking_date,
                                 slot_start_time, slot_end_time, status, availability_id,
                                 customer_name, customer_phone, booked_by, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&booking_id)
    .bind(&beneficiary.id)
    .bind(&params.barber_id)
    .bind(&params.service_id)
    .bind(date)
    .bind(start_time)
    .bind(end_time)
    .bind(BookingStatus::Booked)
    .bind(&day_id)
    .bind(&beneficiary.name)
    .bind(&beneficiary.phone)
    .bind(&booked_by)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;

    // The conditional claim is what makes the reservation exactly-once:
    // a concurrent transaction that already flipped the flag leaves zero
    // rows for this update, and the whole transaction rolls back.
    let claimed = sqlx::query(
        r#"UPDATE slots SET is_booked = 1, booked_by = ?, booking_id = ?
           WHERE day_id = ? AND start_time = ? AND end_time = ? AND is_booked = 0"#,
    )
    .bind(&beneficiary.id)
    .bind(&booking_id)
    .bind(&day_id)
    .bind(start_time)
    .bind(end_time)
    .execute(&mut *conn)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(ApiError::AlreadyBooked);
    }

    Ok(booking_id)
}

/// Cancels a booked appointment and frees its slot, atomically. The slot is
/// only cleared when it still points at this booking, so a slot list that
/// was re-created in the meantime is left alone.
pub async fn cancel_booking(
    db: &SqlitePool,
    booking_id: &str,
    actor: &UserRow,
) -> ApiResult<BookingDetailsRow> {
    let mut conn = db.acquire().await?;
    db::begin_immediate(&mut conn).await?;

    if let Err(err) = apply_cancel(&mut conn, booking_id, actor).await {
        db::rollback(&mut conn).await;
        return Err(err);
    }
    if let Err(err) = db::commit(&mut conn).await {
        db::rollback(&mut conn).await;
        return Err(err.into());
    }
    drop(conn);

    fetch_details(db, booking_id).await
}

async fn apply_cancel(
    conn: &mut SqliteConnection,
    booking_id: &str,
    actor: &UserRow,
) -> ApiResult<()> {
    let booking = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = ?"))
        .bind(booking_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::NotFound("booking not found".into()))?;

    policy::authorize(
        actor,
        Operation::CancelBooking {
            beneficiary_id: &booking.user_id,
        },
    )?;

    if booking.status != BookingStatus::Booked {
        return Err(ApiError::InvalidState(
            "only booked appointments can be cancelled".into(),
        ));
    }

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(BookingStatus::Cancelled)
        .bind(booking_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        r#"UPDATE slots SET is_booked = 0, booked_by = NULL, booking_id = NULL
           WHERE day_id = ? AND start_time = ? AND end_time = ? AND booking_id = ?"#,
    )
    .bind(&booking.availability_id)
    .bind(&booking.slot_start_time)
    .bind(&booking.slot_end_time)
    .bind(booking_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Marks a booked appointment as completed. The slot stays occupied; the
/// time was used.
pub async fn complete_booking(
    db: &SqlitePool,
    booking_id: &str,
    actor: &UserRow,
) -> ApiResult<BookingDetailsRow> {
    let booking = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = ?"))
        .bind(booking_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("booking not found".into()))?;

    policy::authorize(
        actor,
        Operation::CompleteBooking {
            barber_id: &booking.barber_id,
        },
    )?;

    if booking.status != BookingStatus::Booked {
        return Err(ApiError::InvalidState(
            "only booked appointments can be completed".into(),
        ));
    }

    sqlx::query("UPDATE bookings SET status = ? WHERE id = ?")
        .bind(BookingStatus::Completed)
        .bind(booking_id)
        .execute(db)
        .await?;

    fetch_details(db, booking_id).await
}

pub async fn list_user_bookings(
    db: &SqlitePool,
    user_id: &str,
    status: Option<BookingStatus>,
    date: Option<NaiveDate>,
) -> ApiResult<Vec<BookingDetailsRow>> {
    let bookings = sqlx::query_as::<_, BookingDetailsRow>(&format!(
        r#"{SELECT_DETAILS}
           WHERE b.user_id = ?
             AND (? IS NULL OR b.status = ?)
             AND (? IS NULL OR b.booking_date = ?)
           ORDER BY b.booking_date, b.slot_start_time"#
    ))
    .bind(user_id)
    .bind(status)
    .bind(status)
    .bind(date)
    .bind(date)
    .fetch_all(db)
    .await?;
    Ok(bookings)
}

/// Active bookings for one barber, optionally narrowed to a day. Barbers see
/// their own; admins and receptionists see everyone's.
pub async fn list_barber_bookings(
    db: &SqlitePool,
    barber_id: &str,
    date: Option<NaiveDate>,
    actor: &UserRow,
) -> ApiResult<Vec<BookingDetailsRow>> {
    policy::authorize(actor, Operation::ViewBarberBookings { barber_id })?;

    let bookings = sqlx::query_as::<_, BookingDetailsRow>(&format!(
        r#"{SELECT_DETAILS}
           WHERE b.barber_id = ? AND b.status = ?
             AND (? IS NULL OR b.booking_date = ?)
           ORDER BY b.slot_start_time"#
    ))
    .bind(barber_id)
    .bind(BookingStatus::Booked)
    .bind(date)
    .bind(date)
    .fetch_all(db)
    .await?;
    Ok(bookings)
}

async fn fetch_details(db: &SqlitePool, booking_id: &str) -> ApiResult<BookingDetailsRow> {
    let details = sqlx::query_as::<_, BookingDetailsRow>(&format!(
        "{SELECT_DETAILS} WHERE b.id = ?"
    ))
    .bind(booking_id)
    .fetch_one(db)
    .await?;
    Ok(details)
}
