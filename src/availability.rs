use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    auth::new_id,
    db,
    error::{is_unique_violation, ApiError, ApiResult},
    models::{AvailabilityDay, BarberSummary, Role, SlotRow, UserRow},
    policy::{self, Operation},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotInput {
    pub start_time: String,
    pub end_time: String,
}

/// Returns the barber's slots for a date. A date with nothing defined yet is
/// an empty slot list, not an error.
pub async fn get_availability(
    db: &SqlitePool,
    barber_id: &str,
    date: NaiveDate,
) -> ApiResult<AvailabilityDay> {
    require_barber(db, barber_id).await?;

    let day: Option<(String,)> =
        sqlx::query_as("SELECT id FROM availability_days WHERE barber_id = ? AND date = ?")
            .bind(barber_id)
            .bind(date)
            .fetch_optional(db)
            .await?;

    let Some((day_id,)) = day else {
        return Ok(AvailabilityDay {
            id: None,
            barber_id: barber_id.to_string(),
            date,
            slots: Vec::new(),
        });
    };

    let slots = load_slots(db, &day_id).await?;
    Ok(AvailabilityDay {
        id: Some(day_id),
        barber_id: barber_id.to_string(),
        date,
        slots,
    })
}

/// Replaces the barber's slot list for a date wholesale, all slots starting
/// unoccupied. Rejected while any existing slot for that day is booked.
pub async fn set_availability(
    db: &SqlitePool,
    barber_id: &str,
    date: NaiveDate,
    slots: &[SlotInput],
    actor: &UserRow,
) -> ApiResult<AvailabilityDay> {
    policy::authorize(actor, Operation::SetAvailability { barber_id })?;
    require_barber(db, barber_id).await?;

    for slot in slots {
        if slot.start_time.trim().is_empty() || slot.end_time.trim().is_empty() {
            return Err(ApiError::Validation(
                "each slot must have startTime and endTime".into(),
            ));
        }
    }

    let mut conn = db.acquire().await?;
    db::begin_immediate(&mut conn).await?;

    let day_id = match replace_slots(&mut conn, barber_id, date, slots).await {
        Ok(day_id) => day_id,
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

    let slots = load_slots(db, &day_id).await?;
    Ok(AvailabilityDay {
        id: Some(day_id),
        barber_id: barber_id.to_string(),
        date,
        slots,
    })
}

async fn replace_slots(
    conn: &mut SqliteConnection,
    barber_id: &str,
    date: NaiveDate,
    slots: &[SlotInput],
) -> ApiResult<String> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM availability_days WHERE barber_id = ? AND date = ?")
            .bind(barber_id)
            .bind(date)
            .fetch_optional(&mut *conn)
            .await?;

    let day_id = match existing {
        Some((day_id,)) => {
            let booked: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM slots WHERE day_id = ? AND is_booked = 1")
                    .bind(&day_id)
                    .fetch_one(&mut *conn)
                    .await?;
            if booked > 0 {
                return Err(ApiError::HasActiveBookings);
            }

            sqlx::query("DELETE FROM slots WHERE day_id = ?")
                .bind(&day_id)
                .execute(&mut *conn)
                .await?;
            day_id
        }
        None => {
            let day_id = new_id();
            let created = sqlx::query(
                "INSERT INTO availability_days (id, barber_id, date, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&day_id)
            .bind(barber_id)
            .bind(date)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *conn)
            .await;

            if let Err(err) = created {
                if is_unique_violation(&err) {
                    return Err(ApiError::Conflict(
                        "availability already exists for this date".into(),
                    ));
                }
                return Err(err.into());
            }
            day_id
        }
    };

    for slot in slots {
        let inserted = sqlx::query(
            "INSERT INTO slots (day_id, start_time, end_time, is_booked) VALUES (?, ?, ?, 0)",
        )
        .bind(&day_id)
        .bind(slot.start_time.trim())
        .bind(slot.end_time.trim())
        .execute(&mut *conn)
        .await;

        if let Err(err) = inserted {
            // Slot identity within a day is the (startTime, endTime) pair.
            if is_unique_violation(&err) {
                return Err(ApiError::Validation(format!(
                    "duplicate slot {} - {}",
                    slot.start_time, slot.end_time
                )));
            }
            return Err(err.into());
        }
    }

    Ok(day_id)
}

pub async fn list_barbers(db: &SqlitePool) -> ApiResult<Vec<BarberSummary>> {
    let barbers = sqlx::query_as::<_, BarberSummary>(
        "SELECT id, name, email, phone FROM users WHERE role = ? AND is_active = 1 ORDER BY name",
    )
    .bind(Role::Barber)
    .fetch_all(db)
    .await?;
    Ok(barbers)
}

pub async fn load_slots(db: &SqlitePool, day_id: &str) -> ApiResult<Vec<SlotRow>> {
    let slots = sqlx::query_as::<_, SlotRow>(
        r#"SELECT start_time, end_time, is_booked, booked_by, booking_id
           FROM slots WHERE day_id = ?
           ORDER BY start_time, end_time"#,
    )
    .bind(day_id)
    .fetch_all(db)
    .await?;
    Ok(slots)
}

async fn require_barber(db: &SqlitePool, barber_id: &str) -> ApiResult<()> {
    let found: Option<(String,)> =
        sqlx::query_as("SELECT id FROM users WHERE id = ? AND role = ? LIMIT 1")
            .bind(barber_id)
            .bind(Role::Barber)
            .fetch_optional(db)
            .await?;
    if found.is_none() {
        return Err(ApiError::NotFound("barber not found".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{seed_user, test_pool};

    fn slots(pairs: &[(&str, &str)]) -> Vec<SlotInput> {
        pairs
            .iter()
            .map(|(start, end)| SlotInput {
                start_time: start.to_string(),
                end_time: end.to_string(),
            })
            .collect()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn missing_day_reads_back_as_empty_slots() {
        let db = test_pool().await;
        let barber = seed_user(&db, Role::Barber).await;

        let availability = get_availability(&db, &barber.id, day()).await.unwrap();
        assert!(availability.id.is_none());
        assert!(availability.slots.is_empty());
    }

    #[tokio::test]
    async fn unknown_barber_is_not_found() {
        let db = test_pool().await;
        let customer = seed_user(&db, Role::User).await;

        assert!(matches!(
            get_availability(&db, "nope", day()).await,
            Err(ApiError::NotFound(_))
        ));
        // A user id that exists but is not a barber is equally absent.
        assert!(matches!(
            get_availability(&db, &customer.id, day()).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn set_creates_and_replaces_wholesale() {
        let db = test_pool().await;
        let barber = seed_user(&db, Role::Barber).await;

        let created = set_availability(
            &db,
            &barber.id,
            day(),
            &slots(&[("10:00", "10:30"), ("10:30", "11:00")]),
            &barber,
        )
        .await
        .unwrap();
        assert_eq!(created.slots.len(), 2);
        assert!(created.slots.iter().all(|s| !s.is_booked));

        let replaced = set_availability(
            &db,
            &barber.id,
            day(),
            &slots(&[("14:00", "14:30")]),
            &barber,
        )
        .await
        .unwrap();
        assert_eq!(replaced.id, created.id);
        assert_eq!(replaced.slots.len(), 1);
        assert_eq!(replaced.slots[0].start_time, "14:00");
    }

    #[tokio::test]
    async fn barbers_cannot_set_someone_elses_availability() {
        let db = test_pool().await;
        let barber = seed_user(&db, Role::Barber).await;
        let other = seed_user(&db, Role::Barber).await;
        let admin = seed_user(&db, Role::Admin).await;

        assert!(matches!(
            set_availability(&db, &barber.id, day(), &slots(&[("10:00", "10:30")]), &other).await,
            Err(ApiError::Forbidden(_))
        ));
        assert!(
            set_availability(&db, &barber.id, day(), &slots(&[("10:00", "10:30")]), &admin)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn blank_slot_times_are_rejected() {
        let db = test_pool().await;
        let barber = seed_user(&db, Role::Barber).await;

        assert!(matches!(
            set_availability(&db, &barber.id, day(), &slots(&[("10:00", " ")]), &barber).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_slot_pairs_are_rejected() {
        let db = test_pool().await;
        let barber = seed_user(&db, Role::Barber).await;

        let result = set_availability(
            &db,
            &barber.id,
            day(),
            &slots(&[("10:00", "10:30"), ("10:00", "10:30")]),
            &barber,
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));

        // The aborted replace left nothing behind.
        let availability = get_availability(&db, &barber.id, day()).await.unwrap();
        assert!(availability.slots.is_empty());
    }
}
