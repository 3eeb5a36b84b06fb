use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Barber,
    Receptionist,
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Booked,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ServiceGender {
    Male,
    Female,
    Unisex,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub uid: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub active_session_token: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SlotRow {
    pub start_time: String,
    pub end_time: String,
    pub is_booked: bool,
    pub booked_by: Option<String>,
    pub booking_id: Option<String>,
}

/// A barber's bookable slots for one calendar day. `id` is absent when no
/// availability has been defined yet; the slot list is empty in that case.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityDay {
    pub id: Option<String>,
    pub barber_id: String,
    pub date: NaiveDate,
    pub slots: Vec<SlotRow>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingRow {
    pub id: String,
    pub user_id: String,
    pub barber_id: String,
    pub service_id: String,
    pub booking_date: NaiveDate,
    pub slot_start_time: String,
    pub slot_end_time: String,
    pub status: BookingStatus,
    pub availability_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub booked_by: Option<String>,
    pub created_at: String,
}

/// Booking joined with barber / customer / service display fields.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetailsRow {
    pub id: String,
    pub user_id: String,
    pub barber_id: String,
    pub service_id: String,
    pub booking_date: NaiveDate,
    pub slot_start_time: String,
    pub slot_end_time: String,
    pub status: BookingStatus,
    pub availability_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub booked_by: Option<String>,
    pub created_at: String,
    pub barber_name: String,
    pub user_name: String,
    pub user_phone: String,
    pub service_name: String,
    pub service_duration: i64,
    pub service_price: f64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub duration: i64,
    pub price: f64,
    pub gender: ServiceGender,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BarberSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Accepts a plain `YYYY-MM-DD` day or a full RFC 3339 timestamp, normalized
/// to the calendar day.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, ApiError> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(stamp) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(stamp.date_naive());
    }
    Err(ApiError::Validation(format!("invalid date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_day() {
        let date = normalize_date("2024-06-01").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn normalizes_timestamp_to_calendar_day() {
        let date = normalize_date("2024-06-01T14:30:00+02:00").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(matches!(
            normalize_date("next tuesday"),
            Err(ApiError::Validation(_))
        ));
    }
}
