use crate::{
    error::{ApiError, ApiResult},
    models::{Role, UserRow},
};

/// Every mutating operation the booking core exposes. Owner-style exceptions
/// carry the id the actor must match.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    SetAvailability { barber_id: &'a str },
    CreateBooking,
    CancelBooking { beneficiary_id: &'a str },
    CompleteBooking { barber_id: &'a str },
    ViewBarberBookings { barber_id: &'a str },
    ViewDayDashboard,
    ManageServices,
    ManageUsers,
}

/// Static role table evaluated before anything reaches the transaction
/// manager. Inactive accounts are denied everything.
pub fn authorize(actor: &UserRow, operation: Operation<'_>) -> ApiResult<()> {
    if !actor.is_active {
        return Err(ApiError::InactiveAccount);
    }

    let allowed = match operation {
        Operation::SetAvailability { barber_id } => {
            actor.role == Role::Admin || (actor.role == Role::Barber && actor.id == barber_id)
        }
        Operation::CreateBooking => true,
        Operation::CancelBooking { beneficiary_id } => {
            matches!(actor.role, Role::Admin | Role::Receptionist) || actor.id == beneficiary_id
        }
        Operation::CompleteBooking { barber_id } => {
            actor.role == Role::Admin || (actor.role == Role::Barber && actor.id == barber_id)
        }
        Operation::ViewBarberBookings { barber_id } => {
            matches!(actor.role, Role::Admin | Role::Receptionist) || actor.id == barber_id
        }
        Operation::ViewDayDashboard => {
            matches!(actor.role, Role::Admin | Role::Receptionist)
        }
        Operation::ManageServices | Operation::ManageUsers => actor.role == Role::Admin,
    };

    if allowed {
        Ok(())
    } else {
        let reason = match operation {
            Operation::SetAvailability { .. } => "you can only set your own availability",
            Operation::CreateBooking => "you cannot create bookings",
            Operation::CancelBooking { .. } => "you can only cancel your own bookings",
            Operation::CompleteBooking { .. } => "you can only complete your own bookings",
            Operation::ViewBarberBookings { .. } => "you can only view your own bookings",
            Operation::ViewDayDashboard => "admin or receptionist access required",
            Operation::ManageServices | Operation::ManageUsers => "admin access required",
        };
        Err(ApiError::Forbidden(reason.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, role: Role, active: bool) -> UserRow {
        UserRow {
            id: id.to_string(),
            uid: Some(format!("uid-{id}")),
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            role,
            is_active: active,
            active_session_token: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn barbers_manage_only_their_own_availability() {
        let barber = user("b1", Role::Barber, true);
        assert!(authorize(&barber, Operation::SetAvailability { barber_id: "b1" }).is_ok());
        assert!(matches!(
            authorize(&barber, Operation::SetAvailability { barber_id: "b2" }),
            Err(ApiError::Forbidden(_))
        ));

        let admin = user("a1", Role::Admin, true);
        assert!(authorize(&admin, Operation::SetAvailability { barber_id: "b1" }).is_ok());
    }

    #[test]
    fn cancel_allows_owner_admin_and_receptionist() {
        let owner = user("u1", Role::User, true);
        let other = user("u2", Role::User, true);
        let receptionist = user("r1", Role::Receptionist, true);

        assert!(authorize(&owner, Operation::CancelBooking { beneficiary_id: "u1" }).is_ok());
        assert!(
            authorize(&receptionist, Operation::CancelBooking { beneficiary_id: "u1" }).is_ok()
        );
        assert!(matches!(
            authorize(&other, Operation::CancelBooking { beneficiary_id: "u1" }),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn complete_is_for_the_owning_barber_or_admin() {
        let barber = user("b1", Role::Barber, true);
        let receptionist = user("r1", Role::Receptionist, true);

        assert!(authorize(&barber, Operation::CompleteBooking { barber_id: "b1" }).is_ok());
        assert!(matches!(
            authorize(&barber, Operation::CompleteBooking { barber_id: "b2" }),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            authorize(&receptionist, Operation::CompleteBooking { barber_id: "b1" }),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn day_dashboard_is_staff_only() {
        let receptionist = user("r1", Role::Receptionist, true);
        let admin = user("a1", Role::Admin, true);
        let barber = user("b1", Role::Barber, true);

        assert!(authorize(&receptionist, Operation::ViewDayDashboard).is_ok());
        assert!(authorize(&admin, Operation::ViewDayDashboard).is_ok());
        assert!(matches!(
            authorize(&barber, Operation::ViewDayDashboard),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn inactive_accounts_are_denied_everything() {
        let admin = user("a1", Role::Admin, false);
        assert!(matches!(
            authorize(&admin, Operation::ManageUsers),
            Err(ApiError::InactiveAccount)
        ));
        assert!(matches!(
            authorize(&admin, Operation::CreateBooking),
            Err(ApiError::InactiveAccount)
        ));
    }
}
