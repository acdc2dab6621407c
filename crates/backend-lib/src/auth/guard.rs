//! Booking-party checks in front of the location endpoints.
//!
//! These gate HTTP access to the location store only. The room relay does not
//! consult them: knowing a booking id is enough to join its room.
use super::Principal;
use crate::bookings::Booking;
use crate::error::AppError;

/// The role a principal plays in a booking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Renter,
    Owner,
}

/// Role of `principal` in `booking`, if any. Renter wins when both match.
pub fn party_of(principal: &Principal, booking: &Booking) -> Option<Party> {
    if principal.user_id == booking.renter {
        Some(Party::Renter)
    } else if principal.user_id == booking.owner {
        Some(Party::Owner)
    } else {
        None
    }
}

pub fn authorize_as_renter(principal: &Principal, booking: &Booking) -> bool {
    party_of(principal, booking) == Some(Party::Renter)
}

pub fn authorize_as_party(principal: &Principal, booking: &Booking) -> bool {
    party_of(principal, booking).is_some()
}

/// [`authorize_as_renter`] as a 403 error
pub fn require_renter(principal: &Principal, booking: &Booking) -> Result<(), AppError> {
    if authorize_as_renter(principal, booking) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You are not the renter for this booking".to_string(),
        ))
    }
}

/// [`authorize_as_party`] as a 403 error
pub fn require_party(principal: &Principal, booking: &Booking) -> Result<Party, AppError> {
    party_of(principal, booking).ok_or_else(|| {
        AppError::Forbidden("You are not associated with this booking".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookings::BookingStatus;
    use chrono::Utc;

    fn booking() -> Booking {
        Booking {
            id: "B1".to_string(),
            renter: "renter-1".to_string(),
            owner: "owner-1".to_string(),
            status: BookingStatus::Confirmed,
            pickup_date: Utc::now(),
            return_date: Utc::now(),
        }
    }

    #[test]
    fn test_renter_authorization() {
        let b = booking();
        assert!(authorize_as_renter(&Principal::new("renter-1"), &b));
        assert!(!authorize_as_renter(&Principal::new("owner-1"), &b));
        assert!(!authorize_as_renter(&Principal::new("stranger"), &b));
    }

    #[test]
    fn test_party_authorization() {
        let b = booking();
        assert!(authorize_as_party(&Principal::new("renter-1"), &b));
        assert!(authorize_as_party(&Principal::new("owner-1"), &b));
        assert!(!authorize_as_party(&Principal::new("stranger"), &b));
    }

    #[test]
    fn test_party_of() {
        let b = booking();
        assert_eq!(party_of(&Principal::new("renter-1"), &b), Some(Party::Renter));
        assert_eq!(party_of(&Principal::new("owner-1"), &b), Some(Party::Owner));
        assert_eq!(party_of(&Principal::new("stranger"), &b), None);
    }

    #[test]
    fn test_require_helpers_map_to_forbidden() {
        let b = booking();
        let err = require_renter(&Principal::new("owner-1"), &b).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = require_party(&Principal::new("stranger"), &b).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(
            require_party(&Principal::new("owner-1"), &b).unwrap(),
            Party::Owner
        );
    }
}
