use serde::{Deserialize, Serialize};

/// Errors surfaced to callers as short symbolic kinds.
///
/// Every registry operation validates fully before mutating, so any of these
/// means room state is untouched. The wire form is the stable code string
/// from [`GameError::code`], not the display message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Game already started")]
    AlreadyStarted,

    #[error("Room is full")]
    RoomFull,

    #[error("Game not started yet")]
    NotStarted,

    #[error("Name already taken in this room")]
    NameTaken,

    #[error("Wrong passcode")]
    BadPasscode,

    #[error("Only the host may do that")]
    OnlyHost,

    #[error("Invalid previous identity")]
    BadOldId,

    #[error("Offer must contain at least one part")]
    EmptyOffer,

    #[error("One or more parts are no longer available")]
    PartsUnavailable,

    #[error("Offer not found or no longer open")]
    OfferNotFound,

    #[error("Not your offer")]
    NotYourOffer,

    #[error("Cannot request your own offer")]
    CannotRequestOwn,

    #[error("Request does not match what the offer asks for")]
    RequestMismatch,

    #[error("Request must contain at least one part")]
    EmptyRequest,

    #[error("You already have a pending request on this offer")]
    AlreadyRequested,

    #[error("Request not found or no longer pending")]
    RequestNotFound,

    /// A supposedly-guarded lookup failed mid-operation. Must never take
    /// down the serialized execution context.
    #[error("Internal error")]
    Internal,
}

impl GameError {
    /// Stable symbolic code sent over the wire.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::AlreadyStarted => "ALREADY_STARTED",
            GameError::RoomFull => "ROOM_FULL",
            GameError::NotStarted => "NOT_STARTED",
            GameError::NameTaken => "NAME_TAKEN",
            GameError::BadPasscode => "BAD_PASSCODE",
            GameError::OnlyHost => "ONLY_HOST",
            GameError::BadOldId => "BAD_OLD_ID",
            GameError::EmptyOffer => "EMPTY_OFFER",
            GameError::PartsUnavailable => "PARTS_UNAVAILABLE",
            GameError::OfferNotFound => "OFFER_NOT_FOUND",
            GameError::NotYourOffer => "NOT_YOUR_OFFER",
            GameError::CannotRequestOwn => "CANNOT_REQUEST_OWN",
            GameError::RequestMismatch => "REQUEST_MISMATCH",
            GameError::EmptyRequest => "EMPTY_REQUEST",
            GameError::AlreadyRequested => "ALREADY_REQUESTED",
            GameError::RequestNotFound => "REQUEST_NOT_FOUND",
            GameError::Internal => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(GameError::RoomNotFound.code(), "ROOM_NOT_FOUND");
        assert_eq!(GameError::PartsUnavailable.code(), "PARTS_UNAVAILABLE");
        assert_eq!(GameError::RequestMismatch.code(), "REQUEST_MISMATCH");
        assert_eq!(GameError::AlreadyRequested.code(), "ALREADY_REQUESTED");
    }

    #[test]
    fn test_display_is_human_readable() {
        assert_eq!(GameError::RoomFull.to_string(), "Room is full");
    }
}
