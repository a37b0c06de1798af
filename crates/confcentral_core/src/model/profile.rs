//! Attendee profile entity.
//!
//! # Invariants
//! - `user_id` is the identity-provider id and never changes.
//! - Roster and wishlist are sets: an id appears at most once in each.

use super::{ConferenceId, SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Shirt-size preference recorded on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeeShirtSize {
    NotSpecified,
    XsM,
    XsW,
    SM,
    SW,
    MM,
    MW,
    LM,
    LW,
    XlM,
    XlW,
    XxlM,
    XxlW,
    XxxlM,
    XxxlW,
}

impl TeeShirtSize {
    const ALL: [(Self, &'static str); 15] = [
        (Self::NotSpecified, "NOT_SPECIFIED"),
        (Self::XsM, "XS_M"),
        (Self::XsW, "XS_W"),
        (Self::SM, "S_M"),
        (Self::SW, "S_W"),
        (Self::MM, "M_M"),
        (Self::MW, "M_W"),
        (Self::LM, "L_M"),
        (Self::LW, "L_W"),
        (Self::XlM, "XL_M"),
        (Self::XlW, "XL_W"),
        (Self::XxlM, "XXL_M"),
        (Self::XxlW, "XXL_W"),
        (Self::XxxlM, "XXXL_M"),
        (Self::XxxlW, "XXXL_W"),
    ];

    /// Stable storage/wire code, e.g. `XL_W`.
    pub fn code(self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(size, _)| *size == self)
            .map_or("NOT_SPECIFIED", |(_, code)| code)
    }

    /// Parses a storage/wire code, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .find(|(_, code)| *code == wanted)
            .map(|(size, _)| *size)
    }
}

/// Per-user record holding the registration roster and the session wishlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: String,
    pub main_email: String,
    pub tee_shirt_size: TeeShirtSize,
    pub conference_keys_to_attend: BTreeSet<ConferenceId>,
    pub session_keys_in_wishlist: BTreeSet<SessionId>,
}

impl Profile {
    /// Fresh profile with empty roster and wishlist.
    pub fn new(
        user_id: impl Into<UserId>,
        display_name: impl Into<String>,
        main_email: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            main_email: main_email.into(),
            tee_shirt_size: TeeShirtSize::NotSpecified,
            conference_keys_to_attend: BTreeSet::new(),
            session_keys_in_wishlist: BTreeSet::new(),
        }
    }
}

/// User-editable profile fields; `None`/blank values leave the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub tee_shirt_size: Option<TeeShirtSize>,
}

#[cfg(test)]
mod tests {
    use super::TeeShirtSize;

    #[test]
    fn shirt_size_codes_parse_back() {
        for (size, code) in TeeShirtSize::ALL {
            assert_eq!(size.code(), code);
            assert_eq!(TeeShirtSize::parse(&code.to_ascii_lowercase()), Some(size));
        }
        assert_eq!(TeeShirtSize::parse("XXXXL"), None);
    }
}
