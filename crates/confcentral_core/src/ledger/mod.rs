//! Transactional ledgers over profile membership sets and entity counters.
//!
//! # Responsibility
//! - Keep `seats_available` and `wish_list_count` consistent with the profile
//!   id-sets that reference them.
//!
//! # Invariants
//! - Every ledger operation is one `BEGIN IMMEDIATE` transaction covering the
//!   profile and the counted entity; concurrent operations serialize.
//! - Contention outliving the attempt limit surfaces as `Transient`.

pub mod registration;
pub mod wishlist;

pub use registration::RegistrationLedger;
pub use wishlist::WishlistLedger;

use crate::error::{ConferenceError, ConferenceResult};
use crate::repo::profile_repo::ProfileRepository;

fn ensure_profile(profiles: &dyn ProfileRepository, user_id: &str) -> ConferenceResult<()> {
    if profiles.profile_exists(user_id)? {
        return Ok(());
    }
    Err(ConferenceError::NotFound(format!(
        "no profile found for user: {user_id}"
    )))
}
