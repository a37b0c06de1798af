//! Outbound notification contract.

use crate::error::ConferenceResult;
use crate::model::ConferenceId;
use log::info;

/// Delivers fire-and-forget notifications.
pub trait Notifier: Send + Sync {
    /// Confirms to the organizer that a conference was created.
    fn conference_created(
        &self,
        email: &str,
        conference_id: ConferenceId,
        conference_name: &str,
    ) -> ConferenceResult<()>;
}

/// Notifier that records deliveries in the log.
///
/// Only ids are logged; addresses and names stay out of log files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn conference_created(
        &self,
        _email: &str,
        conference_id: ConferenceId,
        _conference_name: &str,
    ) -> ConferenceResult<()> {
        info!(
            "event=confirmation_email module=notify status=ok conference_id={conference_id}"
        );
        Ok(())
    }
}
