use chrono::{DateTime, Utc};

use crate::storage::Source;

/// Whether `source` is due for a refresh at `now`.
///
/// Due means strictly more than `refresh_interval` has elapsed since the last
/// successful ingestion; exactly `refresh_interval` is not yet due. Sources
/// that were never fetched sit at the 2000-01-01 sentinel and are always due.
pub fn should_update_at(source: &Source, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(source.last_updated) > source.refresh_interval
}

/// [`should_update_at`] against the current wall clock.
pub fn should_update(source: &Source) -> bool {
    should_update_at(source, Utc::now())
}
