//! Helpers for working with the server's configured timezone.

use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

use crate::Error;

/// Get the current UTC offset for a canonical timezone name, e.g. "Pacific/Auckland".
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&OffsetDateTime::now_utc()).to_utc())
}

/// Get today's date in the timezone `canonical_timezone`.
///
/// # Errors
///
/// Returns [Error::InvalidTimezoneError] if `canonical_timezone` is not a known timezone.
pub fn local_today(canonical_timezone: &str) -> Result<Date, Error> {
    let offset = get_local_offset(canonical_timezone)
        .ok_or_else(|| Error::InvalidTimezoneError(canonical_timezone.to_owned()))?;

    Ok(OffsetDateTime::now_utc().to_offset(offset).date())
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use crate::Error;

    use super::{get_local_offset, local_today};

    #[test]
    fn utc_has_zero_offset() {
        let offset = get_local_offset("Etc/UTC").unwrap();

        assert!(offset.is_utc());
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        assert_eq!(
            local_today("Middle/Earth"),
            Err(Error::InvalidTimezoneError("Middle/Earth".to_owned()))
        );
    }

    #[test]
    fn today_in_utc_matches_system_clock() {
        let before = OffsetDateTime::now_utc().date();
        let today = local_today("Etc/UTC").unwrap();
        let after = OffsetDateTime::now_utc().date();

        assert!(today == before || today == after);
    }
}
