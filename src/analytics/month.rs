//! Calendar months written as `YYYY-MM`.

use time::{Date, Month, format_description::BorrowedFormatItem, macros::format_description};

use crate::Error;

const MONTH_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]");

/// Parse a month written as `YYYY-MM` into the first day of that month.
///
/// # Errors
///
/// Returns [Error::InvalidMonth] if `text` is not a valid month.
pub fn parse_month(text: &str) -> Result<Date, Error> {
    let invalid = || Error::InvalidMonth(text.to_owned());
    let (year, month) = text.trim().split_once('-').ok_or_else(invalid)?;

    if year.len() != 4 || month.len() != 2 {
        return Err(invalid());
    }

    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u8 = month.parse().map_err(|_| invalid())?;
    let month = Month::try_from(month).map_err(|_| invalid())?;

    Date::from_calendar_date(year, month, 1).map_err(|_| invalid())
}

/// Format the month containing `date` as `YYYY-MM`.
pub fn format_month(date: Date) -> String {
    date.format(MONTH_FORMAT)
        .unwrap_or_else(|_| format!("{:04}-{:02}", date.year(), u8::from(date.month())))
}

/// The first day of the month containing `date`.
pub fn first_day_of_month(date: Date) -> Date {
    date.replace_day(1).unwrap_or(date)
}

/// The last day of the month containing `date`.
pub fn last_day_of_month(date: Date) -> Date {
    date.replace_day(date.month().length(date.year()))
        .unwrap_or(date)
}

/// The first day of the month `count` months before the month containing `date`.
pub fn months_before(date: Date, count: u32) -> Date {
    let mut month = first_day_of_month(date);

    for _ in 0..count {
        month = first_day_of_month(month.previous_day().unwrap_or(month));
    }

    month
}

/// The first day of the month after the month containing `date`.
pub fn next_month(date: Date) -> Date {
    last_day_of_month(date).next_day().unwrap_or(date)
}

#[cfg(test)]
mod month_tests {
    use time::macros::date;

    use crate::Error;

    use super::{format_month, last_day_of_month, months_before, next_month, parse_month};

    #[test]
    fn parses_valid_month() {
        assert_eq!(parse_month("2024-02"), Ok(date!(2024 - 02 - 01)));
    }

    #[test]
    fn rejects_invalid_months() {
        for text in ["2024-13", "2024-2", "24-02", "2024/02", "February", ""] {
            assert_eq!(
                parse_month(text),
                Err(Error::InvalidMonth(text.to_owned())),
                "{text:?} should be rejected"
            );
        }
    }

    #[test]
    fn formats_month() {
        assert_eq!(format_month(date!(2024 - 02 - 29)), "2024-02");
    }

    #[test]
    fn last_day_handles_leap_years() {
        assert_eq!(last_day_of_month(date!(2024 - 02 - 10)), date!(2024 - 02 - 29));
        assert_eq!(last_day_of_month(date!(2023 - 02 - 10)), date!(2023 - 02 - 28));
    }

    #[test]
    fn steps_back_across_years() {
        assert_eq!(months_before(date!(2024 - 03 - 31), 3), date!(2023 - 12 - 01));
        assert_eq!(months_before(date!(2024 - 03 - 31), 0), date!(2024 - 03 - 01));
        assert_eq!(next_month(date!(2023 - 12 - 15)), date!(2024 - 01 - 01));
    }
}
