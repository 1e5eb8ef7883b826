//! Number formatting for email templates.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};

/// Format `number` as dollars with two decimal places, e.g. "$1,234.50" or "-$12.00".
pub fn format_currency(number: f64) -> String {
    static POSITIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let positive_fmt = POSITIVE_FMT.get_or_init(|| {
        Formatter::currency("$")
            .expect("\"$\" is a valid currency prefix")
            .precision(Precision::Decimals(2))
    });

    static NEGATIVE_FMT: OnceLock<Formatter> = OnceLock::new();

    let negative_fmt = NEGATIVE_FMT.get_or_init(|| {
        Formatter::currency("-$")
            .expect("\"-$\" is a valid currency prefix")
            .precision(Precision::Decimals(2))
    });

    let formatted_string = if number < 0.0 {
        negative_fmt.fmt_string(number.abs())
    } else if number > 0.0 {
        positive_fmt.fmt_string(number)
    } else {
        // Zero is hardcoded as "0", so we must specify the formatted string for zero
        return "$0.00".to_owned();
    };

    pad_cents(formatted_string)
}

/// numfmt drops trailing zeros, e.g. "12.30" is rendered as "12.3" and
/// "12.00" as "12".
fn pad_cents(formatted_string: String) -> String {
    match formatted_string.rfind('.') {
        None => format!("{formatted_string}.00"),
        Some(dot) if formatted_string.len() - dot == 2 => format!("{formatted_string}0"),
        Some(_) => formatted_string,
    }
}
