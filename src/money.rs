//! Balance display formatting.
//!
//! Turns the feed's decimal text into the canonical display form
//! `"<grouped-integer>[.<fraction>] <currency>"`, e.g. `"-1 234 567.89 CZK"`.

use crate::types::RawBalance;

/// Thousands separator inserted between 3-digit groups.
const GROUP_SEPARATOR: char = ' ';

/// Split `[-]digits[.digits]` into sign, integer part and fraction (with
/// its `.`). `None` for anything else.
fn split_decimal(raw: &str) -> Option<(&str, &str, &str)> {
    let (sign, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw),
    };

    let (int_part, fraction) = match unsigned.find('.') {
        Some(dot) => unsigned.split_at(dot),
        None => (unsigned, ""),
    };

    let valid = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().skip(1).all(|b| b.is_ascii_digit());
    valid.then_some((sign, int_part, fraction))
}

/// True if `raw` is an optional `-`, at least one ASCII digit and an
/// optional `.` followed by digits. Exactly the inputs `format_money` groups.
pub fn is_plain_decimal(raw: &str) -> bool {
    split_decimal(raw).is_some()
}

/// Group the integer part of a decimal string into 3-digit clusters.
///
/// The fractional part (including its `.`) is appended verbatim. Input
/// rejected by `is_plain_decimal` is returned unchanged.
pub fn format_money(raw: &str) -> String {
    let Some((sign, int_part, fraction)) = split_decimal(raw) else {
        return raw.to_string();
    };

    let mut out = String::with_capacity(raw.len() + int_part.len() / 3);
    out.push_str(sign);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(GROUP_SEPARATOR);
        }
        out.push(digit);
    }
    out.push_str(fraction);
    out
}

/// Full display string for a fetched balance: formatted amount plus currency.
pub fn format_balance(balance: &RawBalance) -> String {
    format!("{} {}", format_money(&balance.value), balance.currency)
}
