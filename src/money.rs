//! Amounts are kept as integer cents and only turned into text at the edges.

pub fn format_money(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    let whole = abs / 100;
    let frac = abs % 100;
    format!("{sign}{whole}.{frac:02}")
}

/// Largest number of digits accepted before the decimal separator. Keeps any
/// realistic number of amounts summable in an `i64`.
pub const MAX_WHOLE_DIGITS: usize = 12;

/// Parses `12`, `12.5`, `12,50` into cents. Negative amounts, more than two
/// fractional digits, more than [`MAX_WHOLE_DIGITS`] whole digits and anything
/// unparsable yield `None`.
pub fn parse_amount_to_cents(input: &str) -> Option<i64> {
    let s = input.trim().replace(',', ".");
    if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
        return None;
    }
    let (whole_str, frac_str) = match s.split_once('.') {
        Some((whole, frac)) => (whole, Some(frac)),
        None => (s.as_str(), None),
    };
    if whole_str.len() > MAX_WHOLE_DIGITS {
        return None;
    }
    let whole: i64 = whole_str.parse().ok()?;
    let frac = match frac_str {
        None => 0,
        Some(frac) => {
            if frac.is_empty() || frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let padded = format!("{frac:0<2}");
            padded.parse::<i64>().ok()?
        }
    };
    whole.checked_mul(100)?.checked_add(frac)
}
