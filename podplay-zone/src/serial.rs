//! `YYYYMMDDnn` serial arithmetic.

use chrono::NaiveDate;

use crate::error::ZoneError;

/// Compute the serial that follows `old` when the zone is edited on `today`.
///
/// - same date: the two-digit suffix increments (`2026101603` → `2026101604`);
/// - any other date: `<today>01`.
///
/// The result is always numerically greater than `old`: a suffix of `99`
/// carries into the date digits, and a serial dated after `today` is
/// incremented instead of being reset backwards.
pub fn next_serial(old: &str, today: NaiveDate) -> Result<String, ZoneError> {
    let old_value = parse(old)?;
    let date_part = &old[..8];
    let today_part = today.format("%Y%m%d").to_string();

    let candidate = if date_part == today_part {
        old_value + 1
    } else {
        parse_date_prefix(&today_part)? * 100 + 1
    };

    let next = if candidate > old_value {
        candidate
    } else {
        old_value + 1
    };
    Ok(format!("{next:010}"))
}

fn parse(serial: &str) -> Result<u64, ZoneError> {
    if serial.len() != 10 || !serial.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ZoneError::InvalidSerial(serial.to_string()));
    }
    serial
        .parse()
        .map_err(|_| ZoneError::InvalidSerial(serial.to_string()))
}

fn parse_date_prefix(date: &str) -> Result<u64, ZoneError> {
    date.parse()
        .map_err(|_| ZoneError::InvalidSerial(date.to_string()))
}
