use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use mongodb::bson::DateTime as BsonDateTime;

use super::error::{AppError, AppResult};

/// Half-open `[start, end)` range covering one calendar month in UTC.
pub fn month_bounds(month: u32, year: i32) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    if !(1..=12).contains(&month) {
        return Err(AppError::Validation(format!("Mes inválido: {}", month)));
    }

    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::Validation(format!("Fecha inválida: {}/{}", month, year)))?;

    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| AppError::Validation(format!("Fecha inválida: {}/{}", month, year)))?;

    Ok((start, end))
}

/// Current (month, year) in UTC.
pub fn current_period() -> (u32, i32) {
    let now = Utc::now();
    (now.month(), now.year())
}

/// Parses a query date, either RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_date_param(value: &str) -> AppResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::Validation(format!("Fecha inválida: {}", value)))
}

pub fn to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

pub fn to_chrono(dt: BsonDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(dt.timestamp_millis()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds_regular_month() {
        let (start, end) = month_bounds(2, 2024).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-02-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn test_month_bounds_december_rolls_year() {
        let (start, end) = month_bounds(12, 2025).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-12-01T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_month_bounds_rejects_invalid_month() {
        assert!(month_bounds(0, 2025).is_err());
        assert!(month_bounds(13, 2025).is_err());
    }

    #[test]
    fn test_parse_date_param() {
        let day = parse_date_param("2025-11-03").unwrap();
        assert_eq!(day.to_rfc3339(), "2025-11-03T00:00:00+00:00");

        let full = parse_date_param("2025-11-03T10:00:00-03:00").unwrap();
        assert_eq!(full.to_rfc3339(), "2025-11-03T13:00:00+00:00");

        assert!(parse_date_param("03/11/2025").is_err());
    }

    #[test]
    fn test_bson_roundtrip_keeps_millis() {
        let now = Utc.with_ymd_and_hms(2025, 11, 3, 10, 30, 0).unwrap();
        assert_eq!(to_chrono(to_bson(now)), now);
    }
}
