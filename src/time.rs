use chrono::{DateTime, Datelike, Duration, Utc};

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn to_date(ms: i64) -> DateTime<Utc> {
    // from_timestamp_millis returns Option<DateTime<Utc>>
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp_millis(0).unwrap())
}

/// ISO `YYYY-MM-DD` of the Sunday that begins the week containing `ms`.
/// Week snapshots in list history are keyed by this value.
pub fn week_start_of(ms: i64) -> String {
    let date = to_date(ms).date_naive();
    let back = date.weekday().num_days_from_sunday() as i64;
    (date - Duration::days(back)).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_ms_is_reasonable() {
        let a = now_ms();
        assert!(a > 1_500_000_000_000); // after 2017
        assert!(a < 4_100_000_000_000); // before year ~2100
    }

    #[test]
    fn to_date_epoch() {
        let d = to_date(0);
        assert_eq!(d.timestamp_millis(), 0);
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2024-01-10 is a Wednesday; its week began Sunday 2024-01-07.
        let wednesday = chrono::NaiveDate::from_ymd_opt(2024, 1, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(week_start_of(wednesday), "2024-01-07");

        // A Sunday maps to itself.
        let sunday = chrono::NaiveDate::from_ymd_opt(2024, 1, 7)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        assert_eq!(week_start_of(sunday), "2024-01-07");
    }
}
