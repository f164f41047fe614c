// Calendar helpers for month-by-month back-fill and CSV timestamp formatting.
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

pub const MONTH_STAMP_FORMAT: &str = "%Y-%m-%d";
pub const DAILY_STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    // Day 1 exists in every month, so with_day(1) cannot fail here.
    date.with_day(1).unwrap_or(date)
}

/// First day of the month before `date`'s month.
pub fn previous_month(date: NaiveDate) -> NaiveDate {
    first_of_month(first_of_month(date) - Duration::days(1))
}

/// First-of-month dates from `from`'s month back to `until`'s month, inclusive.
pub fn months_descending(from: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
    let stop = first_of_month(until);
    let mut month = first_of_month(from);
    let mut months = Vec::new();
    while month >= stop {
        months.push(month);
        month = previous_month(month);
    }
    months
}

pub fn month_stamp(month: NaiveDate) -> String {
    month.format(MONTH_STAMP_FORMAT).to_string()
}

pub fn daily_stamp(now: DateTime<Utc>) -> String {
    now.format(DAILY_STAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_previous_month_crosses_year() {
        assert_eq!(previous_month(date(2024, 1, 1)), date(2023, 12, 1));
        assert_eq!(previous_month(date(2024, 3, 17)), date(2024, 2, 1));
    }

    #[test]
    fn test_months_descending_inclusive() {
        let months = months_descending(date(2023, 2, 14), date(2022, 12, 1));
        assert_eq!(months, vec![date(2023, 2, 1), date(2023, 1, 1), date(2022, 12, 1)]);
    }

    #[test]
    fn test_months_descending_start_mid_month() {
        // The start month is included even when the start date is not the 1st.
        let months = months_descending(date(2023, 1, 20), date(2023, 1, 15));
        assert_eq!(months, vec![date(2023, 1, 1)]);
    }

    #[test]
    fn test_months_descending_empty_when_reversed() {
        assert!(months_descending(date(2022, 5, 1), date(2023, 1, 1)).is_empty());
    }

    #[test]
    fn test_stamps() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 7, 0, 42).unwrap();
        assert_eq!(daily_stamp(now), "2024-06-03T07:00:42");
        assert_eq!(month_stamp(date(2024, 6, 1)), "2024-06-01");
    }
}
