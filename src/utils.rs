use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `"3.00%"`
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// `"$1,234.56"`
pub fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Whole days since `created`, zero for future timestamps
pub fn age_days(created: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(created).num_days().max(0)
}

/// `[today - days, today)` as dates. The start clamps to the earliest
/// representable date.
pub fn date_window(today: NaiveDate, days: u32) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round2() {
        assert_eq!(round2(66.6666), 66.67);
        assert_eq!(round2(33.3333), 33.33);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round2(0.005), 0.01);
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(3.0), "3.00%");
        assert_eq!(format_percent(12.345), "12.35%");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(100.0), "$100.00");
        assert_eq!(format_money(1234.5), "$1,234.50");
        assert_eq!(format_money(1234567.891), "$1,234,567.89");
        assert_eq!(format_money(-5.0), "-$5.00");
    }

    #[test]
    fn test_age_days() {
        let now = Utc::now();
        assert_eq!(age_days(now - Duration::days(45), now), 45);
        assert_eq!(age_days(now + Duration::days(1), now), 0);
    }

    #[test]
    fn test_date_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let (start, end) = date_window(today, 30);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(end, today);

        let (start, _) = date_window(today, u32::MAX);
        assert_eq!(start, NaiveDate::MIN);
    }
}
