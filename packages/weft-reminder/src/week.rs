//! The week a reminder belongs to.

use chrono::{Datelike, Days, Local, NaiveDate};

/// The Monday starting the week of `date`; a Monday maps to itself.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// `"<prefix>-<YYYY-MM-DD>"` of the week's Monday.
pub fn week_key(prefix: &str, date: NaiveDate) -> String {
    format!("{}-{}", prefix, week_start(date).format("%Y-%m-%d"))
}

pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monday_is_its_own_start() {
        assert_eq!(week_start(date(2024, 3, 4)), date(2024, 3, 4));
    }

    #[test]
    fn sunday_belongs_to_the_previous_monday() {
        assert_eq!(week_start(date(2024, 3, 10)), date(2024, 3, 4));
    }

    #[test]
    fn key_crosses_year_boundary() {
        assert_eq!(week_key("noclock", date(2025, 1, 1)), "noclock-2024-12-30");
    }
}
