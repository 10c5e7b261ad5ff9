//! Business-day calendar arithmetic (Monday to Friday, no holiday table).

use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First business day strictly after `date`.
pub fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while !is_business_day(next) {
        next += Duration::days(1);
    }
    next
}

/// `count` consecutive business days following `after`.
pub fn business_days_after(after: NaiveDate, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut current = after;
    for _ in 0..count {
        current = next_business_day(current);
        dates.push(current);
    }
    dates
}

/// Business days in `[start, end]`.
pub fn business_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = start;
    while current <= end {
        if is_business_day(current) {
            dates.push(current);
        }
        current += Duration::days(1);
    }
    dates
}
