use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// How many working days make up one instructional batch.
const BATCH_LENGTH: u32 = 7;
/// Batches placed per month.
const BATCHES_PER_MONTH: u32 = 3;
/// Working days left free between consecutive batches.
const GAP_LENGTH: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Selectable,
    Blocked,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub day: u32,
    /// 0 = Sunday .. 6 = Saturday.
    pub weekday: u32,
    pub status: DayStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_number: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthPlan {
    pub year: i32,
    pub month: u32,
    pub days_in_month: u32,
    pub days: Vec<DayPlan>,
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let leap = (year % 4 == 0 && year % 100 != 0) || year % 400 == 0;
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if leap => 29,
        2 => 28,
        _ => 30,
    }
}

fn weekday_of(year: i32, month: u32, day: u32) -> u32 {
    // Caller guarantees day is within the month, so the date always exists.
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0)
}

/// Place up to three 7-working-day batches into the month, two working days
/// apart, skipping Sundays. Pure function of the two inputs.
///
/// Sundays never count toward a batch or a gap but still advance the cursor.
/// Running out of month mid-batch or mid-gap ends placement early; the rest
/// of the month is simply blocked.
pub fn month_plan(year: i32, month: u32) -> MonthPlan {
    let total = days_in_month(year, month);

    // assignments[d - 1] = (batch_number, day_number) for selectable days.
    let mut assignments: Vec<Option<(i64, i64)>> = vec![None; total as usize];

    let mut current_day: u32 = 1;
    let mut batch_count: u32 = 0;
    while batch_count < BATCHES_PER_MONTH && current_day <= total {
        // Consume up to 7 working days for this batch.
        let mut consumed: u32 = 0;
        while consumed < BATCH_LENGTH && current_day <= total {
            if weekday_of(year, month, current_day) != 0 {
                consumed += 1;
                assignments[(current_day - 1) as usize] =
                    Some((i64::from(batch_count) + 1, i64::from(consumed)));
            }
            current_day += 1;
        }
        batch_count += 1;

        if batch_count < BATCHES_PER_MONTH {
            // Gap of exactly 2 working days before the next batch.
            let mut gap: u32 = 0;
            while gap < GAP_LENGTH && current_day <= total {
                if weekday_of(year, month, current_day) != 0 {
                    gap += 1;
                }
                current_day += 1;
            }
        }
    }

    let days = (1..=total)
        .map(|day| {
            let weekday = weekday_of(year, month, day);
            let assigned = assignments[(day - 1) as usize];
            // Sundays are never assigned, but keep the guard explicit.
            let selectable = assigned.is_some() && weekday != 0;
            DayPlan {
                day,
                weekday,
                status: if selectable {
                    DayStatus::Selectable
                } else {
                    DayStatus::Blocked
                },
                batch_number: assigned.map(|(b, _)| b),
                day_number: assigned.map(|(_, n)| n),
            }
        })
        .collect();

    MonthPlan {
        year,
        month,
        days_in_month: total,
        days,
    }
}
