//! Recurrence grammar for recurring reminders
//!
//! ```text
//! spec      := "every" ( interval | daily | weekly )
//! interval  := [N] ("minute"|"minutes"|"hour"|"hours") [ "from" HH:MM "to" HH:MM ]
//! daily     := "day" times
//! weekly    := weekday ("," weekday)* times
//! times     := HH:MM ("," HH:MM)*
//! ```
//!
//! All wall-clock values are interpreted in the reminder's own timezone.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::domain::error::WorkerError;

const PREVIEW_FORMAT: &str = "%a %d %B %Y at %H:%M";
/// Longest interval step, so every parsed recurrence has a representable next fire
const MAX_INTERVAL_DAYS: i64 = 366;

/// Parse an IANA timezone name, never falling back to the system zone
pub fn parse_timezone(tz: &str) -> Result<Tz, WorkerError> {
    tz.parse::<Tz>().map_err(|_| WorkerError::Validation(format!("Invalid timezone code: {}", tz)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recurrence {
    /// Fixed step from the reference instant, or aligned to `from` inside a daily window
    Interval { step: Duration, window: Option<(NaiveTime, NaiveTime)> },
    Daily { times: Vec<NaiveTime> },
    Weekly { days: Vec<Weekday>, times: Vec<NaiveTime> }
}

fn invalid(spec: &str, rule: &str) -> WorkerError {
    WorkerError::Validation(format!("Invalid schedule '{}': {}", spec, rule))
}

fn parse_time(spec: &str, token: &str) -> Result<NaiveTime, WorkerError> {
    NaiveTime::parse_from_str(token, "%H:%M")
        .map_err(|_| invalid(spec, &format!("times must use HH:MM (24h) format, found '{}'", token)))
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    match token {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None
    }
}

fn parse_times(spec: &str, tokens: &[&str]) -> Result<Vec<NaiveTime>, WorkerError> {
    if tokens.is_empty() {
        return Err(invalid(spec, "expected at least one HH:MM time after the day"));
    }
    let mut times = tokens.iter().map(|token| parse_time(spec, token)).collect::<Result<Vec<_>, _>>()?;
    times.sort();
    times.dedup();
    Ok(times)
}

/// Map a local wall-clock time onto the zone
///
/// Ambiguous times (DST fall back) resolve to the earliest instant; times inside
/// a DST gap move forward to the first valid local time after the gap.
fn resolve_local(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    for step in 0..=4 {
        if let Some(resolved) = tz.from_local_datetime(&(naive + Duration::minutes(30 * step))).earliest() {
            return resolved;
        }
    }
    tz.from_utc_datetime(&naive)
}

impl Recurrence {
    pub fn parse(spec: &str) -> Result<Self, WorkerError> {
        let normalized = spec.trim().to_lowercase();
        let rest = normalized
            .strip_prefix("every")
            .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
            .ok_or_else(|| invalid(spec, "a schedule must start with 'every'"))?;

        let tokens: Vec<&str> =
            rest.split(|c: char| c.is_whitespace() || c == ',').filter(|token| !token.is_empty()).collect();

        let (count, tokens) = match tokens.split_first() {
            Some((first, remaining)) if first.chars().all(|c| c.is_ascii_digit()) => {
                let count: i64 = first.parse().map_err(|_| invalid(spec, "interval count is too large"))?;
                if count == 0 {
                    return Err(invalid(spec, "interval count must be greater than zero"));
                }
                (Some(count), remaining)
            }
            _ => (None, &tokens[..])
        };

        let Some((unit, remaining)) = tokens.split_first() else {
            return Err(invalid(spec, "expected a unit (minutes, hours, day) or weekday after 'every'"));
        };

        match *unit {
            "minute" | "minutes" | "hour" | "hours" => {
                let count = count.unwrap_or(1);
                let step = if unit.starts_with("minute") {
                    Duration::try_minutes(count)
                } else {
                    Duration::try_hours(count)
                };
                let step = step
                    .filter(|step| *step <= Duration::days(MAX_INTERVAL_DAYS))
                    .ok_or_else(|| invalid(spec, "interval is too large, the maximum is 366 days"))?;
                let window = match remaining {
                    [] => None,
                    ["from", from, "to", to] => {
                        let from = parse_time(spec, from)?;
                        let to = parse_time(spec, to)?;
                        if from >= to {
                            return Err(invalid(spec, "window start must be before window end"));
                        }
                        Some((from, to))
                    }
                    _ => return Err(invalid(spec, "an interval may only be followed by 'from HH:MM to HH:MM'"))
                };
                Ok(Recurrence::Interval { step, window })
            }
            "day" | "days" => {
                if count.is_some_and(|count| count != 1) {
                    return Err(invalid(spec, "daily schedules are written as 'every day HH:MM'"));
                }
                Ok(Recurrence::Daily { times: parse_times(spec, remaining)? })
            }
            other => {
                if count.is_some() {
                    return Err(invalid(spec, &format!("unknown interval unit '{}', expected minutes or hours", other)));
                }
                let mut days = Vec::new();
                let mut index = 0;
                while let Some(day) = tokens.get(index).and_then(|token| parse_weekday(token)) {
                    if !days.contains(&day) {
                        days.push(day);
                    }
                    index += 1;
                }
                if days.is_empty() {
                    return Err(invalid(
                        spec,
                        &format!("unknown unit '{}', expected minutes, hours, day or a weekday name", other)
                    ));
                }
                Ok(Recurrence::Weekly { days, times: parse_times(spec, &tokens[index..])? })
            }
        }
    }

    /// First occurrence strictly after `after`, in the same zone
    pub fn next_after(&self, after: DateTime<Tz>) -> DateTime<Tz> {
        let tz = after.timezone();
        let today = after.date_naive();

        match self {
            Recurrence::Interval { step, window: None } => after + *step,
            Recurrence::Interval { step, window: Some((from, to)) } => {
                for offset in 0..=2 {
                    let date = today + Duration::days(offset);
                    let mut time = *from;
                    loop {
                        let candidate = resolve_local(&tz, date.and_time(time));
                        if candidate > after {
                            return candidate;
                        }
                        let (next, wrapped) = time.overflowing_add_signed(*step);
                        if wrapped != 0 || next > *to {
                            break;
                        }
                        time = next;
                    }
                }
                after + *step
            }
            Recurrence::Daily { times } => Self::next_on_days(&tz, after, today, times, |_| true),
            Recurrence::Weekly { days, times } => {
                Self::next_on_days(&tz, after, today, times, |date| days.contains(&date.weekday()))
            }
        }
    }

    fn next_on_days(
        tz: &Tz,
        after: DateTime<Tz>,
        today: NaiveDate,
        times: &[NaiveTime],
        matches: impl Fn(NaiveDate) -> bool
    ) -> DateTime<Tz> {
        for offset in 0..=8 {
            let date = today + Duration::days(offset);
            if !matches(date) {
                continue;
            }
            for time in times {
                let candidate = resolve_local(tz, date.and_time(*time));
                if candidate > after {
                    return candidate;
                }
            }
        }
        after + Duration::days(7)
    }

    /// The next `count` occurrences after `after`
    pub fn iterate(&self, after: DateTime<Tz>, count: usize) -> Vec<DateTime<Tz>> {
        let mut fires = Vec::with_capacity(count);
        let mut cursor = after;
        for _ in 0..count {
            cursor = self.next_after(cursor);
            fires.push(cursor);
        }
        fires
    }
}

/// Validate a spec and timezone and compute upcoming fire times without persisting anything
pub fn preview_schedule(
    spec: &str,
    tz: &str,
    now: DateTime<Utc>,
    count: usize
) -> Result<Vec<DateTime<Tz>>, WorkerError> {
    let tz = parse_timezone(tz)?;
    let recurrence = Recurrence::parse(spec)?;
    Ok(recurrence.iterate(now.with_timezone(&tz), count))
}

/// Human readable fire time, e.g. `Mon 06 May 2024 at 09:00`
pub fn format_fire_time(fire: &DateTime<Tz>) -> String {
    fire.format(PREVIEW_FORMAT).to_string()
}
