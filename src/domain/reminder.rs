use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::{
    error::WorkerError,
    notification::NotificationMethod,
    schedule::{Recurrence, parse_timezone}
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    Active,
    Completed,
    Disabled
}

/// When a reminder fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderKind {
    /// Fires once at an absolute epoch-millis timestamp
    Adhoc { fire_at: i64 },
    /// Fires repeatedly per a human-readable spec, evaluated in the reminder's timezone
    Recurring { spec: String }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id:    String,
    pub entry_id:       String,
    pub kind:           ReminderKind,
    pub notify_methods: Vec<NotificationMethod>,
    pub message:        Option<String>,
    pub tz:             String,
    pub status:         ReminderStatus,
    pub date_created:   i64,
    pub date_updated:   i64
}

impl Reminder {
    pub fn adhoc(reminder_id: &str, entry_id: &str, fire_at: i64, tz: &str) -> Self {
        Self::new(reminder_id, entry_id, ReminderKind::Adhoc { fire_at }, tz)
    }

    pub fn recurring(reminder_id: &str, entry_id: &str, spec: &str, tz: &str) -> Self {
        Self::new(reminder_id, entry_id, ReminderKind::Recurring { spec: spec.to_string() }, tz)
    }

    fn new(reminder_id: &str, entry_id: &str, kind: ReminderKind, tz: &str) -> Self {
        Self {
            reminder_id: reminder_id.to_string(),
            entry_id: entry_id.to_string(),
            kind,
            notify_methods: vec![NotificationMethod::Web],
            message: None,
            tz: tz.to_string(),
            status: ReminderStatus::Active,
            date_created: 0,
            date_updated: 0
        }
    }

    pub fn with_methods(mut self, methods: &[NotificationMethod]) -> Self {
        self.notify_methods = methods.to_vec();
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = Some(message.to_string());
        self
    }

    pub fn with_status(mut self, status: ReminderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ReminderStatus::Active
    }

    /// The stored spec string: the fire timestamp for adhoc reminders
    pub fn spec(&self) -> String {
        match &self.kind {
            ReminderKind::Adhoc { fire_at } => fire_at.to_string(),
            ReminderKind::Recurring { spec } => spec.clone()
        }
    }

    pub fn timezone(&self) -> Result<Tz, WorkerError> {
        parse_timezone(&self.tz)
    }

    /// Reject reminders with an unknown timezone or an unparseable recurrence
    pub fn validate(&self) -> Result<(), WorkerError> {
        self.timezone()?;
        if let ReminderKind::Recurring { spec } = &self.kind {
            Recurrence::parse(spec)?;
        }
        Ok(())
    }

    /// Next fire instant after `reference`
    ///
    /// Adhoc reminders always report their fixed instant; a past-due instant is
    /// clamped to a zero delay by [`delay_until`] so it fires once.
    pub fn next_fire(&self, reference: DateTime<Utc>) -> Result<DateTime<Utc>, WorkerError> {
        let tz = self.timezone()?;
        match &self.kind {
            ReminderKind::Adhoc { fire_at } => {
                let fire = Utc
                    .timestamp_millis_opt(*fire_at)
                    .single()
                    .ok_or_else(|| WorkerError::Validation(format!("Invalid fire timestamp: {}", fire_at)))?;
                Ok(fire)
            }
            ReminderKind::Recurring { spec } => {
                let recurrence = Recurrence::parse(spec)?;
                let next = recurrence.next_after(reference.with_timezone(&tz));
                Ok(next.with_timezone(&Utc))
            }
        }
    }
}

/// Milliseconds to wait from `now` until `fire`, clamped to zero when past due
pub fn delay_until(fire: DateTime<Utc>, now: DateTime<Utc>) -> std::time::Duration {
    let millis = (fire - now).num_milliseconds().max(0);
    std::time::Duration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_adhoc_delay_is_clamped_when_past_due() {
        let now = Utc::now();
        let reminder = Reminder::adhoc("r1", "e1", (now - Duration::minutes(5)).timestamp_millis(), "UTC");

        let fire = reminder.next_fire(now).unwrap();
        assert_eq!(delay_until(fire, now), std::time::Duration::ZERO);
    }

    #[test]
    fn test_adhoc_delay_until_fire() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let reminder = Reminder::adhoc("r1", "e1", (now + Duration::minutes(15)).timestamp_millis(), "Europe/London");

        let fire = reminder.next_fire(now).unwrap();
        assert_eq!(delay_until(fire, now), std::time::Duration::from_secs(15 * 60));
    }

    #[test]
    fn test_invalid_timezone_fails_validation() {
        let reminder = Reminder::adhoc("r1", "e1", 0, "Mars/Olympus_Mons");
        let err = reminder.validate().unwrap_err();
        assert!(matches!(err, WorkerError::Validation(_)));
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn test_invalid_recurrence_fails_validation() {
        let reminder = Reminder::recurring("r1", "e1", "every fortnight", "UTC");
        assert!(matches!(reminder.validate(), Err(WorkerError::Validation(_))));
    }

    #[test]
    fn test_recurring_next_fire_uses_reminder_timezone() {
        // 21:00 UTC is 05:00 the next day in Singapore (UTC+8)
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 21, 0, 0).unwrap();
        let reminder = Reminder::recurring("r1", "e1", "every day 06:00", "Asia/Singapore");

        let fire = reminder.next_fire(now).unwrap();
        assert_eq!(fire, Utc.with_ymd_and_hms(2024, 5, 1, 22, 0, 0).unwrap());
    }
}
