use std::{fmt::Write as _, sync::Arc, thread, time::Duration};

use chrono::{DateTime, Local, TimeZone};

use crate::{
    error::Res,
    feeds::Feed,
    registry::{BlockHandle, Registry},
};

/// Writes the formatted local time into a block at a fixed interval.
pub struct Clock {
    pub registry: Arc<Registry>,
    pub block: BlockHandle,
    /// A `chrono` format string.
    pub format: String,
    pub interval: Duration,
}

/// Formats `time`, returning `None` when the format string has an invalid specifier.
pub fn format_time<Tz: TimeZone>(time: &DateTime<Tz>, format: &str) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::new();
    write!(out, "{}", time.format(format)).ok()?;
    Some(out)
}

impl Feed for Clock {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn run(self: Box<Self>) -> Res {
        loop {
            match format_time(&Local::now(), &self.format) {
                Some(text) => self.registry.update_text(&self.block, &text)?,
                None => log::error!("invalid clock format {:?}", self.format),
            }
            thread::sleep(self.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn formats_like_the_default_config() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 7, 0))
            .expect("valid date")
            .and_utc();
        assert_eq!(
            format_time(&time, "%A, %B %-d %I:%M %p").as_deref(),
            Some("Tuesday, March 5 02:07 PM")
        );
    }

    #[test]
    fn invalid_formats_are_rejected() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
            .and_utc();
        assert_eq!(format_time(&time, "%Q"), None);
    }
}
