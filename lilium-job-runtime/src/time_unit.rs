use std::time::Duration;

use crate::error::{JobError, Result};

/// Time unit for interval, delay and timeout values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl std::str::FromStr for TimeUnit {
    type Err = JobError;

    /// Accepts the full lowercase names ("seconds", "minutes", ...).
    /// For shorthand values like "5s" use [`TimeUnit::parse_duration`].
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "milliseconds" => Ok(TimeUnit::Milliseconds),
            "seconds" => Ok(TimeUnit::Seconds),
            "minutes" => Ok(TimeUnit::Minutes),
            "hours" => Ok(TimeUnit::Hours),
            "days" => Ok(TimeUnit::Days),
            _ => Err(JobError::schedule(s, "unknown time unit")),
        }
    }
}

impl TimeUnit {
    pub fn to_duration(self, value: u64) -> Duration {
        match self {
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
            TimeUnit::Minutes => Duration::from_secs(value.saturating_mul(60)),
            TimeUnit::Hours => Duration::from_secs(value.saturating_mul(3_600)),
            TimeUnit::Days => Duration::from_secs(value.saturating_mul(86_400)),
        }
    }

    /// Parse a shorthand like "5s", "10m", "2h", "1d" or "500ms".
    ///
    /// Suffixes are lowercase only and must directly follow the number.
    pub fn parse_duration(s: &str) -> Option<(u64, TimeUnit)> {
        let s = s.trim();
        let split_pos = s.find(|c: char| !c.is_ascii_digit())?;
        if split_pos == 0 {
            return None;
        }

        let (num_str, unit_str) = s.split_at(split_pos);
        let value = num_str.parse::<u64>().ok()?;

        let time_unit = match unit_str {
            "ms" => TimeUnit::Milliseconds,
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            _ => return None,
        };

        Some((value, time_unit))
    }

    /// Resolve a config value into a [`Duration`].
    ///
    /// Shorthand values carry their own unit; a bare number is read in
    /// `default_unit`.
    pub fn resolve(s: &str, default_unit: TimeUnit) -> Result<Duration> {
        if let Some((value, unit)) = Self::parse_duration(s) {
            return Ok(unit.to_duration(value));
        }
        let value = s
            .trim()
            .parse::<u64>()
            .map_err(|_| JobError::schedule(s, "expected a duration like 500ms, 5s, 2m, 1h or 1d"))?;
        Ok(default_unit.to_duration(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shorthand_durations() {
        assert_eq!(TimeUnit::parse_duration("500ms"), Some((500, TimeUnit::Milliseconds)));
        assert_eq!(TimeUnit::parse_duration("5s"), Some((5, TimeUnit::Seconds)));
        assert_eq!(TimeUnit::parse_duration(" 10m "), Some((10, TimeUnit::Minutes)));
        assert_eq!(TimeUnit::parse_duration("2h"), Some((2, TimeUnit::Hours)));
        assert_eq!(TimeUnit::parse_duration("1d"), Some((1, TimeUnit::Days)));
    }

    #[test]
    fn rejects_bad_shorthand() {
        assert_eq!(TimeUnit::parse_duration("5S"), None);
        assert_eq!(TimeUnit::parse_duration("5 s"), None);
        assert_eq!(TimeUnit::parse_duration("s"), None);
        assert_eq!(TimeUnit::parse_duration("500"), None);
        assert_eq!(TimeUnit::parse_duration(""), None);
    }

    #[test]
    fn resolve_uses_default_unit_for_bare_numbers() {
        assert_eq!(
            TimeUnit::resolve("1500", TimeUnit::Milliseconds).unwrap(),
            Duration::from_millis(1500)
        );
        assert_eq!(
            TimeUnit::resolve("3", TimeUnit::Seconds).unwrap(),
            Duration::from_secs(3)
        );
        assert_eq!(
            TimeUnit::resolve("2m", TimeUnit::Milliseconds).unwrap(),
            Duration::from_secs(120)
        );
        assert!(TimeUnit::resolve("soon", TimeUnit::Seconds).is_err());
    }

    #[test]
    fn time_unit_from_full_name() {
        assert_eq!("Seconds".parse::<TimeUnit>().unwrap(), TimeUnit::Seconds);
        assert!("secs".parse::<TimeUnit>().is_err());
    }
}
