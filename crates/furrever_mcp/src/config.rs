use chrono::{FixedOffset, NaiveDateTime, Offset, Utc};

use crate::error::TimelineError;

pub const DEFAULT_UPCOMING_LIMIT: usize = 5;

/// What a treatment plan without `progressPercentage` contributes to averages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingProgress {
    /// Counted as 0%, matching what the backend stores for new plans.
    #[default]
    Zero,
    /// Left out of every progress mean.
    Exclude,
}

impl std::str::FromStr for MissingProgress {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" | "0" => Ok(MissingProgress::Zero),
            "exclude" | "skip" => Ok(MissingProgress::Exclude),
            other => Err(TimelineError::Config(format!(
                "FURREVER_MISSING_PROGRESS must be 'zero' or 'exclude', got '{other}'"
            ))),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TimelineConfig {
    /// Offset used to turn backend instants into local calendar days.
    pub utc_offset: FixedOffset,
    pub upcoming_limit: usize,
    pub missing_progress: MissingProgress,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            upcoming_limit: DEFAULT_UPCOMING_LIMIT,
            missing_progress: MissingProgress::default(),
        }
    }
}

impl TimelineConfig {
    pub fn from_env() -> Result<Self, TimelineError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    pub fn from_env_with<F>(mut get: F) -> Result<Self, TimelineError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(raw) = get("FURREVER_UTC_OFFSET_MINUTES") {
            let minutes: i32 = raw.trim().parse().map_err(|_| {
                TimelineError::Config(format!("FURREVER_UTC_OFFSET_MINUTES is not a number: {raw}"))
            })?;
            cfg.utc_offset = minutes
                .checked_mul(60)
                .and_then(FixedOffset::east_opt)
                .ok_or_else(|| {
                    TimelineError::Config(format!("UTC offset out of range: {minutes} minutes"))
                })?;
        }
        if let Some(raw) = get("FURREVER_UPCOMING_LIMIT") {
            cfg.upcoming_limit = raw.trim().parse().map_err(|_| {
                TimelineError::Config(format!("FURREVER_UPCOMING_LIMIT is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = get("FURREVER_MISSING_PROGRESS") {
            cfg.missing_progress = raw.parse()?;
        }
        Ok(cfg)
    }

    /// Current wall-clock time in the configured offset.
    pub fn now_local(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset).naive_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = TimelineConfig::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg.utc_offset.local_minus_utc(), 0);
        assert_eq!(cfg.upcoming_limit, 5);
        assert_eq!(cfg.missing_progress, MissingProgress::Zero);
    }

    #[test]
    fn reads_values() {
        let get = |k: &str| match k {
            "FURREVER_UTC_OFFSET_MINUTES" => Some("-300".into()),
            "FURREVER_UPCOMING_LIMIT" => Some("3".into()),
            "FURREVER_MISSING_PROGRESS" => Some("Exclude".into()),
            _ => None,
        };
        let cfg = TimelineConfig::from_env_with(get).expect("cfg");
        assert_eq!(cfg.utc_offset.local_minus_utc(), -300 * 60);
        assert_eq!(cfg.upcoming_limit, 3);
        assert_eq!(cfg.missing_progress, MissingProgress::Exclude);
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let get = |k: &str| (k == "FURREVER_UTC_OFFSET_MINUTES").then(|| "1500".to_string());
        assert!(matches!(
            TimelineConfig::from_env_with(get),
            Err(TimelineError::Config(_))
        ));
    }

    #[test]
    fn rejects_unknown_progress_policy() {
        let get = |k: &str| (k == "FURREVER_MISSING_PROGRESS").then(|| "guess".to_string());
        assert!(TimelineConfig::from_env_with(get).is_err());
    }
}
