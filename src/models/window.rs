// src/models/window.rs

//! Inclusive time window for a fetch run.

use std::fmt;

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Inclusive `[from, to]` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting `from > to`.
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from > to {
            return Err(AppError::validation(format!(
                "window start {from} is after its end {to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// Window spanning local midnight of `from` to local midnight of `to`.
    pub fn from_local_dates(from: NaiveDate, to: NaiveDate) -> Result<Self> {
        Self::new(local_midnight(from)?, local_midnight(to)?)
    }

    /// Message is newer than the window.
    pub fn is_after(&self, t: DateTime<Utc>) -> bool {
        t > self.to
    }

    /// Message is older than the window.
    pub fn is_before(&self, t: DateTime<Utc>) -> bool {
        t < self.from
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        !self.is_after(t) && !self.is_before(t)
    }

    /// Parts of this window not covered by `[min, max]`.
    ///
    /// Returns the older gap `[from, min - 1ns]` and the newer gap
    /// `[max + 1ns, to]`, each only when non-empty.
    pub fn uncovered(&self, min: DateTime<Utc>, max: DateTime<Utc>) -> Vec<TimeWindow> {
        let step = Duration::nanoseconds(1);
        let mut gaps = Vec::new();
        if self.from < min {
            let end = min - step;
            gaps.push(TimeWindow {
                from: self.from,
                to: end.min(self.to),
            });
        }
        if self.to > max {
            let start = max + step;
            gaps.push(TimeWindow {
                from: start.max(self.from),
                to: self.to,
            });
        }
        gaps
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.from.to_rfc3339(), self.to.to_rfc3339())
    }
}

fn local_midnight(date: NaiveDate) -> Result<DateTime<Utc>> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::validation(format!("invalid date {date}")))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .ok_or_else(|| AppError::validation(format!("no local midnight for {date}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_rejects_inverted_window() {
        assert!(TimeWindow::new(at(10), at(5)).is_err());
        assert!(TimeWindow::new(at(5), at(5)).is_ok());
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let window = TimeWindow::new(at(100), at(200)).unwrap();
        assert!(window.contains(at(100)));
        assert!(window.contains(at(200)));
        assert!(window.is_after(at(201)));
        assert!(window.is_before(at(99)));
    }

    #[test]
    fn test_uncovered_gaps() {
        let window = TimeWindow::new(at(100), at(500)).unwrap();

        let gaps = window.uncovered(at(200), at(300));
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].from, at(100));
        assert_eq!(gaps[0].to, at(200) - Duration::nanoseconds(1));
        assert_eq!(gaps[1].from, at(300) + Duration::nanoseconds(1));
        assert_eq!(gaps[1].to, at(500));

        assert!(window.uncovered(at(50), at(600)).is_empty());
    }
}
