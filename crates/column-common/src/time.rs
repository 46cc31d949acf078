//! Time handling for model time axes and observation days.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GridError, GridResult};

/// A calendar day of satellite observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObservationDay(pub NaiveDate);

impl ObservationDay {
    /// Parse a `YYYY-MM-DD` day key.
    pub fn parse(s: &str) -> GridResult<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Self)
            .map_err(|_| GridError::InvalidDate(s.to_string()))
    }

    /// Local wall-clock time on this day, e.g. the satellite overpass time.
    pub fn at(&self, local_time: NaiveTime) -> NaiveDateTime {
        self.0.and_time(local_time)
    }
}

impl fmt::Display for ObservationDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// A strictly increasing sequence of UTC model times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    times: Vec<DateTime<Utc>>,
}

impl TimeAxis {
    /// Create a time axis, rejecting unordered or duplicate times.
    pub fn new(times: Vec<DateTime<Utc>>) -> GridResult<Self> {
        if let Some(idx) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(GridError::UnorderedTimeAxis(idx + 1));
        }
        Ok(Self { times })
    }

    /// Build an evenly spaced axis of `count` steps.
    pub fn regular(start: DateTime<Utc>, step: Duration, count: usize) -> GridResult<Self> {
        Self::new((0..count).map(|k| start + step * k as i32).collect())
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<DateTime<Utc>> {
        self.times.get(idx).copied()
    }

    /// Spacing between the first two steps; the nominal model output interval.
    pub fn spacing(&self) -> Option<Duration> {
        match self.times.as_slice() {
            [first, second, ..] => Some(*second - *first),
            _ => None,
        }
    }

    /// Index of the step nearest to `t` (earlier step wins ties).
    pub fn nearest_index(&self, t: DateTime<Utc>) -> Option<usize> {
        self.times
            .iter()
            .enumerate()
            .min_by_key(|(_, &step)| (step - t).num_milliseconds().abs())
            .map(|(idx, _)| idx)
    }
}
