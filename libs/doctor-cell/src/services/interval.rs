use chrono::{NaiveTime, Timelike};

use crate::models::TimeRange;

/// Half-open `[start, end)` span measured in minutes since local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn from_times(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        Self::new(minute_of_day(start), minute_of_day(end))
    }

    pub fn from_range(range: &TimeRange) -> Option<Self> {
        Self::from_times(range.start, range.end)
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// What remains of `self` after removing `other`: zero, one or two pieces.
    pub fn minus(&self, other: &Interval) -> Vec<Interval> {
        if !self.overlaps(other) {
            return vec![*self];
        }

        let mut pieces = Vec::with_capacity(2);
        if let Some(left) = Interval::new(self.start, other.start) {
            pieces.push(left);
        }
        if let Some(right) = Interval::new(other.end, self.end) {
            pieces.push(right);
        }
        pieces
    }

    pub fn start_time(&self) -> Option<NaiveTime> {
        time_of_minute(self.start)
    }

    pub fn end_time(&self) -> Option<NaiveTime> {
        time_of_minute(self.end)
    }
}

pub fn minute_of_day(time: NaiveTime) -> u32 {
    time.num_seconds_from_midnight() / 60
}

/// Minute of day rounded up, so a partially elapsed minute counts as past.
pub fn ceil_minute_of_day(time: NaiveTime) -> u32 {
    let seconds = time.num_seconds_from_midnight();
    let partial = seconds % 60 != 0 || time.nanosecond() != 0;
    seconds / 60 + u32::from(partial)
}

pub fn time_of_minute(minute: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0)
}

/// Sort and merge overlapping or touching intervals.
pub fn union(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort();

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Remove every `taken` span from `free`. Output stays sorted.
pub fn subtract(free: &[Interval], taken: &[Interval]) -> Vec<Interval> {
    free.iter()
        .flat_map(|f| {
            taken.iter().fold(vec![*f], |pieces, t| {
                pieces.iter().flat_map(|p| p.minus(t)).collect()
            })
        })
        .collect()
}

/// Back-to-back chunks of `size` minutes from the start of each free span;
/// a trailing remainder shorter than `size` is dropped.
pub fn chunk(free: &[Interval], size: u32) -> Vec<Interval> {
    if size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    for interval in free {
        let mut cursor = interval.start;
        while cursor + size <= interval.end {
            chunks.push(Interval {
                start: cursor,
                end: cursor + size,
            });
            cursor += size;
        }
    }
    chunks
}

pub fn any_contains(spans: &[Interval], target: &Interval) -> bool {
    spans.iter().any(|span| span.contains(target))
}
