//! Timeline and sample ranges.

/// Shortest loop, in seconds, written to the playhead.
pub const MIN_LOOP_LENGTH: f64 = 0.001;

/// Half-open range of timeline seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    #[inline]
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Range with `start <= end` regardless of argument order.
    #[inline]
    pub fn between(a: f64, b: f64) -> Self {
        Self::new(a.min(b), a.max(b))
    }

    #[inline]
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    #[inline]
    pub fn clamp(&self, time: f64) -> f64 {
        time.max(self.start).min(self.end)
    }

    #[inline]
    pub fn with_end(self, end: f64) -> Self {
        Self::new(self.start, end)
    }

    #[inline]
    pub fn with_start(self, start: f64) -> Self {
        Self::new(start, self.end)
    }

    #[inline]
    pub fn to_samples(&self, sample_rate: f64) -> SampleRange {
        SampleRange::new(
            seconds_to_samples(self.start, sample_rate),
            seconds_to_samples(self.end, sample_rate),
        )
    }
}

/// Half-open range of sample positions. Signed so preroll can sit before zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleRange {
    pub start: i64,
    pub end: i64,
}

impl SampleRange {
    #[inline]
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn length(&self) -> i64 {
        (self.end - self.start).max(0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    #[inline]
    pub fn to_time(&self, sample_rate: f64) -> TimeRange {
        TimeRange::new(
            samples_to_seconds(self.start, sample_rate),
            samples_to_seconds(self.end, sample_rate),
        )
    }
}

/// Timeline covered by one render block, split in two where the loop wraps.
///
/// `second` starts at frame `first.length()` of the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRange {
    pub first: SampleRange,
    pub second: Option<SampleRange>,
}

impl BlockRange {
    #[inline]
    pub fn contiguous(range: SampleRange) -> Self {
        Self {
            first: range,
            second: None,
        }
    }

    #[inline]
    pub fn is_split(&self) -> bool {
        self.second.is_some()
    }

    /// Total frames covered by both parts.
    #[inline]
    pub fn num_frames(&self) -> i64 {
        self.first.length() + self.second.map_or(0, |r| r.length())
    }
}

#[inline]
pub fn seconds_to_samples(seconds: f64, sample_rate: f64) -> i64 {
    (seconds * sample_rate).round() as i64
}

#[inline]
pub fn samples_to_seconds(samples: i64, sample_rate: f64) -> f64 {
    samples as f64 / sample_rate
}
