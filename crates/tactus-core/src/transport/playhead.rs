//! Real-time playhead shared between the control and render threads.
//!
//! Each logical quantity is its own atomic with exactly one writer:
//!
//! | field | writer |
//! |---|---|
//! | seek target / pending, loop range, looping, play end, playing, dragging, roll-in | control |
//! | position, unlooped position | render ([`Playhead::process_block`]) |
//!
//! Control-side directives are picked up at the start of the next render
//! block, so the render thread may observe an update up to one block late.
//! [`Playhead::position`] reports a pending seek target before it has been
//! applied, which keeps control-side reads coherent with the writes they
//! follow.

use super::position::{BlockRange, SampleRange};
use crate::{AtomicFlag, AtomicSamples};

#[derive(Debug)]
pub struct Playhead {
    sample_rate: f64,
    position: AtomicSamples,
    unlooped_position: AtomicSamples,
    seek_target: AtomicSamples,
    seek_pending: AtomicFlag,
    loop_start: AtomicSamples,
    loop_end: AtomicSamples,
    looping: AtomicFlag,
    play_end: AtomicSamples,
    playing: AtomicFlag,
    user_dragging: AtomicFlag,
    roll_in: AtomicFlag,
}

impl Playhead {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            position: AtomicSamples::new(0),
            unlooped_position: AtomicSamples::new(0),
            seek_target: AtomicSamples::new(0),
            seek_pending: AtomicFlag::new(false),
            loop_start: AtomicSamples::new(0),
            loop_end: AtomicSamples::new(0),
            looping: AtomicFlag::new(false),
            play_end: AtomicSamples::new(i64::MAX),
            playing: AtomicFlag::new(false),
            user_dragging: AtomicFlag::new(false),
            roll_in: AtomicFlag::new(false),
        }
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub fn time_to_samples(&self, seconds: f64) -> i64 {
        super::position::seconds_to_samples(seconds, self.sample_rate)
    }

    #[inline]
    pub fn samples_to_time(&self, samples: i64) -> f64 {
        super::position::samples_to_seconds(samples, self.sample_rate)
    }

    // --- control-side directives ---

    /// Play `range`, looping over it when `looped`, starting at its start.
    pub fn play_range(&self, range: SampleRange, looped: bool) {
        self.loop_start.set(range.start);
        self.loop_end.set(range.end);
        self.looping.set(looped);
        self.play_end.set(range.end);
        self.roll_in.set(false);
        self.seek(range.start);
        self.playing.set(true);
    }

    /// Resume from the current position with the current loop and play window.
    pub fn play(&self) {
        self.playing.set(true);
    }

    pub fn stop(&self) {
        self.playing.set(false);
    }

    pub fn set_position(&self, sample: i64) {
        self.seek(sample);
    }

    fn seek(&self, sample: i64) {
        self.seek_target.set(sample);
        self.seek_pending.set(true);
    }

    pub fn set_loop_range(&self, enabled: bool, range: SampleRange) {
        self.loop_start.set(range.start);
        self.loop_end.set(range.end);
        self.looping.set(enabled);
    }

    /// Start at `preroll_start` and play straight into the loop; wrapping
    /// only begins once the loop start has been reached.
    pub fn set_roll_in_to_loop(&self, preroll_start: i64) {
        self.roll_in.set(true);
        self.seek(preroll_start);
    }

    pub fn set_user_is_dragging(&self, dragging: bool) {
        self.user_dragging.set(dragging);
    }

    // --- queries (any thread) ---

    /// Playing and, when not looping, still inside the play window.
    pub fn is_playing(&self) -> bool {
        self.playing.get() && (self.looping.get() || self.position() < self.play_end.get())
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping.get()
    }

    #[inline]
    pub fn is_user_dragging(&self) -> bool {
        self.user_dragging.get()
    }

    pub fn position(&self) -> i64 {
        if self.seek_pending.get() {
            self.seek_target.get()
        } else {
            self.position.get()
        }
    }

    /// Position counted from the last seek without loop wrapping.
    pub fn unlooped_position(&self) -> i64 {
        if self.seek_pending.get() {
            self.seek_target.get()
        } else {
            self.unlooped_position.get()
        }
    }

    pub fn loop_range(&self) -> SampleRange {
        SampleRange::new(self.loop_start.get(), self.loop_end.get())
    }

    fn is_rolling_in(&self, unlooped: i64, loop_start: i64) -> bool {
        self.roll_in.get() && unlooped < loop_start
    }

    // --- render side ---

    /// Advance by one block and return the timeline it covers.
    ///
    /// Called once per block by the render thread only. Never allocates or
    /// blocks. When stopped the returned range is empty and the position holds.
    pub fn process_block(&self, num_frames: usize) -> BlockRange {
        if self.seek_pending.swap(false) {
            let target = self.seek_target.get();
            self.position.set(target);
            self.unlooped_position.set(target);
        }

        let pos = self.position.get();
        if !self.is_playing() || num_frames == 0 {
            return BlockRange::contiguous(SampleRange::new(pos, pos));
        }

        let frames = num_frames as i64;
        let unlooped = self.unlooped_position.get();
        let loop_start = self.loop_start.get();
        let loop_end = self.loop_end.get();
        let loop_len = loop_end - loop_start;
        let in_loop =
            self.looping.get() && loop_len > 0 && !self.is_rolling_in(unlooped, loop_start);

        // A seek to the loop end or a loop shrunk behind the playhead leaves
        // the position outside the loop; fold it back in.
        let pos = if in_loop && (pos < loop_start || pos >= loop_end) {
            loop_start + (pos - loop_start).rem_euclid(loop_len)
        } else {
            pos
        };
        let wraps = in_loop && pos + frames > loop_end;

        let block = if wraps {
            let head = loop_end - pos;
            let tail = (frames - head).min(loop_len);
            let next = loop_start + (frames - head) % loop_len;
            self.position.set(next);
            BlockRange {
                first: SampleRange::new(pos, loop_end),
                second: Some(SampleRange::new(loop_start, loop_start + tail)),
            }
        } else {
            let mut next = pos + frames;
            if self.looping.get() && loop_len > 0 && next == loop_end {
                next = loop_start;
            }
            self.position.set(next);
            BlockRange::contiguous(SampleRange::new(pos, pos + frames))
        };

        self.unlooped_position.set(unlooped + frames);
        block
    }
}
