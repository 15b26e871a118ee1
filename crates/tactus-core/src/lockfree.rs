//! Lock-free primitives shared between the control and render threads.
//!
//! Every wrapper is cache-line aligned so that fields written by different
//! threads never share a line.

use atomic_float::{AtomicF32, AtomicF64};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// Cache-line aligned atomic f32.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFloat {
    value: AtomicF32,
}

impl AtomicFloat {
    pub fn new(value: f32) -> Self {
        Self {
            value: AtomicF32::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f32) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicFloat {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Cache-line aligned atomic bool.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicFlag {
    value: AtomicBool,
}

impl AtomicFlag {
    pub fn new(value: bool) -> Self {
        Self {
            value: AtomicBool::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    pub fn swap(&self, value: bool) -> bool {
        self.value.swap(value, Ordering::AcqRel)
    }
}

impl Default for AtomicFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Cache-line aligned atomic f64.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicDouble {
    value: AtomicF64,
}

impl AtomicDouble {
    pub fn new(value: f64) -> Self {
        Self {
            value: AtomicF64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicDouble {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Cache-line aligned signed sample position.
///
/// Signed because preroll starts before the timeline origin.
#[derive(Debug)]
#[repr(align(64))]
pub struct AtomicSamples {
    value: AtomicI64,
}

impl AtomicSamples {
    pub fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }
}

impl Default for AtomicSamples {
    fn default() -> Self {
        Self::new(0)
    }
}
