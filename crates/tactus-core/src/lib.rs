//! Transport core: lock-free playhead, click track and transport state machine.
//!
//! # Primary API
//!
//! - [`TransportStateMachine`]: play / record / stop / seek on the control thread
//! - [`Playhead`]: real-time position shared with the render thread
//! - [`ClickNode`] / [`ClickState`]: metronome rendered from the tempo map
//! - [`PositionReconciler`]: periodic sync of logical and real-time position
//!
//! The render side only ever touches [`Playhead::process_block`] and
//! [`ClickNode::process`]; both are allocation- and lock-free.

pub mod config;
pub use config::{
    ClickConfig, TimecodeConfig, TransportConfig, DEFAULT_ACCENT_NOTE, DEFAULT_REGULAR_NOTE,
    MAX_TIMELINE_LENGTH,
};

pub mod error;
pub use error::{Error, Rejection, Result};

pub(crate) mod lockfree;
pub use lockfree::{AtomicDouble, AtomicFlag, AtomicFloat, AtomicSamples};

pub mod transport;
pub use transport::{
    shared_tempo_map, spawn_nudge_timer, spawn_reconciler, timecode_for, BarsBeats, BeatGrid,
    BlockRange, ClickAssets, ClickGenerator, ClickNode, ClickOutput, ClickState, FrameSpan,
    NoteSink, NudgeAction, NudgeController, NudgeDirection, PeriodicTask, PlaybackBackend,
    PlaybackContext, Playhead, PositionReconciler, ReallocationGuard, ReallocationInhibitor,
    RecordedClip, SampleRange, SectionPlayback, SharedTempoMap, SmpteFrameRate, SnapGrid,
    StopOptions, SyncOutput, SyncOutputs, TempoMap, TempoSyncPeer, TimeRange, TimeSignature,
    TransportListener, TransportMode, TransportState, TransportStateMachine,
};
