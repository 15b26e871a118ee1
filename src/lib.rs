//! # Tactus - Transport & Click Core
//!
//! Play / record / stop semantics over a lock-free real-time playhead, with a
//! metronome rendered from the tempo map.
//!
//! ## Architecture
//!
//! Tactus is an umbrella crate that coordinates:
//! - **tactus-core** - Playhead, click generator, transport state machine, position reconciler
//! - **tactus-midi** - Click note events and MIDI Machine Control encoding
//!
//! ## Quick Start
//!
//! ```ignore
//! use tactus::prelude::*;
//!
//! let engine = TactusEngine::builder()
//!     .backend(Box::new(my_backend))
//!     .build()?;
//!
//! engine.transport().set_loop_range(TimeRange::new(4.0, 8.0));
//! engine.play()?;
//! ```
//!
//! The render thread takes the [`Playhead`] handed to
//! [`PlaybackBackend::create_nodes`] and calls [`Playhead::process_block`]
//! (and [`ClickNode::process`]) once per block.

/// Re-export of tactus-core for direct access
pub use tactus_core as core;

/// Re-export of tactus-midi for direct access
pub use tactus_midi as midi;

pub use tactus_core::{
    shared_tempo_map, timecode_for, AtomicDouble, AtomicFlag, AtomicFloat, AtomicSamples,
    BarsBeats, BeatGrid, BlockRange, ClickAssets, ClickConfig, ClickGenerator, ClickNode,
    ClickOutput, ClickState, FrameSpan, NoteSink, NudgeDirection, PeriodicTask, PlaybackBackend,
    PlaybackContext, Playhead, PositionReconciler, ReallocationGuard, RecordedClip, Rejection,
    SampleRange, SectionPlayback, SharedTempoMap, SmpteFrameRate, SnapGrid, StopOptions,
    SyncOutput, TempoMap, TempoSyncPeer, TimeRange, TimeSignature, TimecodeConfig,
    TransportConfig, TransportListener, TransportMode, TransportStateMachine,
};

pub use tactus_midi::{MachineCommand, MidiEvent, Timecode};

mod error;
pub use error::{Error, Result};

mod builder;
pub use builder::TactusEngineBuilder;

mod engine;
pub use engine::TactusEngine;

pub mod prelude {
    //! Common imports.
    pub use crate::{
        ClickConfig, ClickNode, ClickState, Error, MachineCommand, MidiEvent, PlaybackBackend,
        Playhead, RecordedClip, Rejection, Result, StopOptions, TactusEngine,
        TactusEngineBuilder, TempoMap, TimeRange, TransportConfig, TransportListener,
        TransportMode,
    };
}
