//! Transport: real-time playhead, click track and the control-side state machine.

pub mod backend;
pub mod click;
pub mod click_assets;
pub mod guard;
pub mod nudge;
pub mod playhead;
pub mod position;
pub mod reconciler;
pub mod snap;
pub mod state;
pub mod state_machine;
pub mod sync;
pub mod tempo_map;

#[cfg(test)]
pub(crate) mod test_backend;

pub use backend::{PlaybackBackend, PlaybackContext};
pub use click::{
    BeatGrid, ClickGenerator, ClickNode, ClickOutput, ClickState, FrameSpan, NoteSink,
    GRID_LEAD_IN_BARS, GRID_SENTINEL,
};
pub use click_assets::{generate_click, load_click_sample, ClickAssets};
pub use guard::{ReallocationGuard, ReallocationInhibitor};
pub use nudge::{NudgeAction, NudgeController, NudgeDirection};
pub use playhead::Playhead;
pub use position::{samples_to_seconds, seconds_to_samples, BlockRange, SampleRange, TimeRange};
pub use reconciler::{spawn_nudge_timer, spawn_reconciler, PeriodicTask, PositionReconciler};
pub use snap::SnapGrid;
pub use state::{
    RecordedClip, TransportListener, TransportMode, TransportState, CURSOR_POS_UNSET,
};
pub use state_machine::{
    shared_tempo_map, SectionPlayback, SharedTempoMap, StopOptions, TransportStateMachine,
};
pub use sync::{timecode_for, SmpteFrameRate, SyncOutput, SyncOutputs, TempoSyncPeer};
pub use tempo_map::{BarsBeats, TempoCursor, TempoMap, TimeSignature};
