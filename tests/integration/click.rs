//! Click track integration tests
//!
//! The mock backend renders real click nodes against the engine's playhead.

use crate::helpers::*;
use approx::assert_abs_diff_eq;
use std::path::Path;
use tactus::prelude::*;
use tactus::ClickOutput;

const COUNT_IN_BLOCK: usize = 2400;

fn config() -> TransportConfig {
    TransportConfig {
        timeline_length: 60.0,
        ..Default::default()
    }
}

fn enabled() -> ClickConfig {
    ClickConfig {
        enabled: true,
        ..Default::default()
    }
}

fn write_wav(path: &Path, frames: usize, value: f32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: TEST_SAMPLE_RATE as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..frames * 2 {
        writer.write_sample(value).unwrap();
    }
    writer.finalize().unwrap();
}

/// Four beats of count-in before a take at 10 s: the click sounds for the
/// count-in only, even though it is disabled.
#[test]
fn test_count_in_clicks_then_falls_silent() {
    let fx = fixture(config(), ClickConfig::default(), ClickOutput::Midi);
    {
        let mut transport = fx.engine.transport();
        transport.set_count_in_beats(4);
        transport.set_position(10.0);
        transport.record(false, false).unwrap();
        assert_eq!(transport.position(), 7.75);
        assert_eq!(
            transport.click_state().click_range(),
            TimeRange::new(7.75, 10.0)
        );
    }

    // 2.25 s of count-in
    let blocks = fx.probe.render_frames(45 * COUNT_IN_BLOCK, COUNT_IN_BLOCK);
    assert_eq!(blocks[0].range.first.start, 372_000);

    let notes: Vec<(i64, u8)> = blocks
        .iter()
        .flat_map(|b| {
            b.notes
                .iter()
                .map(move |n| (b.range.first.start + n.frame_offset as i64, n.note().unwrap()))
        })
        .collect();
    assert_eq!(
        notes,
        vec![(384_000, 37), (408_000, 76), (432_000, 76), (456_000, 76)]
    );
    assert!(blocks
        .iter()
        .flat_map(|b| &b.notes)
        .all(|n| n.is_rhythm() && n.velocity() == Some(127)));

    // the take itself starts at 10 s, on a beat, with the click off
    let after = fx.probe.render(COUNT_IN_BLOCK);
    assert_eq!(after.range.first.start, 480_000);
    assert!(after.notes.is_empty());
}

#[test]
fn test_enabled_click_is_audible_from_the_first_beat() {
    let fx = fixture(config(), enabled(), ClickOutput::Audio);
    fx.engine.play().unwrap();

    let first = fx.probe.render(TEST_BUFFER_SIZE);
    assert!(first.peak() > 0.1);
    assert!(first.peak() <= 1.0);

    // between beats: nothing
    let blocks = fx.probe.render_frames(12_000, TEST_BUFFER_SIZE);
    let quiet = blocks.iter().skip(4).take(10).map(RenderedBlock::peak);
    assert!(quiet.into_iter().all(|p| p == 0.0));
}

#[test]
fn test_disabled_click_is_silent() {
    let fx = fixture(config(), ClickConfig::default(), ClickOutput::Audio);
    fx.engine.play().unwrap();

    let blocks = fx.probe.render_frames(48_000, TEST_BUFFER_SIZE);
    assert!(blocks.iter().all(|b| b.peak() == 0.0));
}

#[test]
fn test_recording_only_click_mutes_plain_playback() {
    let click = ClickConfig {
        enabled: true,
        recording_only: true,
        ..Default::default()
    };
    let fx = fixture(config(), click, ClickOutput::Audio);

    fx.engine.play().unwrap();
    let blocks = fx.probe.render_frames(48_000, TEST_BUFFER_SIZE);
    assert!(blocks.iter().all(|b| b.peak() == 0.0));
    fx.engine.stop().unwrap();

    fx.engine.set_position(0.0);
    fx.engine.record().unwrap();
    // preroll is pulled back 0.2 s near the origin; the beat at 0 follows it
    let blocks = fx.probe.render_frames(9_600 + 2 * TEST_BUFFER_SIZE, TEST_BUFFER_SIZE);
    assert!(blocks.iter().any(|b| b.peak() > 0.0));
}

#[test]
fn test_click_follows_loop_wrap() {
    let fx = fixture(config(), enabled(), ClickOutput::Midi);
    fx.engine.set_loop_range(TimeRange::new(1.0, 2.0));
    fx.engine.set_looping(true);
    fx.engine.play().unwrap();
    assert_eq!(fx.engine.position(), 1.0);

    // 93 whole blocks from 48000 end at 95616; the next one wraps
    let blocks = fx.probe.render_frames(94 * TEST_BUFFER_SIZE, TEST_BUFFER_SIZE);

    let first = &blocks[0];
    assert_eq!(first.notes.len(), 1);
    assert_eq!(first.notes[0].frame_offset, 0);
    assert_eq!(first.notes[0].note(), Some(76));

    let wrapped = blocks.last().unwrap();
    assert!(wrapped.range.is_split());
    assert_eq!(wrapped.range.first.end, 96_000);
    // the loop start beat lands right after the wrap point
    assert_eq!(wrapped.notes.len(), 1);
    assert_eq!(wrapped.notes[0].frame_offset, 384);

    assert_eq!(fx.probe.playhead().unwrap().position(), 48_128);
    let beats: usize = blocks.iter().map(|b| b.notes.len()).sum();
    // 1.0 and 1.5, then 1.0 again
    assert_eq!(beats, 3);
}

#[test]
fn test_click_sample_file_replaces_builtin_accent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accent.wav");
    write_wav(&path, 64, 0.25);

    let click = ClickConfig {
        enabled: true,
        gain: 2.0,
        accent_sample: Some(path),
        ..Default::default()
    };
    let fx = fixture(config(), click, ClickOutput::Audio);
    fx.engine.play().unwrap();

    let block = fx.probe.render(TEST_BUFFER_SIZE);
    for &s in &block.audio[..64] {
        assert_abs_diff_eq!(s, 0.5, epsilon = 1e-6);
    }
    assert!(block.audio[64..].iter().all(|&s| s == 0.0));
}

#[test]
fn test_missing_click_sample_falls_back_to_builtin() {
    let click = ClickConfig {
        enabled: true,
        accent_sample: Some("/nonexistent/accent.wav".into()),
        ..Default::default()
    };
    let fx = fixture(config(), click, ClickOutput::Audio);
    fx.engine.play().unwrap();

    let block = fx.probe.render(TEST_BUFFER_SIZE);
    let builtin = tactus::core::transport::generate_click(TEST_SAMPLE_RATE, true);
    assert_abs_diff_eq!(block.audio[100], builtin[100], epsilon = 1e-6);
}

#[test]
fn test_click_gain_scales_midi_velocity() {
    let click = ClickConfig {
        enabled: true,
        gain: 0.5,
        emphasise_bars: false,
        ..Default::default()
    };
    let fx = fixture(config(), click, ClickOutput::Midi);
    fx.engine.play().unwrap();

    let block = fx.probe.render(TEST_BUFFER_SIZE);
    assert_eq!(block.notes.len(), 1);
    // no bar emphasis: the downbeat uses the regular note
    assert_eq!(block.notes[0].note(), Some(76));
    assert_eq!(block.notes[0].velocity(), Some(64));
}

/// Protocol-mode clicks pushed onto a bounded queue, as a render thread
/// feeding a MIDI output would. A full queue drops clicks instead of blocking.
#[test]
fn test_click_notes_through_ring_buffer() {
    use ringbuf::traits::{Consumer, Split};
    use ringbuf::HeapRb;

    let fx = fixture(config(), enabled(), ClickOutput::Midi);
    fx.engine.play().unwrap();

    let (mut prod, mut cons) = HeapRb::<MidiEvent>::new(2).split();
    // four beats in 2 s, rendered before anything is drained
    for _ in 0..(2 * TEST_SAMPLE_RATE as usize / 480) {
        fx.probe.render_into(480, &mut prod);
    }

    let drained: Vec<MidiEvent> = cons.pop_iter().collect();
    assert_eq!(drained.len(), 2);
    assert_eq!(drained[0].note(), Some(37));
    assert_eq!(drained[1].note(), Some(76));
}
