// Audio scheduling properties

mod common;

use common::ManualAudio;
use emu_host::audio::{AudioChunk, AudioScheduler, ScheduleOutcome};
use proptest::prelude::*;

fn running(now: f64) -> ManualAudio {
    let audio = ManualAudio::at(now);
    audio.state.lock().unwrap().running = true;
    audio
}

proptest! {
    #[test]
    fn chunks_are_laid_end_to_end(
        t0 in 0.0f64..100.0,
        count in 1usize..32,
        samples in 1usize..4096,
        rate in prop::sample::select(vec![8_000u32, 22_050, 44_100, 48_000]),
    ) {
        let audio = running(t0);
        let mut scheduler = AudioScheduler::new(audio.clone());

        for _ in 0..count {
            let outcome = scheduler.schedule(AudioChunk::mono(vec![0.0; samples], rate));
            prop_assert!(matches!(outcome, ScheduleOutcome::Scheduled { .. }), "expected Scheduled, got {:?}", outcome);
        }

        let step = samples as f64 / rate as f64;
        let played = audio.played();
        prop_assert_eq!(played.len(), count);
        for (i, (start, frames)) in played.iter().enumerate() {
            prop_assert_eq!(*frames, samples);
            let expected = t0 + i as f64 * step;
            prop_assert!((start - expected).abs() < 1e-9, "chunk {} at {} expected {}", i, start, expected);
        }
        for pair in played.windows(2) {
            // no gap, no overlap
            prop_assert!((pair[1].0 - (pair[0].0 + step)).abs() < 1e-9);
        }
    }

    #[test]
    fn underrun_restarts_ahead_of_clock(
        lag in 0.001f64..10.0,
        samples in 1usize..4096,
    ) {
        let audio = running(1.0);
        let mut scheduler = AudioScheduler::new(audio.clone());
        scheduler.schedule(AudioChunk::mono(vec![0.0; samples], 44_100));
        let unmodified = scheduler.next_start_time();

        let now = unmodified + lag;
        audio.set_now(now);
        let outcome = scheduler.schedule(AudioChunk::mono(vec![0.0; samples], 44_100));

        let start = outcome.start().unwrap();
        prop_assert!((start - (now + 0.1)).abs() < 1e-12);
        prop_assert!(start > unmodified);
        prop_assert_eq!(scheduler.stats().underruns, 1);
    }
}

#[test]
fn test_suspended_output_keeps_order() {
    let audio = ManualAudio::at(0.0);
    let mut scheduler = AudioScheduler::new(audio.clone());

    // dropped while suspended
    let outcome = scheduler.schedule(AudioChunk::mono(vec![0.0; 100], 44_100));
    assert_eq!(outcome.start(), None);
    assert!(audio.played().is_empty());

    scheduler.resume_output().unwrap();
    scheduler.schedule(AudioChunk::mono(vec![0.0; 100], 44_100));
    scheduler.schedule(AudioChunk::mono(vec![0.0; 200], 44_100));

    let played = audio.played();
    assert_eq!(played.len(), 2);
    assert_eq!(played[0], (0.0, 100));
    assert_eq!(played[1].1, 200);
    assert!(played[1].0 > played[0].0);
}
