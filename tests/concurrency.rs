use std::sync::Arc;
use std::thread;

use echolight::audio::{SnapshotBuffer, SpectrumAnalyzer};
use echolight::render::{CompositorConfig, CpuSweep, SpectrogramCompositor};

#[test]
fn readers_never_see_a_torn_snapshot() {
    const BINS: usize = 512;
    const PUBLISHES: usize = 2000;

    let buffer = Arc::new(SnapshotBuffer::new(BINS));

    let writer = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut magnitudes = vec![0.0f32; BINS];
            for k in 1..=PUBLISHES {
                magnitudes.fill(k as f32);
                buffer.publish(&magnitudes).unwrap();
            }
        })
    };

    let reader = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || {
            let mut dest = vec![0.0f32; BINS];
            let mut last = 0.0f32;
            for _ in 0..PUBLISHES {
                buffer.read_into(&mut dest).unwrap();
                let first = dest[0];
                assert!(dest.iter().all(|&v| v == first), "torn read at {}", first);
                // Publishes only count up, so reads never go back in time
                assert!(first >= last);
                last = first;
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    let mut dest = vec![0.0f32; BINS];
    buffer.read_into(&mut dest).unwrap();
    assert!(dest.iter().all(|&v| v == PUBLISHES as f32));
}

#[test]
fn compositor_on_another_thread_sees_whole_spectra() {
    const BLOCK: usize = 128;

    let mut analyzer = SpectrumAnalyzer::new();
    analyzer.init(BLOCK).unwrap();
    let source = analyzer.snapshot_buffer().unwrap();

    let producer = thread::spawn(move || {
        // Alternate between a loud and a silent mono block
        let loud: Vec<f32> = (0..BLOCK).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let silent = vec![0.0f32; BLOCK];
        for round in 0..500 {
            let block = if round % 2 == 0 { &loud } else { &silent };
            analyzer.analyze(block, 0, 1).unwrap();
        }
        analyzer
    });

    let mut compositor = SpectrogramCompositor::new(
        CompositorConfig {
            sweep_width: 8,
            saturation_amplitude: 1.0,
        },
        Box::new(CpuSweep),
    )
    .unwrap();

    let mut magnitudes = vec![0.0f32; BLOCK / 2];
    for _ in 0..200 {
        compositor.tick(&source).unwrap();
        assert_eq!(compositor.output().dimensions(), (8, BLOCK / 2));

        // Every snapshot is either all silence or the full alternating-sign spectrum
        source.read_into(&mut magnitudes).unwrap();
        let silent = magnitudes.iter().all(|&m| m == 0.0);
        let loud = magnitudes[BLOCK / 2 - 1] > 1.0;
        assert!(silent || loud);
    }

    let analyzer = producer.join().unwrap();
    // The last block analyzed was silent
    let mut latest = vec![1.0f32; BLOCK / 2];
    analyzer.latest_snapshot(&mut latest).unwrap();
    assert!(latest.iter().all(|&m| m == 0.0));
}
