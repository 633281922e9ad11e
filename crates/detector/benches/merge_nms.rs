use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use detector::merge::merge_overlapping;
use detector::uncertainty::score_detections;
use detector::{BoundingBox, Detection};

/// A frame of `n` animals, each reported as a cluster of three jittered boxes
fn clustered_frame(n: usize) -> Vec<Detection> {
    let mut detections = Vec::with_capacity(n * 3);
    for i in 0..n {
        let x = (i % 10) as f32 * 60.0;
        let y = (i / 10) as f32 * 60.0;
        for k in 0..3 {
            let jitter = k as f32 * 1.5;
            detections.push(Detection {
                id: (i * 3 + k) as u64,
                bbox: BoundingBox::new(x + jitter, y + jitter, x + 50.0 + jitter, y + 50.0),
                class_id: (i % 4) as u32,
                class_name: String::new(),
                confidence: 0.9 - k as f32 * 0.1,
                entropy: 0.0,
                is_uncertain: false,
            });
        }
    }
    detections
}

fn bench_merge_and_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_and_score");

    for animals in [5usize, 20, 50] {
        let frame = clustered_frame(animals);

        group.bench_with_input(BenchmarkId::new("merge", animals), &frame, |b, frame| {
            b.iter(|| merge_overlapping(black_box(frame.clone()), 0.5))
        });

        let merged = merge_overlapping(frame.clone(), 0.5);
        group.bench_with_input(BenchmarkId::new("score", animals), &merged, |b, merged| {
            b.iter(|| {
                let mut dets = merged.clone();
                score_detections(black_box(&mut dets), 0.5);
                dets
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge_and_score);
criterion_main!(benches);
