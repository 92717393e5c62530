use criterion::{black_box, criterion_group, criterion_main, Criterion};
use imu_relay_core::{DeviceRegistry, FrameCodec, FrameLayout, SensorPacket, Snapshot, SnapshotAssembler};

const BODY: [&str; 5] = ["knee_right", "foot_right", "pelvis", "knee_left", "foot_left"];

fn snapshot() -> Snapshot {
    BODY.iter()
        .enumerate()
        .filter(|(row, _)| *row != 3)
        .map(|(row, id)| {
            let v = row as f32;
            let packet = SensorPacket::new([v, 0.0, 9.81], [0.1; 3], [0.3, 0.0, 0.5], 1000, 0.0, 7)
                .with_orientation([1.0, 0.0, 0.0, 0.0]);
            (id.to_string(), Some(packet))
        })
        .collect()
}

fn benchmark_assemble(c: &mut Criterion) {
    let assembler = SnapshotAssembler::new(DeviceRegistry::assign(BODY), true);
    let snapshot = snapshot();

    c.bench_function("assemble_5_trackers", |b| {
        b.iter(|| assembler.assemble(black_box(&snapshot)));
    });
}

fn benchmark_encode(c: &mut Criterion) {
    let assembler = SnapshotAssembler::new(DeviceRegistry::assign(BODY), true);
    let codec = FrameCodec::new(FrameLayout::new(5, true, true));
    let matrices = assembler.assemble(&snapshot());

    c.bench_function("encode_5_trackers_full", |b| {
        b.iter(|| codec.encode(black_box(&matrices)));
    });
}

fn benchmark_decode(c: &mut Criterion) {
    let assembler = SnapshotAssembler::new(DeviceRegistry::assign(BODY), true);
    let codec = FrameCodec::new(FrameLayout::new(5, true, true));
    let frame = codec.encode(&assembler.assemble(&snapshot())).unwrap();

    c.bench_function("decode_5_trackers_full", |b| {
        b.iter(|| codec.decode(black_box(&frame)));
    });
}

criterion_group!(benches, benchmark_assemble, benchmark_encode, benchmark_decode);
criterion_main!(benches);
