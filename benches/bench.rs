#[macro_use]
extern crate criterion;

use core::time::Duration;
use criterion::{black_box, BatchSize, Criterion, Throughput};

use bsonbuf::builder::stream;
use bsonbuf::Core;

const LEN: u32 = 100_000;
const WARM_UP_TIME: Duration = Duration::from_secs(3);
const MEASUREMENT_TIME: Duration = Duration::from_secs(20);

fn build_array() -> bsonbuf::array::Value {
    let mut core = Core::with_capacity(true, LEN as usize * 12);
    for i in 0..LEN {
        core.open_document().unwrap();
        core.key_view("i").unwrap().append(i as i32).unwrap();
        core.close_document().unwrap();
    }
    core.extract_array().unwrap()
}

fn cmp(c: &mut Criterion) {
    let bytes = build_array().length() as u64;

    let mut group = c.benchmark_group("build");
    group
        .throughput(Throughput::Bytes(bytes))
        .warm_up_time(WARM_UP_TIME)
        .measurement_time(MEASUREMENT_TIME);

    group.bench_function("core", |b| b.iter(|| black_box(build_array())));

    group.bench_function("stream", |b| {
        b.iter(|| {
            let mut arr = stream::Array::new();
            let value = (0..LEN)
                .fold(arr.root(), |ctx, i| {
                    ctx.open_document().key("i").value(i as i32).close_document()
                })
                .finalize()
                .unwrap();
            black_box(value)
        })
    });

    group.bench_function("bson", |b| {
        b.iter(|| {
            let list: Vec<bson::Bson> = (0..LEN as i32)
                .map(|i| bson::Bson::Document(bson::doc! { "i": i }))
                .collect();
            let mut out = vec![];
            bson::doc! { "list": list }.to_writer(&mut out).unwrap();
            black_box(out)
        })
    });
    group.finish();

    let mut group = c.benchmark_group("traverse");
    group
        .throughput(Throughput::Bytes(bytes))
        .warm_up_time(WARM_UP_TIME)
        .measurement_time(MEASUREMENT_TIME);

    group.bench_function("view", |b| {
        b.iter_batched(
            build_array,
            |value| {
                let sum: i64 = value
                    .view()
                    .iter()
                    .map(|e| e.unwrap().get("i").unwrap().get_int32().unwrap() as i64)
                    .sum();
                black_box(sum)
            },
            BatchSize::LargeInput,
        )
    });

    #[cfg(feature = "json")]
    group.bench_function("json", |b| {
        let value = build_array();
        b.iter(|| black_box(bsonbuf::json::array_to_json(value.view(), bsonbuf::json::Mode::Relaxed).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, cmp);
criterion_main!(benches);
