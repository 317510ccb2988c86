use chained_collections::{StrList, Vector};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;

fn bench_push_back(c: &mut Criterion) {
    c.bench_function("vector::emplace_back_1m", |b| {
        b.iter(|| {
            let mut v: Vector<u64> = Vector::new();
            for i in 0..1_000_000u64 {
                let _ = v.emplace_back(i).unwrap();
            }
            black_box(v)
        })
    });

    c.bench_function("vector::push_back_str_100k", |b| {
        b.iter(|| {
            let mut v: Vector<String> = Vector::new();
            for _ in 0..100_000 {
                let _ = v.push_back("payload").unwrap();
            }
            black_box(v)
        })
    });
}

fn bench_insert_front(c: &mut Criterion) {
    c.bench_function("vector::insert_front_10k", |b| {
        b.iter(|| {
            let mut v: Vector<u32> = Vector::new();
            for i in 0..10_000u32 {
                let _ = v.insert(0, &i).unwrap();
            }
            black_box(v)
        })
    });

    c.bench_function("vector::remove_front_10k", |b| {
        b.iter_batched(
            || (0..10_000u32).collect::<Vector<u32>>(),
            |mut v| {
                while !v.is_empty() {
                    v.remove(0, 1);
                }
                black_box(v)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_str_list(c: &mut Criterion) {
    let text: String = (0..10_000).map(|i| format!("field{},", i)).collect();

    c.bench_function("str_list::split_10k", |b| {
        b.iter(|| black_box(StrList::split(black_box(&text), ",").unwrap()))
    });

    c.bench_function("str_list::join_10k", |b| {
        let list = StrList::split(&text, ",").unwrap();
        b.iter(|| black_box(list.join(Some(", ")).unwrap()))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(3))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_push_back, bench_insert_front, bench_str_list
}
criterion_main!(benches);
