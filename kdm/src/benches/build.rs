use criterion::{black_box, criterion_group, Criterion};
use radiante_kdm::{Container, MapData};

fn bench_build(c: &mut Criterion) {
    for maps in [10, 100, 1_000] {
        let state = super::state(maps);
        c.bench_function(&format!("{}/maps={}", module_path!(), maps), |b| {
            b.iter(|| {
                let mut map_data = MapData::default();
                map_data.set(&state).unwrap();
                black_box(map_data.build().unwrap());
            });
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_build
}
