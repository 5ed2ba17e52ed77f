use criterion::{black_box, criterion_group, Criterion};
use radiante_kdm::{Container, MapData};

fn bench_parse(c: &mut Criterion) {
    for maps in [10, 100, 1_000] {
        let mut map_data = MapData::default();
        map_data.set(&super::state(maps)).unwrap();
        let bytes = map_data.build().unwrap();
        c.bench_function(&format!("{}/maps={}", module_path!(), maps), |b| {
            b.iter(|| black_box(MapData::parse(&bytes).unwrap()));
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_parse
}
