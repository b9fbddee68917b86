use std::hint::black_box;
use std::io::Cursor;

use bytes::BytesMut;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use sflow::Datagram;
use sflow::dispatch::{decode_record, encode_record};
use sflow::records::{AsPathSegment, AsPathSegmentType, ExtendedGateway, Record};
use sflow::registry::Registry;

const DATAGRAMS: [(&str, &[u8]); 3] = [
    ("flow", include_bytes!("../tests/fixtures/flow_sample.bin")),
    (
        "expanded_flow",
        include_bytes!("../tests/fixtures/expanded_flow_sample.bin"),
    ),
    (
        "hsflowd_counters",
        include_bytes!("../tests/fixtures/hsflowd_counters.bin"),
    ),
];

fn bench_datagram(c: &mut Criterion) {
    let mut group = c.benchmark_group("datagram");

    for (name, data) in DATAGRAMS {
        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_function(name, |b| b.iter(|| Datagram::decode(black_box(data))));
    }

    group.finish();
}

fn bench_gateway(c: &mut Criterion) {
    let record = Record::ExtendedGateway(ExtendedGateway::new(
        "10.0.0.1".parse().unwrap(),
        65000,
        65100,
        65101,
        vec![AsPathSegment {
            seg_type: AsPathSegmentType::Ordered,
            seg: (65001..65017).collect(),
        }],
        (0..8).collect(),
        100,
    ));

    let mut data = BytesMut::new();
    encode_record(&mut data, &record).unwrap();

    let mut group = c.benchmark_group("gateway");

    group.bench_function("encode", |b| {
        b.iter(|| {
            let mut buf = BytesMut::with_capacity(data.len());
            encode_record(&mut buf, black_box(&record)).unwrap();
            buf
        })
    });

    group.bench_function("decode", |b| {
        b.iter(|| decode_record(&mut Cursor::new(black_box(data.as_ref())), Registry::flows()))
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_datagram, bench_gateway
);
criterion_main!(benches);
