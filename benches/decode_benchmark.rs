use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sml_bridge::sml::{decode_field, parse_integer, scan_fields};
use sml_bridge::util::hex::hex_to_bytes;
use sml_bridge::{EntityDescriptor, MeterStateTracker};
use std::time::Duration;

// Body of a GetList.Res with energy import (offset 17) and power (offset 39)
const LIST_RESPONSE: &str = "7707FF010108FF6501C3B6AA01621E52FF690000000003A6B1E8\
                             7707FF100700FF0101621B520055000001F4010101";

fn benchmark_decode_field(c: &mut Criterion) {
    let data = hex_to_bytes(LIST_RESPONSE);

    c.bench_function("decode_field", |b| {
        b.iter(|| {
            let energy = decode_field(black_box(&data), 17);
            let power = decode_field(black_box(&data), 39);
            black_box((energy, power))
        })
    });

    c.bench_function("parse_integer_u64", |b| {
        let field = [0x69, 0x00, 0x00, 0x00, 0x00, 0x03, 0xA6, 0xB1, 0xE8];
        b.iter(|| black_box(parse_integer(black_box(&field))))
    });
}

fn benchmark_scan(c: &mut Criterion) {
    let data = hex_to_bytes(LIST_RESPONSE);

    c.bench_function("scan_fields", |b| {
        b.iter(|| black_box(scan_fields(black_box(&data), 0..data.len())))
    });
}

fn benchmark_tracker(c: &mut Criterion) {
    let data = hex_to_bytes(LIST_RESPONSE);
    let entities = vec![
        EntityDescriptor::new("energy_import", 17),
        EntityDescriptor::new("power", 39),
    ];

    c.bench_function("tracker_update_unchanged", |b| {
        let mut tracker = MeterStateTracker::new(entities.clone(), Duration::from_secs(3600));
        tracker.update(&data);
        b.iter(|| black_box(tracker.update(black_box(&data))))
    });
}

criterion_group!(benches, benchmark_decode_field, benchmark_scan, benchmark_tracker);
criterion_main!(benches);
