use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use meshcomm_commissioning::testing::Harness;
use meshcomm_commissioning::{NodeRole, NodeSettings};
use meshcomm_core::constants::ZDP_STATUS_SUCCESS;
use meshcomm_core::{Endpoint, MatchDescRequest, MatchDescResponse, ShortAddr, SignalTag, Status};

fn joined_controller() -> Harness {
    let mut h = Harness::new(NodeSettings {
        role: NodeRole::Router,
        ..NodeSettings::default()
    });
    h.platform.set_factory_new(false);
    h.boot();
    h.signal(SignalTag::DeviceReboot, Status::OK, &[]);
    h
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");

    let request = NodeSettings::default().discovery.request();
    let encoded = request.encode().unwrap();
    group.bench_function("match_desc_request_encode", |b| {
        b.iter(|| black_box(&request).encode().unwrap());
    });
    group.bench_function("match_desc_request_decode", |b| {
        b.iter(|| MatchDescRequest::decode(black_box(&encoded)).unwrap());
    });

    let response = MatchDescResponse {
        src_addr: ShortAddr::new(0x1234),
        status: ZDP_STATUS_SUCCESS,
        addr_of_interest: ShortAddr::new(0x1234),
        endpoints: vec![Endpoint::new(10), Endpoint::new(11)],
    }
    .encode();
    group.bench_function("match_desc_response_decode", |b| {
        b.iter(|| MatchDescResponse::decode(black_box(&response)).unwrap());
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");

    group.bench_function("steering_failure_and_retry", |b| {
        let mut h = Harness::new(NodeSettings {
            role: NodeRole::Router,
            controller: false,
            ..NodeSettings::default()
        });
        h.boot();
        b.iter(|| {
            h.signal(SignalTag::Steering, Status(-1), &[]);
            h.advance(Duration::from_secs(1));
        });
    });

    group.bench_function("discovery_round", |b| {
        b.iter(|| {
            let mut h = joined_controller();
            h.advance(Duration::from_secs(2));
            h.respond_to_query(ShortAddr::new(0x1234), ZDP_STATUS_SUCCESS, &[Endpoint::new(10)]);
            black_box(h.ctx.peer.get())
        });
    });

    group.bench_function("ignored_response", |b| {
        let mut h = joined_controller();
        h.advance(Duration::from_secs(2));
        h.respond_to_query(ShortAddr::new(0x1234), ZDP_STATUS_SUCCESS, &[Endpoint::new(10)]);
        b.iter(|| {
            h.deliver_response(ShortAddr::new(0x5678), ZDP_STATUS_SUCCESS, &[Endpoint::new(3)]);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_codec, bench_dispatch);
criterion_main!(benches);
