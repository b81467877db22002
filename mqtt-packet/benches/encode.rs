#[macro_use]
extern crate criterion;

use criterion::Criterion;

use mqtt_core::*;
use mqtt_packet::*;

fn bench_encode_connect_packets(c: &mut Criterion) {
    let connect = Connect {
        clean_session: false,
        keep_alive: 60,
        client_id: "12345",
        last_will: Some(LastWill {
            qos: QoS::ExactlyOnce,
            retain: false,
            topic_name: "topic",
            message: b"message",
        }),
        username: Some("user"),
        password: Some(b"pass"),
    };

    c.bench_function("encode_connect_packets", move |b| {
        b.iter(|| encode_connect(&connect).unwrap())
    });
}

fn bench_encode_publish_packets(c: &mut Criterion) {
    let publish = Publish {
        dup: false,
        retain: true,
        qos: QoS::AtLeastOnce,
        topic_name: "sensors/temp",
        packet_id: Some(0x4321),
        payload: b"23.5",
    };

    c.bench_function("encode_publish_packets", move |b| {
        b.iter(|| encode_publish(&publish).unwrap())
    });
}

fn bench_encode_subscribe_packets(c: &mut Criterion) {
    let subscribe = Subscribe::new(
        0x1234,
        vec![("test", QoS::AtLeastOnce), ("filter", QoS::ExactlyOnce)],
    );

    c.bench_function("encode_subscribe_packets", move |b| {
        b.iter(|| encode_subscribe(&subscribe).unwrap())
    });
}

fn bench_encode_unsubscribe_packets(c: &mut Criterion) {
    let unsubscribe = Unsubscribe::new(0x1234, vec!["test", "filter"]);

    c.bench_function("encode_unsubscribe_packets", move |b| {
        b.iter(|| encode_unsubscribe(&unsubscribe).unwrap())
    });
}

fn bench_write_subscribe_ack_packets(c: &mut Criterion) {
    let p = Packet::SubscribeAck(SubscribeAck {
        packet_id: 0x1234,
        status: vec![
            SubscribeReturnCode::Success(QoS::AtLeastOnce),
            SubscribeReturnCode::Failure,
            SubscribeReturnCode::Success(QoS::ExactlyOnce),
        ],
    });

    c.bench_function("write_subscribe_ack_packets", move |b| {
        let mut v = Vec::new();

        b.iter(|| {
            v.clear();
            p.write_to(&mut v)
        })
    });
}

criterion_group!(
    encode,
    bench_encode_connect_packets,
    bench_encode_publish_packets,
    bench_encode_subscribe_packets,
    bench_encode_unsubscribe_packets,
    bench_write_subscribe_ack_packets
);
criterion_main!(encode);
