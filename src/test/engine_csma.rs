use crate::engine::{
    BridgeHandle, BridgeMode, ChannelKind, CsmaParams, DataRate, DeviceHandle, DeviceSpec, Engine,
    EngineError, Frame, MacAddr, TapBridgeConfig,
};
use crate::os::{HostOs, MemoryOs};
use crate::sim::SimTime;
use std::sync::Arc;

struct CsmaPair {
    os: Arc<MemoryOs>,
    engine: Engine,
    devices: [DeviceHandle; 2],
    bridges: [BridgeHandle; 2],
}

/// 两个节点挂在同一个 CSMA 信道上，各自桥接到 tap t1 / t2
fn csma_pair(mode: BridgeMode, rate: DataRate, delay: SimTime, queue_frames: Option<u64>) -> CsmaPair {
    let os = Arc::new(MemoryOs::new());
    os.create_tap("t1").expect("tap t1");
    os.create_tap("t2").expect("tap t2");
    let mut engine = Engine::new(Arc::clone(&os) as Arc<dyn HostOs>);

    let ch = engine.create_channel(ChannelKind::Csma(CsmaParams::default()));
    engine
        .set_channel_attribute(ch, "DataRate", rate)
        .expect("DataRate");
    engine
        .set_channel_attribute(ch, "Delay", delay)
        .expect("Delay");

    let mut devices = Vec::new();
    let mut bridges = Vec::new();
    for name in ["t1", "t2"] {
        let node = engine.create_node();
        let dev = engine
            .create_device(node, ch, DeviceSpec::Csma { queue_frames })
            .expect("device");
        let bridge = engine
            .add_tap_bridge(
                node,
                dev,
                TapBridgeConfig {
                    mode,
                    device_name: name.to_string(),
                },
            )
            .expect("bridge");
        devices.push(dev);
        bridges.push(bridge);
    }
    engine.start();
    assert!(!engine.pump(SimTime::ZERO));
    CsmaPair {
        os,
        engine,
        devices: [devices[0], devices[1]],
        bridges: [bridges[0], bridges[1]],
    }
}

fn tap_mac(os: &MemoryOs, name: &str) -> MacAddr {
    os.intf(name).expect("tap").mac
}

#[test]
fn first_pump_opens_every_tap() {
    let p = csma_pair(BridgeMode::UseBridge, DataRate::from_mbps(10), SimTime::ZERO, None);
    for b in p.bridges {
        assert!(p.engine.bridge_link_up(b).expect("bridge"));
    }
    assert!(p.os.intf("t1").expect("t1").opened);
}

#[test]
fn csma_frame_arrives_after_serialization_plus_delay() {
    let mut p = csma_pair(
        BridgeMode::UseBridge,
        DataRate::from_mbps(10),
        SimTime::from_millis(1),
        None,
    );
    let src = tap_mac(&p.os, "t1");
    let frame = Frame::ethernet(MacAddr::BROADCAST, src, 0x0800, &[0u8; 986]);
    assert!(p.os.inject("t1", frame.clone().into_bytes()));

    // 1000 字节 @ 10Mbps = 800us，再加 1ms 传播时延
    p.engine.pump(SimTime::ZERO);
    p.engine.pump(SimTime::from_micros(1_799));
    assert!(p.os.take_sent("t2").is_empty());

    p.engine.pump(SimTime::from_micros(1_800));
    let got = p.os.take_sent("t2");
    assert_eq!(got, vec![frame.into_bytes()]);
    assert!(p.os.take_sent("t1").is_empty(), "sender must not hear itself");

    let stats = p.engine.stats();
    assert_eq!(stats.frames_from_taps, 1);
    assert_eq!(stats.frames_to_taps, 1);
    assert_eq!(stats.bytes_to_taps, 1000);
    assert_eq!(stats.delivered_frames, 1);
}

#[test]
fn back_to_back_frames_wait_for_the_channel() {
    let mut p = csma_pair(
        BridgeMode::UseBridge,
        DataRate::from_mbps(10),
        SimTime::from_millis(1),
        None,
    );
    let src = tap_mac(&p.os, "t1");
    for _ in 0..2 {
        let f = Frame::ethernet(MacAddr::BROADCAST, src, 0x0800, &[0u8; 986]);
        p.os.inject("t1", f.into_bytes());
    }
    p.engine.pump(SimTime::ZERO);

    p.engine.pump(SimTime::from_micros(1_800));
    assert_eq!(p.os.take_sent("t2").len(), 1);
    p.engine.pump(SimTime::from_micros(3_599));
    assert!(p.os.take_sent("t2").is_empty());
    p.engine.pump(SimTime::from_micros(3_600));
    assert_eq!(p.os.take_sent("t2").len(), 1);
}

#[test]
fn use_local_rewrites_addresses_in_both_directions() {
    let mut p = csma_pair(BridgeMode::UseLocal, DataRate::from_gbps(1), SimTime::ZERO, None);
    let [d1, d2] = p.devices;
    let dev1 = p.engine.device_address(d1).expect("d1");
    let dev2 = p.engine.device_address(d2).expect("d2");
    let tap1 = tap_mac(&p.os, "t1");
    let tap2 = tap_mac(&p.os, "t2");

    // t1 广播：对端看到的源地址是 d1 的设备地址
    let hello = Frame::ethernet(MacAddr::BROADCAST, tap1, 0x0806, b"who-has");
    p.os.inject("t1", hello.into_bytes());
    p.engine.pump(SimTime::ZERO);
    p.engine.pump(SimTime::from_millis(1));
    let got = p.os.take_sent("t2");
    assert_eq!(got.len(), 1);
    let seen = Frame::new(got[0].clone());
    assert_eq!(seen.src(), dev1);
    assert_eq!(seen.dst(), MacAddr::BROADCAST);

    // t2 单播回给 d1：到达 t1 时目的地址改写为 t1 自己的地址
    let reply = Frame::ethernet(dev1, tap2, 0x0806, b"is-at");
    p.os.inject("t2", reply.into_bytes());
    p.engine.pump(SimTime::from_millis(1));
    p.engine.pump(SimTime::from_millis(2));
    let got = p.os.take_sent("t1");
    assert_eq!(got.len(), 1);
    let seen = Frame::new(got[0].clone());
    assert_eq!(seen.dst(), tap1);
    assert_eq!(seen.src(), dev2);
}

#[test]
fn use_local_filters_unicast_for_other_stations() {
    let mut p = csma_pair(BridgeMode::UseLocal, DataRate::from_gbps(1), SimTime::ZERO, None);
    let tap2 = tap_mac(&p.os, "t2");
    let stranger = MacAddr([0x02, 0, 0, 0, 0, 0x99]);
    p.os.inject("t2", Frame::ethernet(stranger, tap2, 0x0800, b"x").into_bytes());
    p.engine.pump(SimTime::ZERO);
    p.engine.pump(SimTime::from_millis(1));

    assert!(p.os.take_sent("t1").is_empty());
    let stats = p.engine.stats();
    assert_eq!(stats.delivered_frames, 1);
    assert_eq!(stats.filtered_frames, 1);
    assert_eq!(stats.frames_to_taps, 0);
}

#[test]
fn use_bridge_passes_unicast_for_any_address() {
    let mut p = csma_pair(BridgeMode::UseBridge, DataRate::from_gbps(1), SimTime::ZERO, None);
    let tap2 = tap_mac(&p.os, "t2");
    let stranger = MacAddr([0x02, 0, 0, 0, 0, 0x99]);
    let f = Frame::ethernet(stranger, tap2, 0x0800, b"x");
    p.os.inject("t2", f.clone().into_bytes());
    p.engine.pump(SimTime::ZERO);
    p.engine.pump(SimTime::from_millis(1));
    assert_eq!(p.os.take_sent("t1"), vec![f.into_bytes()]);
}

#[test]
fn short_frames_from_taps_are_counted_and_dropped() {
    let mut p = csma_pair(BridgeMode::UseBridge, DataRate::from_gbps(1), SimTime::ZERO, None);
    p.os.inject("t1", vec![1, 2, 3, 4, 5]);
    p.engine.pump(SimTime::ZERO);
    p.engine.pump(SimTime::from_millis(1));
    assert!(p.os.take_sent("t2").is_empty());
    let stats = p.engine.stats();
    assert_eq!(stats.frames_from_taps, 1);
    assert_eq!(stats.malformed_frames, 1);
}

#[test]
fn full_device_queue_drops_new_frames() {
    let mut p = csma_pair(
        BridgeMode::UseBridge,
        DataRate::from_mbps(1),
        SimTime::ZERO,
        Some(1),
    );
    let src = tap_mac(&p.os, "t1");
    for _ in 0..3 {
        let f = Frame::ethernet(MacAddr::BROADCAST, src, 0x0800, &[0u8; 986]);
        p.os.inject("t1", f.into_bytes());
    }
    p.engine.pump(SimTime::ZERO);
    // 第一帧立即开始发送，第二帧排队，第三帧超出队列容量
    assert_eq!(p.engine.stats().dropped_frames, 1);

    p.engine.pump(SimTime::from_secs(1));
    assert_eq!(p.os.take_sent("t2").len(), 2);
}

#[test]
fn transmit_from_the_engine_side_reaches_the_peer_tap() {
    let mut p = csma_pair(BridgeMode::UseBridge, DataRate::from_gbps(1), SimTime::ZERO, None);
    let [d1, _] = p.devices;
    let dev1 = p.engine.device_address(d1).expect("d1");
    let f = Frame::ethernet(MacAddr::BROADCAST, dev1, 0x88b5, b"beacon");
    p.engine.transmit(d1, f.clone()).expect("transmit");
    p.engine.pump(SimTime::from_millis(1));
    assert_eq!(p.os.take_sent("t2"), vec![f.into_bytes()]);
}

#[test]
fn simple_channel_delivers_instantly() {
    let os = Arc::new(MemoryOs::new());
    os.create_tap("s2").expect("tap");
    let mut engine = Engine::new(Arc::clone(&os) as Arc<dyn HostOs>);
    let ch = engine.create_channel(ChannelKind::Simple);
    let n1 = engine.create_node();
    let n2 = engine.create_node();
    let d1 = engine.create_device(n1, ch, DeviceSpec::Simple).expect("d1");
    let d2 = engine.create_device(n2, ch, DeviceSpec::Simple).expect("d2");
    engine
        .add_tap_bridge(
            n2,
            d2,
            TapBridgeConfig {
                mode: BridgeMode::UseBridge,
                device_name: "s2".to_string(),
            },
        )
        .expect("bridge");
    engine.start();
    engine.pump(SimTime::ZERO);

    let dev1 = engine.device_address(d1).expect("d1");
    engine
        .transmit(d1, Frame::ethernet(MacAddr::BROADCAST, dev1, 0x0800, b"now"))
        .expect("transmit");
    engine.pump(SimTime::ZERO);
    assert_eq!(os.take_sent("s2").len(), 1);
}

#[test]
fn device_addresses_are_allocated_sequentially() {
    let p = csma_pair(BridgeMode::UseBridge, DataRate::from_gbps(1), SimTime::ZERO, None);
    let [d1, d2] = p.devices;
    assert_eq!(
        p.engine.device_address(d1).expect("d1"),
        MacAddr([0, 0, 0, 0, 0, 1])
    );
    assert_eq!(
        p.engine.device_address(d2).expect("d2"),
        MacAddr([0, 0, 0, 0, 0, 2])
    );
}

#[test]
fn bridge_construction_is_validated() {
    let os: Arc<dyn HostOs> = Arc::new(MemoryOs::new());
    let mut engine = Engine::new(os);
    let csma = engine.create_channel(ChannelKind::Csma(CsmaParams::default()));
    let simple = engine.create_channel(ChannelKind::Simple);
    let n1 = engine.create_node();
    let n2 = engine.create_node();

    let err = engine
        .create_device(n1, simple, DeviceSpec::Csma { queue_frames: None })
        .expect_err("kind mismatch");
    assert!(matches!(err, EngineError::ChannelMismatch { .. }));

    let d1 = engine
        .create_device(n1, csma, DeviceSpec::Csma { queue_frames: None })
        .expect("d1");
    let cfg = || TapBridgeConfig {
        mode: BridgeMode::UseBridge,
        device_name: "tap0".to_string(),
    };
    let err = engine.add_tap_bridge(n2, d1, cfg()).expect_err("wrong node");
    assert!(matches!(err, EngineError::DeviceNotOnNode { .. }));

    engine.add_tap_bridge(n1, d1, cfg()).expect("bridge");
    let err = engine.add_tap_bridge(n1, d1, cfg()).expect_err("twice");
    assert_eq!(err, EngineError::DeviceAlreadyBridged(d1));
}

#[test]
fn channel_attributes_are_checked_by_name_and_type() {
    let os: Arc<dyn HostOs> = Arc::new(MemoryOs::new());
    let mut engine = Engine::new(os);
    let csma = engine.create_channel(ChannelKind::Csma(CsmaParams::default()));
    let simple = engine.create_channel(ChannelKind::Simple);

    let err = engine
        .set_channel_attribute(csma, "DataRate", SimTime::from_millis(1))
        .expect_err("type");
    assert!(matches!(err, EngineError::AttributeType { .. }));
    let err = engine
        .set_channel_attribute(csma, "Mtu", 1500u64)
        .expect_err("unknown key");
    assert!(matches!(err, EngineError::UnknownAttribute { .. }));
    let err = engine
        .set_channel_attribute(simple, "Delay", SimTime::ZERO)
        .expect_err("simple channel has no attributes");
    assert!(matches!(err, EngineError::UnknownAttribute { .. }));
}

#[test]
fn device_name_is_frozen_once_the_tap_is_open() {
    let mut p = csma_pair(BridgeMode::UseBridge, DataRate::from_gbps(1), SimTime::ZERO, None);
    let b = p.bridges[0];
    let err = p
        .engine
        .set_bridge_attribute(b, "DeviceName", "renamed")
        .expect_err("already open");
    assert!(matches!(err, EngineError::InvalidAttribute { .. }));
    assert_eq!(p.engine.bridge_device_name(b).expect("name"), "t1");

    p.engine
        .set_bridge_attribute(b, "Mode", BridgeMode::UseLocal)
        .expect("mode");
    assert_eq!(p.engine.bridge_mode(b).expect("mode"), BridgeMode::UseLocal);
}

#[test]
fn destroy_invalidates_old_handles() {
    let mut p = csma_pair(BridgeMode::UseBridge, DataRate::from_gbps(1), SimTime::ZERO, None);
    let [d1, _] = p.devices;
    let epoch = p.engine.epoch();
    p.engine.destroy();
    assert_eq!(p.engine.epoch(), epoch + 1);
    assert_eq!(p.engine.now(), SimTime::ZERO);
    assert_eq!(
        p.engine.device_address(d1),
        Err(EngineError::StaleHandle {
            found: epoch,
            current: epoch + 1,
        })
    );

    // 新一代的句柄从零开始编号
    let n = p.engine.create_node();
    assert_eq!(n.index(), 0);
    assert_eq!(n.epoch(), epoch + 1);
}

#[test]
fn tap_that_cannot_be_opened_is_retried() {
    let os = Arc::new(MemoryOs::new());
    let mut engine = Engine::new(Arc::clone(&os) as Arc<dyn HostOs>);
    let ch = engine.create_channel(ChannelKind::Simple);
    let n = engine.create_node();
    let d = engine.create_device(n, ch, DeviceSpec::Simple).expect("d");
    let b = engine
        .add_tap_bridge(
            n,
            d,
            TapBridgeConfig {
                mode: BridgeMode::UseBridge,
                device_name: "late0".to_string(),
            },
        )
        .expect("bridge");
    engine.start();
    engine.pump(SimTime::ZERO);
    assert!(!engine.bridge_link_up(b).expect("bridge"));

    os.create_tap("late0").expect("tap");
    engine.pump(SimTime::from_millis(1));
    assert!(engine.bridge_link_up(b).expect("bridge"));
}
