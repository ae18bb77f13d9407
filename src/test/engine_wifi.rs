use crate::engine::{
    BridgeMode, ChannelHandle, ChannelKind, DataRate, DEFAULT_BEACON_INTERVAL, DeviceHandle, DeviceSpec, Engine,
    EngineError, Frame, MacAddr, MobilityKind, NodeHandle, ScanType, Ssid, StationManager,
    TapBridgeConfig, Vector3, WifiChannelParams, WifiDeviceSpec, WifiRole, WifiStandard,
};
use crate::os::{HostOs, MemoryOs};
use crate::sim::SimTime;
use std::sync::Arc;

struct Radio {
    os: Arc<MemoryOs>,
    engine: Engine,
    channel: ChannelHandle,
}

impl Radio {
    fn new(standard: WifiStandard) -> Self {
        let os = Arc::new(MemoryOs::new());
        let mut engine = Engine::new(Arc::clone(&os) as Arc<dyn HostOs>);
        let channel = engine.create_channel(ChannelKind::Wifi(WifiChannelParams {
            range_m: 100.0,
            standard,
        }));
        Self { os, engine, channel }
    }

    fn station(&mut self, role: WifiRole, channel_number: u8, at: Vector3) -> (NodeHandle, DeviceHandle) {
        let node = self.engine.create_node();
        self.engine
            .install_mobility(node, MobilityKind::ConstantPosition)
            .expect("mobility");
        self.engine.set_position(node, at).expect("position");
        let dev = self
            .engine
            .create_device(
                node,
                self.channel,
                DeviceSpec::Wifi(WifiDeviceSpec::new(role, channel_number)),
            )
            .expect("device");
        (node, dev)
    }

    /// 把设备桥接到同名 tap
    fn tap(&mut self, node: NodeHandle, dev: DeviceHandle, name: &str, mode: BridgeMode) {
        self.os.create_tap(name).expect("tap");
        self.engine
            .add_tap_bridge(
                node,
                dev,
                TapBridgeConfig {
                    mode,
                    device_name: name.to_string(),
                },
            )
            .expect("bridge");
    }
}

fn ssid(s: &str) -> Ssid {
    Ssid::new(s).expect("ssid")
}

#[test]
fn sta_associates_on_first_beacon_and_drops_when_out_of_range() {
    let mut r = Radio::new(WifiStandard::G);
    let (_, ap) = r.station(WifiRole::ap(ssid("lab")), 1, Vector3::ZERO);
    let (sta_node, sta) = r.station(
        WifiRole::sta(ssid("lab"), ScanType::NotSupported, 11),
        1,
        Vector3::new(50.0, 0.0, 0.0),
    );
    let ap_mac = r.engine.device_address(ap).expect("ap");

    r.engine.start();
    r.engine.pump(SimTime::ZERO);
    assert_eq!(r.engine.wifi_association(sta).expect("sta"), Some(ap_mac));

    r.engine
        .set_position(sta_node, Vector3::new(150.0, 0.0, 0.0))
        .expect("move");
    r.engine.pump(DEFAULT_BEACON_INTERVAL);
    assert_eq!(r.engine.wifi_association(sta).expect("sta"), None);

    let stats = r.engine.stats();
    assert_eq!(stats.associations, 1);
    assert_eq!(stats.disassociations, 1);
}

#[test]
fn sta_ignores_aps_with_another_ssid() {
    let mut r = Radio::new(WifiStandard::G);
    r.station(WifiRole::ap(ssid("lab")), 1, Vector3::ZERO);
    let (_, sta) = r.station(
        WifiRole::sta(ssid("office"), ScanType::NotSupported, 11),
        1,
        Vector3::new(10.0, 0.0, 0.0),
    );
    r.engine.start();
    r.engine.pump(SimTime::from_millis(500));
    assert_eq!(r.engine.wifi_association(sta).expect("sta"), None);
}

#[test]
fn empty_ssid_joins_any_ap() {
    let mut r = Radio::new(WifiStandard::G);
    let (_, ap) = r.station(WifiRole::ap(ssid("lab")), 1, Vector3::ZERO);
    let (_, sta) = r.station(
        WifiRole::sta(Ssid::any(), ScanType::NotSupported, 11),
        1,
        Vector3::new(10.0, 0.0, 0.0),
    );
    r.engine.start();
    r.engine.pump(SimTime::ZERO);
    let ap_mac = r.engine.device_address(ap).expect("ap");
    assert_eq!(r.engine.wifi_association(sta).expect("sta"), Some(ap_mac));
}

#[test]
fn active_scan_finds_ap_on_another_channel_and_follows_it() {
    let mut r = Radio::new(WifiStandard::G);
    let (_, ap) = r.station(WifiRole::ap(ssid("lab")), 3, Vector3::ZERO);
    let (_, scanning) = r.station(
        WifiRole::sta(ssid("lab"), ScanType::Active, 11),
        6,
        Vector3::new(10.0, 0.0, 0.0),
    );
    let (_, passive) = r.station(
        WifiRole::sta(ssid("lab"), ScanType::NotSupported, 11),
        6,
        Vector3::new(10.0, 0.0, 0.0),
    );
    r.engine.start();
    r.engine.pump(SimTime::ZERO);

    let ap_mac = r.engine.device_address(ap).expect("ap");
    assert_eq!(r.engine.wifi_association(scanning).expect("sta"), Some(ap_mac));
    assert_eq!(r.engine.wifi_channel_number(scanning).expect("sta"), Some(3));
    assert_eq!(r.engine.wifi_association(passive).expect("sta"), None);
    assert_eq!(r.engine.wifi_channel_number(passive).expect("sta"), Some(6));
}

#[test]
fn broadcast_from_ap_uses_basic_rate_and_propagation_delay() {
    let mut r = Radio::new(WifiStandard::G);
    let (_, ap) = r.station(WifiRole::ap(ssid("lab")), 1, Vector3::ZERO);
    let (sta_node, sta) = r.station(
        WifiRole::sta(ssid("lab"), ScanType::NotSupported, 11),
        1,
        Vector3::new(50.0, 0.0, 0.0),
    );
    r.tap(sta_node, sta, "sta0", BridgeMode::UseLocal);
    r.engine.start();
    r.engine.pump(SimTime::ZERO);

    // 100 字节 @ 6Mbps = 133334ns，50m 传播约 167ns
    let ap_mac = r.engine.device_address(ap).expect("ap");
    let f = Frame::ethernet(MacAddr::BROADCAST, ap_mac, 0x0800, &[0u8; 86]);
    r.engine.transmit(ap, f).expect("transmit");
    r.engine.pump(SimTime(133_400));
    assert!(r.os.take_sent("sta0").is_empty());
    r.engine.pump(SimTime(133_501));
    assert_eq!(r.os.take_sent("sta0").len(), 1);
}

#[test]
fn unassociated_sta_hears_nothing_from_the_ap() {
    let mut r = Radio::new(WifiStandard::G);
    let (_, ap) = r.station(WifiRole::ap(ssid("lab")), 1, Vector3::ZERO);
    let (sta_node, sta) = r.station(
        WifiRole::sta(ssid("lab"), ScanType::NotSupported, 11),
        1,
        Vector3::new(150.0, 0.0, 0.0),
    );
    r.tap(sta_node, sta, "far0", BridgeMode::UseLocal);
    r.engine.start();
    r.engine.pump(SimTime::ZERO);

    let ap_mac = r.engine.device_address(ap).expect("ap");
    r.engine
        .transmit(ap, Frame::ethernet(MacAddr::BROADCAST, ap_mac, 0x0800, b"hi"))
        .expect("transmit");
    r.engine.pump(SimTime::from_millis(10));
    assert!(r.os.take_sent("far0").is_empty());
}

#[test]
fn wds_peers_only_talk_to_their_receiver() {
    let mut r = Radio::new(WifiStandard::A);
    let (n1, w1) = r.station(WifiRole::Wds { receiver: None }, 1, Vector3::ZERO);
    let (n2, w2) = r.station(WifiRole::Wds { receiver: None }, 1, Vector3::new(5.0, 0.0, 0.0));
    let (n3, w3) = r.station(WifiRole::Wds { receiver: None }, 1, Vector3::new(5.0, 5.0, 0.0));
    let m2 = r.engine.device_address(w2).expect("w2");
    r.engine
        .set_device_attribute(w1, "ReceiverAddress", m2)
        .expect("receiver");
    r.tap(n1, w1, "wds1", BridgeMode::UseBridge);
    r.tap(n2, w2, "wds2", BridgeMode::UseBridge);
    r.tap(n3, w3, "wds3", BridgeMode::UseBridge);
    r.engine.start();
    r.engine.pump(SimTime::ZERO);

    let m1 = r.engine.device_address(w1).expect("w1");
    r.engine
        .transmit(w1, Frame::ethernet(MacAddr::BROADCAST, m1, 0x0800, b"link"))
        .expect("transmit");
    r.engine.pump(SimTime::from_millis(10));
    assert_eq!(r.os.take_sent("wds2").len(), 1);
    assert!(r.os.take_sent("wds3").is_empty());
}

#[test]
fn adhoc_stations_on_different_channel_numbers_do_not_hear_each_other() {
    let mut r = Radio::new(WifiStandard::G);
    let (_, a) = r.station(WifiRole::Adhoc, 1, Vector3::ZERO);
    let (nb, b) = r.station(WifiRole::Adhoc, 1, Vector3::new(1.0, 0.0, 0.0));
    let (nc, c) = r.station(WifiRole::Adhoc, 2, Vector3::new(1.0, 0.0, 0.0));
    r.tap(nb, b, "adb", BridgeMode::UseLocal);
    r.tap(nc, c, "adc", BridgeMode::UseLocal);
    r.engine.start();
    r.engine.pump(SimTime::ZERO);

    let ma = r.engine.device_address(a).expect("a");
    r.engine
        .transmit(a, Frame::ethernet(MacAddr::BROADCAST, ma, 0x0800, b"adhoc"))
        .expect("transmit");
    r.engine.pump(SimTime::from_millis(10));
    assert_eq!(r.os.take_sent("adb").len(), 1);
    assert!(r.os.take_sent("adc").is_empty());
}

#[test]
fn station_manager_lowers_rate_with_distance() {
    let near = StationManager::Arf.rate(WifiStandard::G, 1.0, 100.0);
    let far = StationManager::Arf.rate(WifiStandard::G, 99.0, 100.0);
    let far_aarf = StationManager::Aarf.rate(WifiStandard::G, 50.0, 100.0);
    let mid_arf = StationManager::Arf.rate(WifiStandard::G, 50.0, 100.0);
    assert_eq!(near, WifiStandard::G.rates()[0]);
    assert_eq!(far, WifiStandard::G.basic_rate());
    assert!(far_aarf < mid_arf);

    let fixed: StationManager = "ConstantRate:24Mbps".parse().expect("manager");
    assert_eq!(
        fixed.rate(WifiStandard::B, 99.0, 100.0),
        "24Mbps".parse::<DataRate>().expect("rate")
    );
    assert_eq!(
        "ns3::AarfWifiManager".parse::<StationManager>(),
        Ok(StationManager::Aarf)
    );
}

#[test]
fn wifi_attributes_follow_the_role() {
    let mut r = Radio::new(WifiStandard::G);
    let (_, adhoc) = r.station(WifiRole::Adhoc, 1, Vector3::ZERO);
    let (sta_node, sta) = r.station(
        WifiRole::sta(ssid("lab"), ScanType::NotSupported, 11),
        1,
        Vector3::ZERO,
    );
    let (_, ap) = r.station(WifiRole::ap(ssid("lab")), 1, Vector3::ZERO);

    let err = r
        .engine
        .set_device_attribute(adhoc, "Ssid", ssid("x"))
        .expect_err("adhoc has no ssid");
    assert!(matches!(err, EngineError::UnknownAttribute { .. }));

    let err = r
        .engine
        .set_device_attribute(sta, "ChannelNumber", 0u64)
        .expect_err("channel 0");
    assert!(matches!(err, EngineError::InvalidAttribute { .. }));
    r.engine
        .set_device_attribute(sta, "ChannelNumber", 6u64)
        .expect("channel 6");
    assert_eq!(r.engine.wifi_channel_number(sta).expect("sta"), Some(6));
    r.engine
        .set_device_attribute(sta, "ScanType", ScanType::Active)
        .expect("scan");

    let err = r
        .engine
        .set_device_attribute(ap, "BeaconInterval", SimTime::ZERO)
        .expect_err("zero interval");
    assert!(matches!(err, EngineError::InvalidAttribute { .. }));

    assert!(Ssid::new("x".repeat(33)).is_err());
    assert!(Ssid::new("x".repeat(32)).is_ok());

    assert!(!r.engine.supports_send_from(sta).expect("sta"));
    assert!(r.engine.supports_send_from(ap).expect("ap"));
    let err = r
        .engine
        .add_tap_bridge(
            sta_node,
            sta,
            TapBridgeConfig {
                mode: BridgeMode::UseBridge,
                device_name: "sta0".to_string(),
            },
        )
        .expect_err("sta cannot send from");
    assert_eq!(err, EngineError::SendFromUnsupported(sta));
}
