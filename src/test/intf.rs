use super::support::memory_emulation;
use crate::emu::{AttachOpts, CsmaSegment, IntfSpec, Segment, SimpleSegment};
use crate::engine::BridgeMode;
use crate::error::{Error, Warning};
use crate::sim::SimTime;
use std::net::{IpAddr, Ipv4Addr};

#[test]
fn intf_without_simulated_handles_stays_uninstalled() {
    let (os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let id = emu
        .create_intf(IntfSpec::new("h1-eth0", h1))
        .expect("intf");

    let intf = emu.intf(id).expect("intf");
    assert!(!intf.is_installed());
    assert!(intf.tap_exists());
    assert!(!intf.in_right_namespace());
    assert_eq!(intf.port(), 0);
    assert_eq!(os.intf("h1-eth0").expect("tap").namespace, None);

    assert!(matches!(emu.install_intf(id), Err(Error::MissingSimNode(_))));
}

#[test]
fn attaching_to_a_segment_installs_immediately_with_the_node_default_mode() {
    let (_os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let s1 = emu.add_switch("s1").expect("s1");
    let mut seg = CsmaSegment::new(&mut emu, None, SimTime::ZERO).expect("segment");
    let a = seg.attach(&mut emu, h1, AttachOpts::default()).expect("h1");
    let b = seg.attach(&mut emu, s1, AttachOpts::default()).expect("s1");

    let a = emu.intf(a).expect("a");
    assert!(a.is_installed());
    assert!(a.bridge().is_some());
    assert_eq!(a.mode(), Some(BridgeMode::UseLocal));

    let b = emu.intf(b).expect("b");
    assert!(b.is_installed());
    assert_eq!(b.mode(), Some(BridgeMode::UseBridge));
    assert_eq!(b.name(), "s1-eth1");
    assert!(b.in_right_namespace(), "switch ports live in the root namespace");
}

#[test]
fn explicit_mode_overrides_the_node_default() {
    let (_os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let mut seg = SimpleSegment::new(&mut emu).expect("segment");
    let id = seg
        .attach(
            &mut emu,
            h1,
            AttachOpts {
                mode: Some(BridgeMode::UseBridge),
                ..Default::default()
            },
        )
        .expect("attach");
    assert_eq!(emu.intf(id).expect("intf").mode(), Some(BridgeMode::UseBridge));
}

#[test]
fn installed_intf_cannot_be_deleted() {
    let (os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let mut seg = SimpleSegment::new(&mut emu).expect("segment");
    let id = seg.attach(&mut emu, h1, AttachOpts::default()).expect("attach");

    assert!(matches!(emu.delete_intf(id), Err(Error::DeleteInstalled(_))));
    assert!(os.intf("h1-eth0").is_some());
    assert_eq!(emu.registry().intfs().len(), 1);
}

#[test]
fn deleting_an_uninstalled_intf_removes_the_tap_and_frees_the_port() {
    let (os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let id = emu
        .create_intf(IntfSpec::new("h1-eth0", h1).port(3))
        .expect("intf");
    assert!(emu.node(h1).expect("h1").port_in_use(3));

    emu.delete_intf(id).expect("delete");
    assert!(os.intf("h1-eth0").is_none());
    assert!(emu.registry().is_empty());
    assert!(!emu.node(h1).expect("h1").port_in_use(3));
    assert!(matches!(emu.intf(id), Err(Error::UnknownIntf(_))));
}

#[test]
fn rename_before_start_updates_the_bridge_device_name() {
    let (os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let mut seg = SimpleSegment::new(&mut emu).expect("segment");
    let id = seg.attach(&mut emu, h1, AttachOpts::default()).expect("attach");

    emu.rename_intf(id, "uplink0").expect("rename");
    assert_eq!(emu.intf(id).expect("intf").name(), "uplink0");
    assert!(os.intf("uplink0").is_some());
    assert!(os.intf("h1-eth0").is_none());

    let bridge = emu.intf(id).expect("intf").bridge().expect("bridge");
    let name = emu
        .with_engine(move |e| e.bridge_device_name(bridge))
        .expect("engine")
        .expect("bridge");
    assert_eq!(name, "uplink0");
}

#[test]
fn rename_after_the_tap_is_connected_is_refused() {
    let (_os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let mut seg = SimpleSegment::new(&mut emu).expect("segment");
    let id = seg.attach(&mut emu, h1, AttachOpts::default()).expect("attach");
    emu.start().expect("start");

    assert!(emu.intf_link_up(id).expect("link"));
    assert!(matches!(
        emu.rename_intf(id, "late0"),
        Err(Error::RenameAfterConnect(_))
    ));
    emu.stop().expect("stop");
}

#[test]
fn failed_tap_creation_is_a_warning_not_an_error() {
    let (os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    os.fail_tap_creation("h1-eth0");

    let id = emu
        .create_intf(IntfSpec::new("h1-eth0", h1))
        .expect("intf still registered");
    assert!(!emu.intf(id).expect("intf").tap_exists());
    assert!(matches!(
        emu.warnings(),
        [Warning::TapCreateFailed { intf, .. }] if intf == "h1-eth0"
    ));
}

#[test]
fn ip_configured_before_start_survives_migration() {
    let (os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let mut seg = SimpleSegment::new(&mut emu).expect("segment");
    let id = seg.attach(&mut emu, h1, AttachOpts::default()).expect("attach");
    let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    emu.set_intf_ip(id, addr, 24).expect("ip");

    emu.start().expect("start");
    let intf = emu.intf(id).expect("intf");
    assert!(intf.in_right_namespace());
    assert_eq!(intf.current_namespace(), Some("h1"));
    assert!(intf.is_up());

    let tap = os.intf("h1-eth0").expect("tap");
    assert_eq!(tap.namespace.as_deref(), Some("h1"));
    assert_eq!(tap.addrs, vec![(addr, 24)]);
    assert!(tap.up);
    assert!(tap.opened);
    emu.stop().expect("stop");
}

#[test]
fn commands_run_in_the_namespace_the_intf_is_in() {
    let (os, mut emu) = memory_emulation();
    let h1 = emu.add_host("h1").expect("h1");
    let mut seg = SimpleSegment::new(&mut emu).expect("segment");
    let id = seg.attach(&mut emu, h1, AttachOpts::default()).expect("attach");

    emu.intf_cmd(id, "ip link").expect("before");
    emu.start().expect("start");
    emu.intf_cmd(id, "ip addr").expect("after");
    emu.stop().expect("stop");

    assert_eq!(
        os.commands(),
        vec![
            (None, "ip link".to_string()),
            (Some("h1".to_string()), "ip addr".to_string()),
        ]
    );
}
