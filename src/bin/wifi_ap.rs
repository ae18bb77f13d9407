//! 一个 AP 与若干 STA 的 Wi-Fi 网段
//!
//! ap1 作为接入点，sta1..staN 依次排在 x 轴上；运行一段时间后
//! 打印每个 STA 的关联状态。

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tapsim_rs::config::EmuConfig;
use tapsim_rs::emu::{ApOpts, Emulation, StaOpts, WifiSegment, WifiSegmentOpts};
use tapsim_rs::engine::{MobilityKind, StationManager, Vector3, WifiStandard};
use tapsim_rs::error::Result;
use tapsim_rs::os::{HostOs, IpRoute, MemoryOs};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "wifi_ap", about = "Wi-Fi 仿真：一个 AP 与若干 STA")]
struct Args {
    #[arg(long, default_value = "tapsim")]
    ssid: String,
    /// AP 所在信道号
    #[arg(long, default_value_t = 1)]
    channel: u32,
    #[arg(long, default_value_t = 2)]
    stas: u32,
    /// 相邻两个节点在 x 轴上的间距（米）
    #[arg(long, default_value_t = 20.0)]
    spacing_m: f64,
    #[arg(long, default_value_t = 100.0)]
    range_m: f64,
    /// a / b / g
    #[arg(long, default_value = "g")]
    standard: WifiStandard,
    /// 速率控制：Arf / Aarf / ConstantRate:<rate>
    #[arg(long, default_value = "Arf")]
    station_manager: StationManager,
    /// 仿真运行多少毫秒（墙钟）
    #[arg(long, default_value_t = 500)]
    duration_ms: u64,
    #[arg(long)]
    config: Option<PathBuf>,
    /// 使用内存 OS 边界，不创建真实的命名空间与 tap
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    // 初始化 tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("wifi_ap: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => EmuConfig::from_json_file(path)?,
        None => EmuConfig::default(),
    };
    let os: Arc<dyn HostOs> = if args.dry_run {
        Arc::new(MemoryOs::new())
    } else {
        Arc::new(IpRoute::new(config.use_sudo))
    };

    let mut emu = Emulation::new(os, config);
    let mut seg = WifiSegment::new(
        &mut emu,
        WifiSegmentOpts {
            standard: args.standard,
            station_manager: args.station_manager,
            range_m: args.range_m,
            ..Default::default()
        },
    )?;

    let ap = emu.add_host("ap1")?;
    let ap_intf = seg.add_ap(
        &mut emu,
        ap,
        ApOpts {
            channel: args.channel,
            ssid: Some(args.ssid.clone()),
            ..Default::default()
        },
    )?;
    emu.set_mobility_model(ap, MobilityKind::ConstantPosition)?;
    emu.set_position(ap, Vector3::ZERO)?;
    emu.set_intf_ip(ap_intf, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 24)?;

    let mut stas = Vec::new();
    for i in 1..=args.stas {
        let node = emu.add_host(&format!("sta{i}"))?;
        let intf = seg.add_sta(
            &mut emu,
            node,
            StaOpts {
                ssid: Some(args.ssid.clone()),
                ..Default::default()
            },
        )?;
        emu.set_position(node, Vector3::new(args.spacing_m * f64::from(i), 0.0, 0.0))?;
        let host = u8::try_from(i + 1).unwrap_or(u8::MAX);
        emu.set_intf_ip(intf, IpAddr::V4(Ipv4Addr::new(10, 0, 0, host)), 24)?;
        stas.push(intf);
    }

    emu.start()?;
    info!(aps = seg.aps().len(), stas = seg.stas().len(), "Wi-Fi 网段已启动");
    std::thread::sleep(Duration::from_millis(args.duration_ms));
    emu.stop()?;

    for &id in &stas {
        let intf = emu.intf(id)?;
        let name = intf.name().to_string();
        let Some(device) = intf.device() else {
            continue;
        };
        let (bssid, channel) = emu.with_engine(move |e| {
            (e.wifi_association(device), e.wifi_channel_number(device))
        })?;
        println!(
            "sta={name} associated={} channel={}",
            bssid?.map(|m| m.to_string()).unwrap_or_else(|| "-".to_string()),
            channel?.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }
    let stats = emu.stats()?;
    println!("stats={}", serde_json::to_string(&stats)?);

    emu.clear()?;
    Ok(())
}
