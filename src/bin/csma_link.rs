//! 两台主机经 CSMA 链路互联
//!
//! h1 <-> h2，各自一个命名空间，中间是仿真的 CSMA 信道。
//! `--dry-run` 使用内存中的 OS 边界，不需要 root 权限。

use clap::Parser;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tapsim_rs::config::EmuConfig;
use tapsim_rs::emu::{Emulation, LinkKind, LinkOpts, create_link};
use tapsim_rs::engine::{DataRate, Frame, MacAddr};
use tapsim_rs::error::Result;
use tapsim_rs::os::{HostOs, IpRoute, MemoryOs};
use tapsim_rs::sim::SimTime;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "csma_link", about = "CSMA 链路仿真：h1 <-> h2")]
struct Args {
    /// 信道速率，例如 10Mbps、1Gbps
    #[arg(long, default_value = "100Mbps")]
    data_rate: DataRate,
    /// 单向传播时延，例如 2ms、500us
    #[arg(long, default_value = "1ms")]
    delay: SimTime,
    /// 仿真运行多少毫秒（墙钟）
    #[arg(long, default_value_t = 200)]
    duration_ms: u64,
    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,
    /// 使用内存 OS 边界，不创建真实的命名空间与 tap
    #[arg(long)]
    dry_run: bool,
    /// 启动后在 h1 里 ping h2
    #[arg(long)]
    ping: bool,
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
        eprintln!("csma_link: {e}");
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => EmuConfig::from_json_file(path)?,
        None => EmuConfig::default(),
    };
    let memory = args.dry_run.then(|| Arc::new(MemoryOs::new()));
    let os: Arc<dyn HostOs> = match &memory {
        Some(m) => Arc::clone(m) as Arc<dyn HostOs>,
        None => Arc::new(IpRoute::new(config.use_sudo)),
    };

    let mut emu = Emulation::new(os, config);
    let h1 = emu.add_host("h1")?;
    let h2 = emu.add_host("h2")?;
    let link = create_link(
        &mut emu,
        h1,
        h2,
        LinkKind::Csma {
            data_rate: Some(args.data_rate),
            delay: args.delay,
        },
        LinkOpts::default(),
    )?;
    emu.set_intf_ip(link.intf1(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 24)?;
    emu.set_intf_ip(link.intf2(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 24)?;

    emu.start()?;
    info!(data_rate = %args.data_rate, delay = %args.delay, "链路已就绪");

    if let Some(m) = &memory {
        // 内核侧发一个广播帧，看它是否到达对端
        let name1 = emu.intf(link.intf1())?.name().to_string();
        let mac1 = emu.intf_mac(link.intf1())?;
        let frame = Frame::ethernet(MacAddr::BROADCAST, mac1, 0x88b5, b"hello");
        m.inject(&name1, frame.into_bytes());
    }
    if args.ping {
        let out = emu.intf_cmd(link.intf1(), "ping -c 3 10.0.0.2")?;
        print!("{out}");
    }

    std::thread::sleep(Duration::from_millis(args.duration_ms));
    emu.stop()?;

    for intf in emu.registry().intfs() {
        println!(
            "intf={} installed={} in_ns={} mode={}",
            intf.name(),
            intf.is_installed(),
            intf.in_right_namespace(),
            intf.mode().map(|m| m.to_string()).unwrap_or_default()
        );
    }
    if let Some(m) = &memory {
        let name2 = emu.intf(link.intf2())?.name().to_string();
        println!("dry_run_delivered={}", m.take_sent(&name2).len());
    }
    let stats = emu.stats()?;
    println!("stats={}", serde_json::to_string(&stats)?);

    emu.clear()?;
    Ok(())
}
