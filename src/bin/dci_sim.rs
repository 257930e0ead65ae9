//! DCI 场景模拟
//!
//! 读取 JSON 场景，运行到结束（或 `--until-ms`），打印每条流的完成时间与汇总统计。

use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use dci_sim::config::ScenarioSpec;
use dci_sim::dci::RoutingMode;
use dci_sim::net::{NodeKind, SampleLinks};
use dci_sim::sim::{SimTime, Simulator};
use dci_sim::topo::Scenario;

#[derive(Debug, Parser)]
#[command(name = "dci_sim", about = "Congestion-aware DCI path selection simulator")]
struct Args {
    /// Path to scenario.json
    #[arg(long)]
    scenario: PathBuf,

    /// Run until this time (ms); defaults to running until completion
    #[arg(long)]
    until_ms: Option<u64>,

    /// Override the scenario's routing mode
    #[arg(long, value_enum)]
    mode: Option<RoutingMode>,

    /// Write the installed routing table as CSV (src_id,dst_id,next_hop_id)
    #[arg(long)]
    routing_table_csv: Option<PathBuf>,

    /// Write a JSON summary of stats and per-flow completion times
    #[arg(long)]
    summary_json: Option<PathBuf>,

    /// Print one line per flow with its completion time
    #[arg(long)]
    fct_stats: bool,

    /// Write periodic DCI egress samples as CSV (time_ns,node_id,peer_id,tx_bytes,queue_bytes)
    #[arg(long)]
    link_util_csv: Option<PathBuf>,

    /// Write per-port queue length distributions (1 KB buckets)
    #[arg(long)]
    qlen_dist: Option<PathBuf>,

    /// Port sampling interval (us)
    #[arg(long, default_value_t = 1_000)]
    monitor_interval_us: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
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
    let mut spec = ScenarioSpec::from_path(&args.scenario)?;
    if let Some(mode) = args.mode {
        spec.routing.mode = mode;
    }

    let mut scenario = Scenario::build(&spec)?;
    let mut sim = Simulator::default();
    scenario.schedule(&spec, &mut sim)?;
    if args.link_util_csv.is_some() || args.qlen_dist.is_some() {
        scenario
            .world
            .net
            .enable_link_monitor(SimTime::from_micros(args.monitor_interval_us));
        sim.schedule(SimTime::ZERO, SampleLinks);
    }

    if let Some(path) = &args.routing_table_csv {
        scenario
            .world
            .net
            .routes()
            .write_csv(BufWriter::new(File::create(path)?))?;
        eprintln!("wrote routing table to {}", path.display());
    }

    match args.until_ms {
        Some(ms) => sim.run_until(SimTime::from_millis(ms), &mut scenario.world),
        None => sim.run(&mut scenario.world),
    }

    let net = &scenario.world.net;
    let stats = &net.stats;
    if args.fct_stats {
        for (key, f) in &stats.flows {
            let fct_ms = f.fct().map(|t| t.as_millis_f64());
            println!(
                "flow_fct key={} src={} dst={} size_bytes={} delivered_bytes={} fct_ms={}",
                key,
                net.node_name(f.src),
                net.node_name(f.dst),
                f.size_bytes,
                f.delivered_bytes,
                fct_ms.map_or_else(|| "incomplete".to_string(), |v| format!("{v:.6}"))
            );
        }
    }
    println!(
        "summary now={} delivered_pkts={} delivered_bytes={} dropped_pkts={} no_route_drops={} link_down_drops={} queue_drops={} flows={} completed_flows={}",
        sim.now(),
        stats.delivered_pkts,
        stats.delivered_bytes,
        stats.dropped_pkts,
        stats.no_route_drops,
        stats.link_down_drops,
        stats.queue_drops,
        stats.flows.len(),
        stats.completed_flows()
    );

    if let Some(monitor) = net.link_monitor() {
        if let Some(path) = &args.link_util_csv {
            monitor.write_csv(BufWriter::new(File::create(path)?))?;
            eprintln!("wrote link samples to {}", path.display());
        }
        if let Some(path) = &args.qlen_dist {
            monitor.write_qlen(BufWriter::new(File::create(path)?))?;
            eprintln!("wrote queue length distribution to {}", path.display());
        }
    }

    if let Some(path) = &args.summary_json {
        let flows: Vec<serde_json::Value> = stats
            .flows
            .iter()
            .map(|(key, f)| {
                serde_json::json!({
                    "key": key,
                    "src": net.node_name(f.src),
                    "dst": net.node_name(f.dst),
                    "size_bytes": f.size_bytes,
                    "delivered_bytes": f.delivered_bytes,
                    "fct_ns": f.fct().map(|t| t.as_nanos()),
                })
            })
            .collect();
        let dci_ports: Vec<serde_json::Value> = net
            .egress_links()
            .filter(|l| net.topology().node(l.from).kind == NodeKind::DciSwitch)
            .map(|l| {
                serde_json::json!({
                    "node": net.node_name(l.from),
                    "peer": net.node_name(l.to),
                    "port": l.port.0,
                    "tx_bytes": l.tx_bytes,
                    "peak_queue_bytes": l.queue.peak_bytes(),
                })
            })
            .collect();
        let summary = serde_json::json!({
            "mode": spec.routing.mode,
            "now_ns": sim.now().as_nanos(),
            "delivered_pkts": stats.delivered_pkts,
            "dropped_pkts": stats.dropped_pkts,
            "no_route_drops": stats.no_route_drops,
            "link_down_drops": stats.link_down_drops,
            "queue_drops": stats.queue_drops,
            "flows": flows,
            "dci_ports": dci_ports,
        });
        serde_json::to_writer_pretty(BufWriter::new(File::create(path)?), &summary)?;
        eprintln!("wrote summary to {}", path.display());
    }
    Ok(())
}
