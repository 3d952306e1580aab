//! The reference load-generation client (§4.9), grounded in the original
//! `load_injector.c`: concurrent connections hammering a pre-deployed
//! function, reporting latency percentiles, throughput, and error counts.
//! Tokio tasks replace the original's `pthread`s; everything else —
//! per-connection request-then-read, a small inter-request delay, and a
//! final summary — carries over.

mod config;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use config::LoadgenConfig;
use faas_channel::{read_frame, write_frame};
use faas_common::config::ConfigLoader;
use faas_common::tracing_init;
use tokio::net::UnixStream;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Target {
    /// Through the Front Socket, same path a real caller would take.
    Front,
    /// Directly against the Dispatcher's admin/invoke socket, bypassing the
    /// Front Socket, mirroring the original's direct-to-LB test path.
    Lb,
}

#[derive(Parser, Debug)]
#[command(about = "Load generator for the dispatch fabric's Front Socket")]
struct Cli {
    /// Function id or name to invoke. Required unless --deploy-first is set.
    #[arg(long)]
    function: Option<String>,

    /// Number of concurrent connections (the original's thread count).
    #[arg(long, default_value_t = 10)]
    concurrency: usize,

    /// Requests sent by each concurrent connection.
    #[arg(long, default_value_t = 100)]
    requests_per_task: usize,

    /// Payload string sent with every invoke frame.
    #[arg(long, default_value = "")]
    payload: String,

    #[arg(long, value_enum, default_value_t = Target::Front)]
    target: Target,

    /// Deploy a trivial built-in echo function before running the load.
    #[arg(long)]
    deploy_first: bool,

    /// Printed and handled by the config loader; declared here too so clap
    /// doesn't reject it as an unrecognized flag.
    #[arg(long)]
    dump_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loader: ConfigLoader<LoadgenConfig> =
        ConfigLoader::new("config/loadgen.toml", "FAAS_LOADGEN_");
    let config = match loader.load_or_dump_config() {
        Some(config) => config,
        None => return Ok(()),
    };
    if std::env::args().any(|a| a == "--dump-config") {
        return Ok(());
    }

    tracing_init::init_tracing_with_default_env_filter(&config.tracing);

    let cli = Cli::parse();
    let socket_path: &Path = match cli.target {
        Target::Front => &config.front_socket_path,
        Target::Lb => &config.admin_socket_path,
    };

    let function_id = if cli.deploy_first {
        deploy_echo_function(&config.front_socket_path).await?
    } else {
        cli.function
            .clone()
            .ok_or_else(|| anyhow::anyhow!("--function is required unless --deploy-first is set"))?
    };

    println!("=== Load Generator ===");
    println!("Function: {function_id}");
    println!("Concurrency: {}", cli.concurrency);
    println!("Requests per task: {}", cli.requests_per_task);
    println!("Total requests: {}", cli.concurrency * cli.requests_per_task);
    println!("=======================\n");

    let report = run_load(
        socket_path,
        &function_id,
        &cli.payload,
        cli.concurrency,
        cli.requests_per_task,
    )
    .await;
    report.print();

    Ok(())
}

async fn deploy_echo_function(front_socket_path: &Path) -> anyhow::Result<String> {
    let mut stream = UnixStream::connect(front_socket_path).await?;
    let frame = serde_json::json!({
        "type": "deploy",
        "name": "loadgen-echo",
        "lang": "sh",
        "code": "cat",
    });
    write_frame(&mut stream, &frame).await?;
    let reply = read_frame(&mut stream)
        .await?
        .ok_or_else(|| anyhow::anyhow!("connection closed before a deploy reply arrived"))?;
    if reply["ok"].as_bool() != Some(true) {
        anyhow::bail!("deploy-first failed: {reply}");
    }
    let id = reply["id"]
        .as_str()
        .ok_or_else(|| anyhow::anyhow!("deploy reply missing id: {reply}"))?;
    println!("deployed built-in echo function as {id}");
    Ok(id.to_string())
}

#[derive(Default)]
struct TaskResult {
    latencies: Vec<Duration>,
    successes: usize,
    errors: usize,
}

struct Report {
    latencies: Vec<Duration>,
    successes: usize,
    errors: usize,
    elapsed: Duration,
}

impl Report {
    fn percentile(&self, p: f64) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    fn print(&self) {
        let total = self.successes + self.errors;
        let rps = if self.elapsed.as_secs_f64() > 0.0 {
            total as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        };

        println!("\n=== Results ===");
        println!("Total requests: {total}");
        if total > 0 {
            println!(
                "Successful: {} ({:.1}%)",
                self.successes,
                100.0 * self.successes as f64 / total as f64
            );
            println!(
                "Errors: {} ({:.1}%)",
                self.errors,
                100.0 * self.errors as f64 / total as f64
            );
        }
        println!("Elapsed time: {:.2}s", self.elapsed.as_secs_f64());
        println!("Requests/sec: {rps:.2}");
        println!("Latency p50: {:?}", self.percentile(0.50));
        println!("Latency p95: {:?}", self.percentile(0.95));
        println!("Latency p99: {:?}", self.percentile(0.99));
        println!("===============");
    }
}

async fn run_load(
    socket_path: &Path,
    function_id: &str,
    payload: &str,
    concurrency: usize,
    requests_per_task: usize,
) -> Report {
    let start = Instant::now();
    let mut handles = Vec::with_capacity(concurrency);

    for _task_id in 0..concurrency {
        let socket_path: PathBuf = socket_path.to_path_buf();
        let function_id = function_id.to_string();
        let payload = payload.to_string();

        handles.push(tokio::spawn(async move {
            let mut result = TaskResult::default();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                match send_invoke(&socket_path, &function_id, &payload).await {
                    Ok(true) => result.successes += 1,
                    Ok(false) | Err(_) => result.errors += 1,
                }
                result.latencies.push(req_start.elapsed());
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            result
        }));
    }

    let mut latencies = Vec::new();
    let mut successes = 0;
    let mut errors = 0;
    for handle in handles {
        match handle.await {
            Ok(result) => {
                latencies.extend(result.latencies);
                successes += result.successes;
                errors += result.errors;
            }
            Err(_) => errors += requests_per_task,
        }
    }

    Report {
        latencies,
        successes,
        errors,
        elapsed: start.elapsed(),
    }
}

async fn send_invoke(socket_path: &Path, function_id: &str, payload: &str) -> anyhow::Result<bool> {
    let mut stream = UnixStream::connect(socket_path).await?;
    let frame = serde_json::json!({
        "type": "invoke",
        "fn": function_id,
        "payload": payload,
    });
    write_frame(&mut stream, &frame).await?;
    let reply = read_frame(&mut stream)
        .await?
        .ok_or_else(|| anyhow::anyhow!("connection closed before a reply arrived"))?;
    Ok(reply["ok"].as_bool().unwrap_or(false))
}
