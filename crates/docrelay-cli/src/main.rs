use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use docrelay_core::impls::{InMemoryPubSub, InMemoryWorkQueue};
use docrelay_core::{BridgeBuilder, BridgeConfig, ErrorBody, TaskId, WorkerConfig, WorkerGroup};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod demo;

/// Submit documents through an in-process queue/pub-sub bridge and print each result.
#[derive(Debug, Parser)]
#[command(name = "docrelay", version)]
struct Args {
    /// Documents to submit
    #[arg(required = true)]
    files: Vec<PathBuf>,

    #[arg(long, env = "DOCRELAY_QUEUE", default_value = docrelay_core::config::DEFAULT_QUEUE)]
    queue: String,

    #[arg(long, env = "DOCRELAY_RESULT_TOPIC", default_value = docrelay_core::config::DEFAULT_RESULT_TOPIC)]
    result_topic: String,

    /// Per-submission deadline in milliseconds
    #[arg(long, env = "DOCRELAY_SUBMIT_TIMEOUT_MS", default_value_t = 30_000)]
    submit_timeout_ms: u64,

    #[arg(long, env = "DOCRELAY_MAX_PAYLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_payload_bytes: usize,

    #[arg(long, env = "DOCRELAY_WORKERS", default_value_t = 2)]
    workers: usize,

    /// Artificial processing time of the demo worker
    #[arg(long, env = "DOCRELAY_WORKER_DELAY_MS", default_value_t = 0)]
    worker_delay_ms: u64,

    /// Start without workers (every submission times out)
    #[arg(long)]
    no_workers: bool,
}

impl Args {
    fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig::default()
            .with_queue_name(&self.queue)
            .with_result_topic(&self.result_topic)
            .with_submit_timeout(Duration::from_millis(self.submit_timeout_ms))
            .with_max_payload_bytes(self.max_payload_bytes)
    }
}

/// One output line per submitted file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    file: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.bridge_config();

    let queue = Arc::new(InMemoryWorkQueue::new());
    let pubsub = Arc::new(InMemoryPubSub::new());

    let bridge = BridgeBuilder::new(config.clone())
        .queue(queue.clone())
        .pubsub(pubsub.clone())
        .start()
        .await
        .context("failed to start bridge")?;

    let workers = (!args.no_workers).then(|| {
        WorkerGroup::spawn(
            WorkerConfig::matching(&config).with_concurrency(args.workers),
            queue.clone(),
            pubsub.clone(),
            Arc::new(demo::DemoProcessor {
                delay: Duration::from_millis(args.worker_delay_ms),
            }),
        )
    });

    let mut submits = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let document = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let gateway = bridge.gateway();
        let path = path.clone();
        submits.push(tokio::spawn(async move {
            (path, gateway.submit(document).await)
        }));
    }

    let mut failed = 0usize;
    let total = submits.len();
    let collect = async {
        for handle in submits {
            let (path, result) = handle.await.context("submission task panicked")?;
            let report = match result {
                Ok(submission) => Report {
                    file: path.display().to_string(),
                    success: true,
                    task_id: Some(submission.task_id),
                    result: Some(submission.result),
                    status: None,
                    error: None,
                },
                Err(err) => {
                    failed += 1;
                    warn!(file = %path.display(), error = %err, "submission failed");
                    Report {
                        file: path.display().to_string(),
                        success: false,
                        task_id: None,
                        result: None,
                        status: Some(err.status_code()),
                        error: Some(err.to_body()),
                    }
                }
            };
            let line = serde_json::to_string(&report)?;
            println!("{line}");
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::select! {
        res = collect => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }

    if let Some(workers) = workers {
        workers.shutdown_and_join().await;
    }
    info!(counts = ?bridge.registry_counts(), "final registry counts");
    bridge.shutdown().await;

    if failed > 0 {
        bail!("{failed} of {total} documents failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_map_onto_bridge_config() {
        let args = Args::try_parse_from([
            "docrelay",
            "--queue",
            "scans",
            "--submit-timeout-ms",
            "1500",
            "a.txt",
        ])
        .unwrap();
        let cfg = args.bridge_config();
        assert_eq!(cfg.queue_name, "scans");
        assert_eq!(cfg.result_topic, "ocr_results");
        assert_eq!(cfg.submit_timeout, Duration::from_millis(1500));
        assert_eq!(args.files, vec![PathBuf::from("a.txt")]);
    }

    #[test]
    fn at_least_one_file_is_required() {
        assert!(Args::try_parse_from(["docrelay"]).is_err());
    }
}
