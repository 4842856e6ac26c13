//! Headless waveform host.
//!
//! Loads settings, starts the engine, and stands in for a render host: every
//! published snapshot is either summarised in the log or, with `--json`,
//! written to stdout as one JSON line.
//!
//! ```text
//! waveform [--settings <path>] [--seconds <n>] [--json]
//! ```

mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use settings::{load_settings, resolve_settings_path, save_settings};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use waveform_core::{BufferSnapshot, EngineStatus, EngineStatusEvent, WaveformEngine};

#[derive(Debug, Default)]
struct CliArgs {
    settings_path: Option<PathBuf>,
    run_for: Option<Duration>,
    json: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => {
                let path = args.next().context("--settings needs a path")?;
                out.settings_path = Some(PathBuf::from(path));
            }
            "--seconds" => {
                let raw = args.next().context("--seconds needs a value")?;
                let secs: f64 = raw
                    .parse()
                    .with_context(|| format!("invalid --seconds value {raw:?}"))?;
                if !secs.is_finite() || secs <= 0.0 {
                    bail!("--seconds must be positive (got {raw})");
                }
                out.run_for = Some(Duration::from_secs_f64(secs));
            }
            "--json" => out.json = true,
            other => bail!("unknown argument {other:?}"),
        }
    }
    Ok(out)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "waveform=info,waveform_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;

    let settings_path = resolve_settings_path(args.settings_path);
    let app_settings = load_or_create_settings(&settings_path);
    info!(
        settings_path = ?settings_path,
        sample_rate = app_settings.sample_rate,
        chunk_length = app_settings.chunk_length,
        display_seconds = app_settings.display_seconds,
        duration_seconds = app_settings.duration_seconds,
        seeded = app_settings.noise_seed.is_some(),
        "runtime settings loaded"
    );

    // ── Engine setup ──────────────────────────────────────────────────────
    let engine = Arc::new(
        WaveformEngine::configure(app_settings.engine_config())
            .context("engine configuration rejected")?,
    );

    let snapshot_task = tokio::spawn(forward_snapshots(
        engine.subscribe_snapshots(),
        app_settings.log_every_ticks,
        args.json,
    ));
    let status_task = tokio::spawn(forward_status(engine.subscribe_status()));

    engine.start().await.context("engine failed to start")?;
    if let Some(period) = engine.read_interval() {
        info!(period_ms = period.as_millis() as u64, "streaming");
    }

    // ── Run until told to stop ────────────────────────────────────────────
    match args.run_for {
        Some(limit) => {
            tokio::select! {
                _ = tokio::time::sleep(limit) => info!("run duration elapsed"),
                res = tokio::signal::ctrl_c() => {
                    res.context("listening for ctrl-c")?;
                    info!("interrupted");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("listening for ctrl-c")?;
            info!("interrupted");
        }
    }

    engine.stop()?;
    let diag = engine.diagnostics_snapshot();
    info!(
        ticks = diag.ticks,
        samples_ingested = diag.samples_ingested,
        tick_errors = diag.tick_errors,
        chunks_discarded = diag.chunks_discarded,
        "waveform stopped"
    );

    drop(engine);
    // Both forwarders end once the engine's senders are gone.
    let _ = tokio::time::timeout(Duration::from_secs(1), async {
        let _ = snapshot_task.await;
        let _ = status_task.await;
    })
    .await;
    Ok(())
}

/// A missing settings file is written back with defaults so it can be edited.
fn load_or_create_settings(path: &Path) -> settings::AppSettings {
    let settings = load_settings(path);
    if !path.exists() {
        match save_settings(path, &settings) {
            Ok(()) => info!(settings_path = ?path, "wrote default settings"),
            Err(e) => warn!(settings_path = ?path, "could not write default settings: {e}"),
        }
    }
    settings
}

async fn forward_snapshots(
    mut rx: broadcast::Receiver<BufferSnapshot>,
    log_every: u64,
    json: bool,
) {
    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                if json {
                    match serde_json::to_string(&snapshot) {
                        Ok(line) => println!("{line}"),
                        Err(e) => warn!("serialize snapshot: {e}"),
                    }
                }
                if snapshot.seq % log_every == 0 {
                    info!(
                        seq = snapshot.seq,
                        write_index = snapshot.write_index,
                        y_min = snapshot.y_min,
                        y_max = snapshot.y_max,
                        "display window"
                    );
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!("snapshot receiver lagged by {n} events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn forward_status(mut rx: broadcast::Receiver<EngineStatusEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => match (event.status, event.detail) {
                (EngineStatus::Error, detail) => {
                    warn!(detail = detail.as_deref().unwrap_or(""), "engine error")
                }
                (status, Some(detail)) => warn!(?status, %detail, "engine health"),
                (status, None) => info!(?status, "engine status"),
            },
            Err(RecvError::Lagged(n)) => {
                warn!("status receiver lagged by {n} events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> anyhow::Result<CliArgs> {
        parse_args(raw.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_all_flags() {
        let parsed = args(&["--settings", "/tmp/w.json", "--seconds", "2.5", "--json"]).unwrap();
        assert_eq!(parsed.settings_path, Some(PathBuf::from("/tmp/w.json")));
        assert_eq!(parsed.run_for, Some(Duration::from_millis(2500)));
        assert!(parsed.json);
    }

    #[test]
    fn no_flags_runs_until_interrupted() {
        let parsed = args(&[]).unwrap();
        assert!(parsed.settings_path.is_none());
        assert!(parsed.run_for.is_none());
        assert!(!parsed.json);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&["--seconds"]).is_err());
        assert!(args(&["--seconds", "soon"]).is_err());
        assert!(args(&["--seconds", "-1"]).is_err());
        assert!(args(&["--verbose"]).is_err());
    }
}
