//! scowl_replay - run a detection script through the alert state machine.
//!
//! Each script line is one frame. Its `at_ms` is the frame timestamp; lines
//! without one are placed `--step-ms` after the previous frame. One JSON object
//! per frame is printed to stdout:
//!
//! ```text
//! {"at_ms":3100,"faces":1,"alerting":["100-100"],"alerts":[{"entity":"100-100","score":0.5,"persist_until":6200,"alarm":true}]}
//! ```

use anyhow::{anyhow, Result};
use clap::Parser;
use serde_json::json;
use std::io::{self, Write};
use std::path::PathBuf;

use scowl_watch::detect::backends::load_script;
use scowl_watch::track::{AlertPolicy, DEFAULT_STALE_ENTRY_TTL_MS};
use scowl_watch::{Alarm, EntityTracker, Millis, DEFAULT_ALARM_CLIP_MS};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Replay recorded face detections and print the alert timeline"
)]
struct Args {
    /// Detection script (JSON Lines).
    script: PathBuf,

    /// Expression label to watch.
    #[arg(long, env = "SCOWL_EXPRESSION", default_value = "angry")]
    expression: String,

    /// Scores strictly above this are elevated.
    #[arg(long, env = "SCOWL_SCORE_THRESHOLD", default_value = "0.3")]
    threshold: f32,

    /// Continuous elevation needed before alerting.
    #[arg(long, env = "SCOWL_DURATION_MS", default_value = "3000")]
    duration_ms: Millis,

    /// How long an alert stays active.
    #[arg(long, env = "SCOWL_COOLDOWN_MS", default_value = "3100")]
    cooldown_ms: Millis,

    /// Forget faces unseen for this long (0 keeps them).
    #[arg(long, default_value_t = DEFAULT_STALE_ENTRY_TTL_MS)]
    stale_ttl_ms: Millis,

    /// Frame spacing for script lines without `at_ms`.
    #[arg(long, default_value = "100")]
    step_ms: Millis,
}

/// Timestamp of script frame `idx`: its own `at_ms`, or `step_ms` after the
/// previous frame.
fn frame_time(
    idx: usize,
    at: Option<Millis>,
    prev: Option<Millis>,
    step_ms: Millis,
) -> Result<Millis> {
    match (at, prev) {
        (Some(at), Some(prev)) if at < prev => Err(anyhow!(
            "script frame {} goes back in time ({} < {})",
            idx + 1,
            at,
            prev
        )),
        (Some(at), _) => Ok(at),
        (None, Some(prev)) => Ok(prev.saturating_add(step_ms)),
        (None, None) => Ok(0),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let policy = AlertPolicy {
        expression: args.expression.trim().to_lowercase(),
        score_threshold: args.threshold,
        duration_limit_ms: args.duration_ms,
        cooldown_ms: args.cooldown_ms,
    };
    policy.validate()?;

    let steps = load_script(&args.script)?;
    let ttl = (args.stale_ttl_ms > 0).then_some(args.stale_ttl_ms);
    let mut tracker = EntityTracker::new(policy).with_stale_ttl(ttl);
    let mut alarm = Alarm::new(Box::new(scowl_watch::SilentSink), DEFAULT_ALARM_CLIP_MS);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut now: Option<Millis> = None;

    for (idx, step) in steps.into_iter().enumerate() {
        let at = frame_time(idx, step.at_ms, now, args.step_ms)?;
        now = Some(at);

        if let Some(error) = &step.error {
            writeln!(out, "{}", json!({ "at_ms": at, "error": error }))?;
            continue;
        }

        let faces = step.faces.len();
        let mut alerts = Vec::new();
        let entities = tracker.update(step.faces, at, |event| {
            let sounded = alarm.trigger(event.at).is_some();
            alerts.push(json!({
                "entity": event.key.as_str(),
                "score": event.score,
                "persist_until": event.persist_until,
                "alarm": sounded,
            }));
        });
        let alerting: Vec<&str> = entities
            .iter()
            .filter(|e| e.is_alerting)
            .map(|e| e.key.as_str())
            .collect();

        writeln!(
            out,
            "{}",
            json!({
                "at_ms": at,
                "faces": faces,
                "alerting": alerting,
                "alerts": alerts,
            })
        )?;
    }

    let stats = tracker.stats();
    log::info!(
        "replayed {} frames: alerts={} rejected={} alarms={}",
        stats.updates,
        stats.alerts_fired,
        stats.rejected_detections,
        alarm.plays()
    );
    Ok(())
}
