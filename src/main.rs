use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use daybook::engine::{Engine, EngineConfig};
use daybook::grid::{self, TimeSlot};
use daybook::model::{DayStatus, SlotAvailability};
use daybook::notify::NotifyHub;
use daybook::snapshot::Snapshot;

const USAGE: &str = "usage: daybook <YYYY-MM-DD> [start time, e.g. 10:00 AM]";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeSpan {
    start: String,
    end: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EndTime {
    slot: TimeSlot,
    duration: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DayReport {
    date: NaiveDate,
    status: DayStatus,
    slots: Vec<SlotAvailability>,
    free_spans: Vec<FreeSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_times: Option<Vec<EndTime>>,
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the report; logs go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let metrics = daybook::observability::init(env_flag("DAYBOOK_METRICS"));
    let snapshot_path = std::env::var("DAYBOOK_SNAPSHOT").unwrap_or_else(|_| "./calendar.json".into());
    let config = EngineConfig {
        auto_confirm: env_flag("DAYBOOK_AUTO_CONFIRM"),
    };

    let mut args = std::env::args().skip(1);
    let date: NaiveDate = args.next().ok_or(USAGE)?.parse()?;
    let start_label = args.collect::<Vec<_>>().join(" ");

    let snapshot = if Path::new(&snapshot_path).exists() {
        Snapshot::load(&snapshot_path)?
    } else {
        warn!("snapshot {snapshot_path} not found, starting with an empty calendar");
        Snapshot::default()
    };
    info!("  snapshot: {snapshot_path}");
    info!("  auto_confirm: {}", config.auto_confirm);
    info!(
        "  loaded: {} reservations, {} blackouts, {} skipped",
        snapshot.reservations.len(),
        snapshot.blackouts.len(),
        snapshot.skipped
    );

    let engine = Engine::new(config, Arc::new(NotifyHub::new()));
    for blackout in snapshot.blackouts {
        let id = blackout.id;
        if let Err(e) = engine.import_blackout(blackout).await {
            warn!("blackout {id} not imported: {e}");
        }
    }
    for reservation in snapshot.reservations {
        let id = reservation.id;
        if let Err(e) = engine.import_reservation(reservation).await {
            warn!("reservation {id} not imported: {e}");
        }
    }

    let end_times = if start_label.is_empty() {
        None
    } else {
        let Some(start) = grid::parse_label(&start_label) else {
            return Err(format!("unrecognised start time {start_label:?}; {USAGE}").into());
        };
        let start = TimeSlot::from_minute(start);
        let ends = engine
            .candidate_end_times(date, start)
            .await
            .into_iter()
            .map(|slot| EndTime {
                slot,
                duration: grid::duration_between(start.minute(), slot.minute()),
            })
            .collect();
        Some(ends)
    };

    let report = DayReport {
        date,
        status: engine.day_status(date).await,
        slots: engine.slot_grid(date).await,
        free_spans: engine
            .free_spans(date)
            .await
            .into_iter()
            .map(|s| FreeSpan {
                start: grid::format_label(s.start),
                end: grid::format_label(s.end),
            })
            .collect(),
        end_times,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(handle) = metrics {
        eprintln!("{}", handle.render());
    }
    Ok(())
}
