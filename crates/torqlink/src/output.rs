use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use torqlink_client::{ClientState, Event};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    timestamp: String,
    #[serde(flatten)]
    event: &'a Event,
}

pub fn print_event(event: &Event, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                timestamp: now_unix_seconds(),
                event,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "DETAIL"])
                .add_row(vec![event.name().to_string(), event_detail(event)]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} {}", event.name(), event_detail(event));
        }
    }
}

pub fn print_state(state: &ClientState, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(state).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"])
                .add_row(vec![
                    "connected".to_string(),
                    state.connection.connected.to_string(),
                ])
                .add_row(vec![
                    "link_ready".to_string(),
                    state.connection.link_ready.to_string(),
                ])
                .add_row(vec![
                    "revision".to_string(),
                    state.protocol.revision.to_string(),
                ])
                .add_row(vec![
                    "controller_ready".to_string(),
                    state.controller.ready.to_string(),
                ])
                .add_row(vec![
                    "tool_enabled".to_string(),
                    state.tool.enabled.to_string(),
                ])
                .add_row(vec![
                    "spindles".to_string(),
                    state.tool.spindle_count.to_string(),
                ])
                .add_row(vec!["vin".to_string(), state.product.vin.clone()])
                .add_row(vec![
                    "job".to_string(),
                    state
                        .job
                        .job_id
                        .map_or_else(|| "-".to_string(), |id| id.to_string()),
                ])
                .add_row(vec![
                    "batch".to_string(),
                    format!(
                        "{}/{}",
                        state.batch.counter,
                        state
                            .batch
                            .size
                            .map_or_else(|| "-".to_string(), |s| s.to_string())
                    ),
                ]);
            println!("{table}");
        }
    }
}

fn event_detail(event: &Event) -> String {
    match event {
        Event::Reconnecting { attempt, delay_ms } => {
            format!("attempt={attempt} delay={delay_ms}ms")
        }
        Event::LinkEstablished { revision } => format!("revision={revision}"),
        Event::SpindleResult { result } => format!(
            "spindle={} torque={:.2} angle={:.0} ok={}",
            result.spindle, result.torque, result.angle, result.ok
        ),
        Event::TighteningCycleCompleted {
            results,
            overall_ok,
            duration_ms,
        } => format!(
            "spindles={} ok={overall_ok} duration={duration_ms}ms",
            results.len()
        ),
        Event::TighteningIncomplete {
            expected, received, ..
        } => format!("expected={expected} received={received}"),
        Event::CommandError {
            failed_mid,
            error_code,
            message,
        } => format!("mid={failed_mid:04} code={error_code} {message}"),
        Event::Alarm { alarm } => format!("{} {}", alarm.code, alarm.message),
        Event::BatchProgress { counter, size } => format!("{counter}/{size}"),
        Event::SpindleCountUpdated { count, source } => {
            format!("count={count} source={source:?}")
        }
        Event::VinLocked { vin } | Event::VinRequired { vin } => format!("vin={vin}"),
        Event::FrameError { defect } => format!("{:?}", defect.kind),
        Event::ParseError { mid, detail } => format!("mid={mid:04} {detail}"),
        Event::Error { detail } => detail.clone(),
        _ => String::new(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
