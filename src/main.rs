use anyhow::{Context, Result};
use casedash::config::DashboardConfig;
use casedash::controller::SelectionEvent;
use casedash::dashboard::Dashboard;
use casedash::logging::{log, obj, v_str, Domain, Level};
use casedash::sinks::ViewSinks;
use serde_json::json;
use std::io::{self, BufRead, Write};

/// One JSON line per sink write, the payload a chart front end would draw.
fn print_views(sinks: &ViewSinks) {
    let line = json!({
        "status": "updated",
        "generation": sinks.generation(),
        "selection": sinks.selection(),
        "time_series": sinks.time_series(),
        "proportions": sinks.proportions(),
        "ranking": sinks.ranking(),
    });
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let _ = writeln!(out, "{}", line);
    let _ = out.flush();
}

fn main() -> Result<()> {
    let cfg = DashboardConfig::from_env();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("data_path", v_str(&cfg.data_path)),
            ("preferred_region", v_str(&cfg.preferred_region)),
            ("aggregate_region", v_str(&cfg.aggregate_region)),
        ]),
    );

    let dashboard = Dashboard::open(cfg.clone())
        .with_context(|| format!("loading dataset {}", cfg.data_path))?;
    let mut session = dashboard.open_session().context("no default selection")?;
    session.subscribe(Box::new(print_views));
    let outcome = session.initial_pass();
    if let Some(report) = session.outcome_report(outcome) {
        println!("{}", report);
    }

    // The host UI feeds selection changes, one per line.
    for line in io::stdin().lock().lines() {
        let line = line.context("reading selection events")?;
        if line.trim().is_empty() {
            continue;
        }
        let event: SelectionEvent = match line.parse() {
            Ok(ev) => ev,
            Err(err) => {
                println!("{}", json!({"status": "error", "error": err}));
                continue;
            }
        };
        match session.dispatch(event) {
            Ok(outcome) => {
                if let Some(report) = session.outcome_report(outcome) {
                    println!("{}", report);
                }
            }
            Err(err) => println!("{}", json!({"status": "error", "error": err.to_string()})),
        }
    }

    log(
        Level::Info,
        Domain::System,
        "shutdown",
        obj(&[("session", json!(session.session_id()))]),
    );
    Ok(())
}
