#[cfg(test)]
#[path = "ui_test.rs"]
mod tests;

use std::io;
use std::io::Write;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;
use crossterm::cursor;
use crossterm::terminal::Clear;
use crossterm::terminal::ClearType;
use crossterm::terminal::EnterAlternateScreen;
use crossterm::terminal::LeaveAlternateScreen;
use yansi::Paint;

use crate::domain::models::Monitor;
use crate::domain::models::MonitorsView;
use crate::domain::services::Sentinel;

fn render_monitor(monitor: &Monitor, now: DateTime<Utc>) -> Vec<String> {
    let status = if monitor.is_healthy {
        Paint::green(monitor.status_label()).bold()
    } else if monitor.is_degraded() {
        Paint::red(monitor.status_label()).bold()
    } else {
        Paint::yellow(monitor.status_label()).bold()
    };

    let mut lines = vec![
        format!("{status}  {}", Paint::new(&monitor.url).bold()),
        format!(
            "  status {} | {} | every {}s | checked {}",
            monitor.status_code_label(),
            monitor.response_time_label(),
            monitor.interval_seconds(),
            monitor.last_checked_label(now)
        ),
    ];

    if let Some(explanation) = &monitor.ai_explanation {
        lines.push(format!("  {}", Paint::magenta("AI analysis").bold()));
        for line in explanation.lines() {
            lines.push(format!("    {}", Paint::new(line).dimmed()));
        }
    }

    return lines;
}

/// Plain text dashboard for a monitor list, one card per monitor.
pub fn render(view: &MonitorsView, now: DateTime<Utc>) -> String {
    let mut lines = vec![format!(
        "{} ({} monitors)",
        Paint::new("SentinelAI").bold(),
        view.monitors.len()
    )];

    if let Some(error) = &view.error {
        lines.push(Paint::red(format!("! {error}")).to_string());
    }

    if view.loading {
        lines.push("Loading...".to_string());
        return lines.join("\n");
    }

    if view.monitors.is_empty() {
        lines.push("No monitors yet. Add one with `sentinel add --url <URL>`.".to_string());
        return lines.join("\n");
    }

    for monitor in &view.monitors {
        lines.push("".to_string());
        lines.extend(render_monitor(monitor, now));
    }

    return lines.join("\n");
}

fn draw(out: &mut impl Write, view: &MonitorsView) -> Result<()> {
    crossterm::execute!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
    writeln!(out, "{}", render(view, Utc::now()))?;
    writeln!(out, "\n{}", Paint::new("Press Ctrl+C to exit.").dimmed())?;
    out.flush()?;

    return Ok(());
}

pub fn destruct_terminal_for_panic() {
    let _ = crossterm::execute!(io::stdout(), LeaveAlternateScreen, cursor::Show);
}

async fn start_loop(out: &mut impl Write, sentinel: &Sentinel) -> Result<()> {
    let mut monitors = sentinel.monitors().subscribe();
    let mut session = sentinel.session().subscribe();

    loop {
        let view = monitors.borrow_and_update().clone();
        draw(out, &view)?;

        tokio::select! {
            res = monitors.changed() => {
                if res.is_err() {
                    return Ok(());
                }
            }
            res = session.changed() => {
                let authenticated = session.borrow_and_update().is_authenticated();
                if res.is_err() || !authenticated {
                    bail!("Your session has ended. Run `sentinel login` to sign in again.");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                return Ok(());
            }
        }
    }
}

/// Opens the dashboard and redraws on every refresh until Ctrl+C or until the
/// session ends.
pub async fn start(sentinel: &Sentinel, period: Duration) -> Result<()> {
    sentinel.open_dashboard(period)?;

    let mut stdout = io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let res = start_loop(&mut stdout, sentinel).await;
    sentinel.close_dashboard();

    crossterm::execute!(stdout, LeaveAlternateScreen, cursor::Show)?;
    return res;
}
