//! Foreground progress rendering from the worker's watch channel.

use tokio::sync::watch;
use trackdl_core::progress::ProgressSnapshot;

/// Prints a line whenever the snapshot changes; returns once the worker drops
/// its reporter.
pub(crate) async fn render(mut rx: watch::Receiver<ProgressSnapshot>) {
    let mut last = String::new();
    while rx.changed().await.is_ok() {
        let line = format_line(&rx.borrow_and_update());
        if !line.is_empty() && line != last {
            println!("{}", line);
            last = line;
        }
    }
}

pub(crate) fn format_line(snap: &ProgressSnapshot) -> String {
    let mut parts = Vec::new();
    if let Some(batch) = &snap.batch {
        let mut part = if batch.pass > 0 {
            format!("retry {} ", batch.pass)
        } else {
            String::new()
        };
        part.push_str(&format!("{}/{} ({:.0}%)", batch.completed, batch.total, batch.percent));
        if !batch.eta_label.is_empty() {
            part.push_str(&format!(" ETA {}", batch.eta_label));
        }
        parts.push(part);
    }
    if let Some(track) = &snap.track {
        let mut part = format!("{} {:.1}%", track.phase.as_str(), track.percent);
        if !track.speed_label.is_empty() {
            part.push_str(&format!(" {}", track.speed_label));
        }
        if !track.eta_label.is_empty() {
            part.push_str(&format!(" ETA {}", track.eta_label));
        }
        parts.push(part);
    }
    if let Some(status) = &snap.status {
        parts.push(status.clone());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("  {}", parts.join(" | "))
    }
}
