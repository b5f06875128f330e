use crate::models::{Event, StopReason};

/// Console line printed for every alert in headless mode.
pub fn format_alert(intensity: f64) -> String {
    format!("Sound detected: {}", intensity.trunc() as i64)
}

/// Format the event log as a table.
pub fn format_events_table(events: &[Event]) -> String {
    let separator = "\u{2500}".repeat(34);
    let mut output = String::new();

    output.push_str(&format!("{:<5} {:<19} {:>8}\n", "#", "Date", "Level"));
    output.push_str(&separator);
    output.push('\n');

    for (i, event) in events.iter().enumerate() {
        output.push_str(&format!(
            "{:<5} {:<19} {:>8}\n",
            i + 1,
            event.date,
            event.intensity
        ));
    }

    output.push_str(&separator);
    output.push('\n');

    let peak = events.iter().map(|e| e.intensity).max();
    output.push_str(&format!("Number of events:  {}", events.len()));
    if let Some(peak) = peak {
        output.push_str(&format!("\nLoudest event:     {}", peak));
    }

    output
}

/// Format the event log as pretty-printed JSON, same layout as the file.
pub fn format_events_json(events: &[Event]) -> String {
    serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".to_string())
}

/// One-line run summary for headless mode.
pub fn format_summary(ticks: usize, alerts: usize, failed_writes: usize, reason: &StopReason) -> String {
    let why = match reason {
        StopReason::Requested => "stopped".to_string(),
        StopReason::SourceExhausted => "end of input".to_string(),
        StopReason::SourceFailed(message) => format!("source failed: {}", message),
    };
    let mut line = format!("Done: {} ticks, {} alerts ({})", ticks, alerts, why);
    if failed_writes > 0 {
        line.push_str(&format!(", {} events not saved", failed_writes));
    }
    line
}
