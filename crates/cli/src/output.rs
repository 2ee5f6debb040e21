use anyhow::{Context, Result};
use eaconsole_core::ConsoleView;

/// One-line header followed by the visible alerts.
pub fn render_view(view: &ConsoleView) -> String {
    let mut out = format!(
        "[{}] {}",
        view.connectivity,
        view.label.as_deref().unwrap_or("(no domain)")
    );
    if let Some(seq) = view.seq {
        out.push_str(&format!(" seq={seq}"));
    }
    if !view.alert_badge.is_empty() {
        out.push_str(&format!(" alerts={}", view.alert_badge));
    }

    if !view.tabs.is_empty() {
        let tabs: Vec<String> = view
            .tabs
            .iter()
            .enumerate()
            .map(|(index, tab)| {
                let marker = if view.active_tab == Some(index) { "*" } else { "" };
                let cases = match (tab.loaded, tab.case_count) {
                    (false, _) => "loading".to_string(),
                    (true, Some(count)) => count.to_string(),
                    (true, None) => "-".to_string(),
                };
                format!("{marker}{} ({cases})", tab.name)
            })
            .collect();
        out.push_str(" | ");
        out.push_str(&tabs.join("  "));
    }

    for alert in &view.alerts {
        out.push_str(&format!("\n  ! #{} {}", alert.id, alert.message));
    }
    out
}

pub fn print_view(view: &ConsoleView, json: bool) -> Result<()> {
    if json {
        let line = serde_json::to_string(view).context("Failed to serialize console view")?;
        println!("{line}");
    } else {
        println!("{}", render_view(view));
    }
    Ok(())
}
