use std::fmt::Write as _;

use subtitle_core::{AppViewModel, EntryRowView, EntryStatus};

const NAME_WIDTH: usize = 36;

/// Plain-text table of the registry, one line per entry plus a status line.
pub(crate) fn render(view: &AppViewModel) -> String {
    let mut out = String::new();
    if !view.has_files {
        out.push_str("No files.\n");
        return out;
    }

    for row in &view.entries {
        let _ = writeln!(out, "{}", render_row(row));
    }
    let _ = writeln!(
        out,
        "Files: {} | Selected: {} | Idle: {} | Pending: {} | Converted: {} | Failed: {}",
        view.file_count,
        view.selected_count,
        view.idle_count,
        view.pending_count,
        view.success_count,
        view.error_count
    );
    out
}

fn render_row(row: &EntryRowView) -> String {
    let marker = if row.selected { '*' } else { ' ' };
    let detail = match row.status {
        EntryStatus::Success => row
            .converted_filename
            .as_deref()
            .map(|name| format!("-> {name}"))
            .unwrap_or_default(),
        EntryStatus::Error => row.error_message.clone().unwrap_or_default(),
        EntryStatus::Pending => row
            .progress
            .map(|p| format!("{p}%"))
            .unwrap_or_default(),
        EntryStatus::Idle => String::new(),
    };
    format!(
        "{marker}{:>4}  {:<7}  {:<width$}  {:>9}  {}",
        row.id,
        row.status.as_str(),
        truncate(&row.name, NAME_WIDTH),
        format_size(row.size),
        detail,
        width = NAME_WIDTH
    )
    .trim_end()
    .to_string()
}

fn truncate(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let mut cut: String = name.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KiB", "MiB", "GiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
