//! Plain-text views for the terminal. Everything here returns strings so the
//! command handlers stay thin and the layout is testable.

use chrono::Timelike;
use intentlog::model::{Intent, Tag, TagCategory};
use intentlog::services::day::{self, PulseSlice};
use intentlog::services::duration::{format_duration, format_duration_short};
use intentlog::services::timer::{TimerMode, TimerView};
use intentlog::state::TagCounts;

#[cfg(test)]
#[path = "print_test.rs"]
mod tests;

/// Width of the pulse bar at 100%.
const PULSE_BAR_WIDTH: usize = 24;
const PROGRESS_BAR_WIDTH: usize = 20;

/// First block of the uuid, enough to pick an intent out of a day.
#[must_use]
pub fn short_id(id: uuid::Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// `a1b2c3d4  09:30  in_progress  Deep work (45m) #Focus`
#[must_use]
pub fn intent_line(intent: &Intent) -> String {
    let start = intent.local_start();
    let mut line = format!(
        "{}  {:02}:{:02}  {:<11}  {}",
        short_id(intent.id),
        start.hour(),
        start.minute(),
        intent.status.as_str(),
        intent.title
    );
    if let Some(minutes) = intent.duration_minutes.filter(|m| *m > 0) {
        line.push_str(&format!(" ({})", format_duration_short(minutes)));
    }
    for tag in &intent.tags {
        line.push_str(&format!(" #{}", tag.name));
    }
    if intent.is_private {
        line.push_str(" [private]");
    }
    line
}

#[must_use]
pub fn intent_detail(intent: &Intent) -> Vec<String> {
    let start = intent.local_start();
    let mut lines = vec![
        intent.title.clone(),
        format!("  id        {}", intent.id),
        format!("  status    {}", intent.status),
        format!("  start     {}", start.format("%Y-%m-%d %H:%M")),
    ];
    match intent.duration_minutes.filter(|m| *m > 0) {
        Some(minutes) => lines.push(format!("  duration  {}", format_duration(minutes))),
        None => lines.push("  duration  open-ended".to_string()),
    }
    if !intent.tags.is_empty() {
        let names: Vec<&str> = intent.tags.iter().map(|t| t.name.as_str()).collect();
        lines.push(format!("  tags      {}", names.join(", ")));
    }
    if let Some(description) = intent.description.as_deref().filter(|d| !d.trim().is_empty()) {
        lines.push(format!("  notes     {description}"));
    }
    if intent.is_private {
        lines.push("  private".to_string());
    }
    lines
}

/// `All 3 · admin 1 · Focus 2`
#[must_use]
pub fn filter_bar(counts: &TagCounts, tags: &[Tag]) -> String {
    let mut parts = vec![format!("All {}", counts.all)];
    for (id, count) in &counts.by_tag {
        if let Some(tag) = tags.iter().find(|t| t.id == *id) {
            parts.push(format!("{} {count}", tag.name));
        }
    }
    parts.join(" · ")
}

#[must_use]
pub fn tag_line(tag: &Tag, count: usize, groups: &[TagCategory]) -> String {
    let group = tag
        .tag_category_id
        .and_then(|id| groups.iter().find(|g| g.id == id))
        .map_or(String::new(), |g| format!("  [{}]", g.name));
    format!("{}  {}  {:<20} {count:>3}{group}", short_id(tag.id), tag.color, tag.name)
}

#[must_use]
pub fn group_line(group: &TagCategory, tags: &[Tag]) -> String {
    let members = tags.iter().filter(|t| t.tag_category_id == Some(group.id)).count();
    let icon = group.icon.as_deref().map_or(String::new(), |i| format!(" ({i})"));
    format!("{}  {:>2}  {}{icon}  {members} tags", short_id(group.id), group.sort_order, group.name)
}

/// The day's intents under Evening / Afternoon / Morning headings.
#[must_use]
pub fn day_sections(intents: &[&Intent]) -> Vec<String> {
    let mut lines = Vec::new();
    for (section, members) in day::sections(intents) {
        lines.push(section.label().to_string());
        lines.extend(members.iter().map(|i| format!("  {}", intent_line(i))));
    }
    lines
}

/// `Focus       2 hrs   66.7%  ████████████████`
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn pulse_lines(slices: &[PulseSlice]) -> Vec<String> {
    slices
        .iter()
        .map(|s| {
            let filled = ((s.percent / 100.0) * PULSE_BAR_WIDTH as f64).round() as usize;
            format!(
                "{:<14} {:>14} {:>5.1}%  {}",
                s.name,
                format_duration(s.minutes),
                s.percent,
                "█".repeat(filled.max(1))
            )
        })
        .collect()
}

/// `Deep work  12:34  [██████░░░░]` or `Reading  1h 5m  (open)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn timer_line(intent: &Intent, view: &TimerView) -> String {
    match view.mode {
        TimerMode::Stopwatch => format!("{}  {}  (open)", intent.title, view.display),
        TimerMode::Countdown => {
            let filled = ((view.progress / 100.0) * PROGRESS_BAR_WIDTH as f64).round() as usize;
            let filled = filled.min(PROGRESS_BAR_WIDTH);
            let bar = format!("{}{}", "█".repeat(filled), "░".repeat(PROGRESS_BAR_WIDTH - filled));
            let suffix = if view.overdue { "  overdue" } else { "" };
            format!("{}  {}  [{bar}]{suffix}", intent.title, view.display)
        }
    }
}
