use chrono::{NaiveDate, Utc};
use intentlog::model::{IntentStatus, from_local};
use uuid::Uuid;

use super::*;

const ID: &str = "a1b2c3d4-0000-4000-8000-000000000000";

fn tag(name: &str) -> Tag {
    Tag { id: Uuid::new_v4(), name: name.into(), color: "#6366f1".into(), tag_category_id: None, created_at: Utc::now() }
}

fn intent(h: u32, m: u32, duration: Option<u32>, tags: Vec<Tag>) -> Intent {
    let start = from_local(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap().and_hms_opt(h, m, 0).unwrap()).unwrap();
    Intent {
        id: ID.parse().unwrap(),
        title: "Deep work".into(),
        description: None,
        duration_minutes: duration,
        status: IntentStatus::InProgress,
        is_private: false,
        created_at: start,
        updated_at: start,
        tags,
    }
}

#[test]
fn short_id_is_first_block() {
    assert_eq!(short_id(ID.parse().unwrap()), "a1b2c3d4");
}

#[test]
fn intent_line_shows_time_duration_and_tags() {
    let line = intent_line(&intent(9, 30, Some(90), vec![tag("Focus"), tag("Deep")]));
    assert_eq!(line, "a1b2c3d4  09:30  in_progress  Deep work (1h 30m) #Focus #Deep");
}

#[test]
fn intent_line_open_ended_private() {
    let mut i = intent(14, 5, None, Vec::new());
    i.is_private = true;
    i.status = IntentStatus::Planned;
    assert_eq!(intent_line(&i), "a1b2c3d4  14:05  planned      Deep work [private]");
}

#[test]
fn detail_lists_fields() {
    let mut i = intent(9, 0, None, vec![tag("Focus")]);
    i.description = Some("chapter 3".into());
    let lines = intent_detail(&i);
    assert_eq!(lines[0], "Deep work");
    assert!(lines.contains(&"  duration  open-ended".to_string()));
    assert!(lines.contains(&"  tags      Focus".to_string()));
    assert!(lines.contains(&"  notes     chapter 3".to_string()));
    assert!(lines.contains(&"  start     2026-03-14 09:00".to_string()));
}

#[test]
fn filter_bar_follows_counts() {
    let focus = tag("Focus");
    let admin = tag("admin");
    let counts = TagCounts { all: 3, by_tag: vec![(admin.id, 1), (focus.id, 2)] };
    assert_eq!(filter_bar(&counts, &[focus, admin]), "All 3 · admin 1 · Focus 2");
}

#[test]
fn tag_line_names_group() {
    let group = TagCategory { id: Uuid::new_v4(), name: "Work".into(), icon: None, sort_order: 0 };
    let mut t = tag("Email");
    t.tag_category_id = Some(group.id);
    let line = tag_line(&t, 4, &[group]);
    assert!(line.ends_with("  4  [Work]"));
    assert!(line.contains("#6366f1  Email"));
}

#[test]
fn sections_have_headings() {
    let evening = intent(19, 0, None, Vec::new());
    let morning = intent(8, 0, None, Vec::new());
    let lines = day_sections(&[&evening, &morning]);
    assert_eq!(lines[0], "Evening");
    assert_eq!(lines[2], "Morning");
    assert!(lines[1].starts_with("  a1b2c3d4  19:00"));
}

#[test]
fn pulse_bar_scales_with_share() {
    let slices = vec![
        PulseSlice { name: "Focus".into(), color: "#6366f1".into(), minutes: 90, percent: 75.0 },
        PulseSlice { name: "Admin".into(), color: "#78716c".into(), minutes: 30, percent: 25.0 },
    ];
    let lines = pulse_lines(&slices);
    assert!(lines[0].starts_with("Focus"));
    assert!(lines[0].contains("1 hr 30 mins"));
    assert!(lines[0].contains("75.0%"));
    assert_eq!(lines[0].matches('█').count(), 18);
    assert_eq!(lines[1].matches('█').count(), 6);
}

#[test]
fn timer_line_countdown_and_stopwatch() {
    let i = intent(9, 0, Some(30), Vec::new());
    let view = TimerView { mode: TimerMode::Countdown, display: "15:00".into(), progress: 50.0, overdue: false };
    let line = timer_line(&i, &view);
    assert!(line.starts_with("Deep work  15:00  ["));
    assert_eq!(line.matches('█').count(), 10);

    let overdue = TimerView { mode: TimerMode::Countdown, display: "00:00".into(), progress: 100.0, overdue: true };
    assert!(timer_line(&i, &overdue).ends_with("overdue"));

    let open = TimerView { mode: TimerMode::Stopwatch, display: "1h 5m".into(), progress: 100.0, overdue: false };
    assert_eq!(timer_line(&i, &open), "Deep work  1h 5m  (open)");
}
