use chrono::NaiveDate;
use timeline::doc::BlockPatch;
use uuid::Uuid;

use super::*;

fn block(h: u32, m: u32, duration: Option<u32>) -> EventBlock {
    EventBlock {
        id: Uuid::new_v4(),
        title: "Standup".into(),
        color: None,
        start: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap().and_hms_opt(h, m, 0).unwrap(),
        duration_minutes: duration,
    }
}

fn committed(actions: &[Action]) -> Option<BlockPatch> {
    actions.iter().find_map(|a| match a {
        Action::IntentUpdated { patch, .. } => Some(*patch),
        _ => None,
    })
}

#[test]
fn drag_moves_start_later_and_earlier() {
    let b = block(10, 0, Some(30));
    let mut engine = engine_for(b.clone());
    let patch = committed(&drag_to(&mut engine, b.id, 14 * 60 + 15)).unwrap();
    assert_eq!(patch.start, Some(b.start.date().and_hms_opt(14, 15, 0).unwrap()));
    assert_eq!(patch.duration_minutes, None);

    let patch = committed(&drag_to(&mut engine, b.id, 8 * 60)).unwrap();
    assert_eq!(patch.start, Some(b.start.date().and_hms_opt(8, 0, 0).unwrap()));
}

#[test]
fn drag_snaps_to_five_minutes() {
    let b = block(10, 0, Some(30));
    let mut engine = engine_for(b.clone());
    let patch = committed(&drag_to(&mut engine, b.id, 11 * 60 + 8)).unwrap();
    assert_eq!(patch.start, Some(b.start.date().and_hms_opt(11, 10, 0).unwrap()));
}

#[test]
fn drag_stays_on_the_day() {
    let b = block(10, 0, Some(60));
    let mut engine = engine_for(b.clone());
    let patch = committed(&drag_to(&mut engine, b.id, 23 * 60 + 30)).unwrap();
    assert_eq!(patch.start, Some(b.start.date().and_hms_opt(23, 0, 0).unwrap()));
}

#[test]
fn drag_to_same_time_opens_detail() {
    let b = block(10, 0, Some(30));
    let mut engine = engine_for(b.clone());
    let actions = drag_to(&mut engine, b.id, 10 * 60);
    assert!(committed(&actions).is_none());
    assert!(actions.contains(&Action::OpenDetail { id: b.id }));
}

#[test]
fn unknown_block_does_nothing() {
    let mut engine = engine_for(block(10, 0, Some(30)));
    assert!(drag_to(&mut engine, Uuid::new_v4(), 600).is_empty());
}
