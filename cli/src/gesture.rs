//! Drive the timeline engine with a synthetic pointer drag so `move` snaps and
//! clamps exactly like a drag on screen.

use timeline::doc::{BlockId, EventBlock};
use timeline::engine::{Action, Engine};
use timeline::scale::Scale;

#[cfg(test)]
#[path = "gesture_test.rs"]
mod tests;

/// One pixel per minute keeps pointer deltas exact.
const SCALE: Scale = Scale::Zoom { px_per_minute: 1.0 };

/// Inside the body, just above the block's start edge.
const BODY_INSET_PX: f64 = 1.0;

/// An engine holding only `block`, on the block's own day.
#[must_use]
pub fn engine_for(block: EventBlock) -> Engine {
    let mut engine = Engine::new(block.start.date(), SCALE);
    engine.load_blocks(vec![block]);
    engine
}

/// Drag the block so it starts at `start_minute` of its day.
pub fn drag_to(engine: &mut Engine, id: BlockId, start_minute: i64) -> Vec<Action> {
    let Some((layout, block)) = find(engine, id) else {
        return Vec::new();
    };
    let from = block.start_minute(engine.day);
    let y = layout.bottom() - BODY_INSET_PX;
    gesture(engine, y, y - SCALE.minutes_to_px(minutes_f64(start_minute - from)))
}

fn find(engine: &Engine, id: BlockId) -> Option<(timeline::layout::BlockLayout, EventBlock)> {
    let layout = engine.layout().into_iter().find(|l| l.id == id)?;
    let block = engine.block(&id)?.clone();
    Some((layout, block))
}

fn gesture(engine: &mut Engine, from_y: f64, to_y: f64) -> Vec<Action> {
    let mut actions = engine.on_pointer_down(from_y);
    actions.extend(engine.on_pointer_move(to_y));
    actions.extend(engine.on_pointer_up(to_y));
    actions
}

#[allow(clippy::cast_precision_loss)]
fn minutes_f64(minutes: i64) -> f64 {
    minutes as f64
}
