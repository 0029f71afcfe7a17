use anyhow::{anyhow, ensure, Result};

use crate::model::{Timeline, TimelineEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimelineStats {
    pub events: usize,
    pub typed: usize,
    pub typo_chars: usize,
    pub erased: usize,
    pub total_wait_ms: u64,
}

pub fn stats(timeline: &Timeline) -> TimelineStats {
    let mut out = TimelineStats {
        events: timeline.events.len(),
        ..Default::default()
    };

    for e in &timeline.events {
        match e {
            TimelineEvent::Wait { ms } => {
                out.total_wait_ms = out.total_wait_ms.saturating_add(*ms);
            }
            TimelineEvent::Type { .. } => out.typed += 1,
            TimelineEvent::Typo { .. } => out.typo_chars += 1,
            TimelineEvent::Erase => out.erased += 1,
            TimelineEvent::Complete => {}
        }
    }

    out
}

/// Replay a timeline and return the text it leaves on screen.
///
/// Fails on timelines the engine cannot produce: out-of-order real chars,
/// erasing past the start, or events after completion.
pub fn simulate_text(timeline: &Timeline) -> Result<String> {
    let mut buf: Vec<char> = Vec::new();
    let mut next_index = 0usize;
    let mut complete = false;

    for (pos, event) in timeline.events.iter().enumerate() {
        ensure!(!complete, "event #{pos} follows completion");

        match event {
            TimelineEvent::Wait { .. } => {}
            TimelineEvent::Type { ch, index } => {
                ensure!(
                    *index == next_index,
                    "event #{pos} types index {index}, expected {next_index}"
                );
                buf.push(*ch);
                next_index += 1;
            }
            TimelineEvent::Typo { ch } => buf.push(*ch),
            TimelineEvent::Erase => {
                buf.pop()
                    .ok_or_else(|| anyhow!("event #{pos} erases an empty buffer"))?;
            }
            TimelineEvent::Complete => complete = true,
        }
    }

    Ok(buf.into_iter().collect())
}
