use std::collections::BTreeMap;

use crate::machine::effective_typos;
use crate::model::{Timeline, TimelineEvent, TypingConfig, TypoSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Typing,
    Typo,
    Erasing,
}

/// Turns a stream of timeline events into one console line per phase.
///
/// Lines are produced when a phase *starts*, so they can be printed before the
/// chars they describe appear. The config supplies the lookahead: a typing run
/// lasts until the next typo offset, and each typo's wrong text is known.
#[derive(Debug, Clone)]
pub struct PhaseTracer {
    text: Vec<char>,
    typos: BTreeMap<usize, TypoSpec>,
    phase: Phase,
    cursor: usize,
}

impl PhaseTracer {
    pub fn new(cfg: &TypingConfig) -> Self {
        Self {
            text: cfg.text.chars().collect(),
            typos: effective_typos(cfg)
                .into_iter()
                .map(|t| (t.at, t.clone()))
                .collect(),
            phase: Phase::Idle,
            cursor: 0,
        }
    }

    pub fn observe(&mut self, event: &TimelineEvent) -> Option<String> {
        let mut typed_at = None;
        let phase = match event {
            TimelineEvent::Wait { .. } | TimelineEvent::Complete => return None,
            TimelineEvent::Type { index, .. } => {
                self.cursor = index.saturating_add(1);
                typed_at = Some(*index);
                Phase::Typing
            }
            TimelineEvent::Typo { .. } => Phase::Typo,
            TimelineEvent::Erase => Phase::Erasing,
        };

        if phase == self.phase {
            return None;
        }
        self.phase = phase;

        match phase {
            Phase::Typing => typed_at.and_then(|from| self.typing_line(from)),
            Phase::Typo => Some(self.typo_line()),
            Phase::Erasing => Some(self.erase_line()),
            Phase::Idle => None,
        }
    }

    /// `None` when `from` lies outside the text.
    fn typing_line(&self, from: usize) -> Option<String> {
        if from >= self.text.len() {
            return None;
        }
        let end = self
            .typos
            .range(from + 1..)
            .next()
            .map(|(at, _)| *at)
            .unwrap_or(self.text.len());
        let run: String = self.text[from..end].iter().collect();
        Some(format!("Typing \"{}\"...", escape_for_log(&run)))
    }

    fn typo_line(&self) -> String {
        match self.typos.get(&self.cursor) {
            Some(t) => format!(
                "Typo \"{}\" (pause {}ms)...",
                escape_for_log(&t.wrong),
                t.pause_or_default()
            ),
            None => "Typo...".to_string(),
        }
    }

    fn erase_line(&self) -> String {
        match self.typos.get(&self.cursor) {
            Some(t) => format!("Erase \"{}\"...", escape_for_log(&t.wrong)),
            None => "Erase...".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub event_index: usize,
    pub line: String,
}

/// Precompute console trace lines for a recorded timeline.
pub fn timeline_console_trace(timeline: &Timeline) -> Vec<TraceEvent> {
    let mut tracer = PhaseTracer::new(&timeline.config);
    timeline
        .events
        .iter()
        .enumerate()
        .filter_map(|(event_index, event)| {
            tracer
                .observe(event)
                .map(|line| TraceEvent { event_index, line })
        })
        .collect()
}

fn escape_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}
