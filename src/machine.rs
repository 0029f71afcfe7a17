//! The typing state machine.
//!
//! [`TypingMachine`] owns the visible buffer and advances it by exactly one
//! mutation per [`TypingMachine::step`]. It knows nothing about timers: each
//! step reports the delay the caller should wait before the next one.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use tracing::{debug, warn};

use crate::jitter::{correct_delay_ms, normal_delay_ms, typo_delay_ms};
use crate::model::{TypingConfig, TypoSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    TypingTypo { typo: usize, progress: usize },
    PausingAfterTypo { typo: usize },
    Correcting { typo: usize, progress: usize },
}

/// The single mutation performed by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// A char of the real text was appended.
    Typed { ch: char, index: usize },
    /// A char of a typo's wrong text was appended.
    TypoTyped { ch: char },
    /// The trailing char was removed while correcting a typo.
    Erased { ch: char },
    /// End of text reached. Terminal.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub effect: Effect,
    /// `None` only for [`Effect::Completed`].
    pub next_delay_ms: Option<u64>,
}

#[derive(Debug, Clone)]
struct ArmedTypo {
    at: usize,
    wrong: Vec<char>,
    pause_ms: u64,
}

/// Typos that will fire for `cfg`, in config order.
///
/// Entries outside the text or with an empty wrong text are dropped, and for a
/// repeated offset only the first entry is kept.
pub fn effective_typos(cfg: &TypingConfig) -> Vec<&TypoSpec> {
    let len = cfg.text.chars().count();
    let mut seen = BTreeSet::new();
    cfg.typos
        .iter()
        .filter(|spec| spec.at < len && !spec.wrong.is_empty())
        .filter(|spec| seen.insert(spec.at))
        .collect()
}

#[derive(Debug, Clone)]
pub struct TypingMachine {
    text: Vec<char>,
    speed_ms: u64,
    jitter_ratio: f64,
    typos: Vec<ArmedTypo>,
    typo_by_index: BTreeMap<usize, usize>,
    triggered: BTreeSet<usize>,
    committed: String,
    cursor: usize,
    mode: Mode,
    complete: bool,
}

impl TypingMachine {
    /// Build a machine for `cfg`. See [`effective_typos`] for which typos fire.
    pub fn new(cfg: &TypingConfig) -> Self {
        let text: Vec<char> = cfg.text.chars().collect();
        let effective = effective_typos(cfg);
        if effective.len() < cfg.typos.len() {
            warn!(
                ignored = cfg.typos.len() - effective.len(),
                len = text.len(),
                "ignoring out-of-range, empty or duplicate typos"
            );
        }

        let mut typos = Vec::with_capacity(effective.len());
        let mut typo_by_index = BTreeMap::new();
        for spec in effective {
            typo_by_index.insert(spec.at, typos.len());
            typos.push(ArmedTypo {
                at: spec.at,
                wrong: spec.wrong.chars().collect(),
                pause_ms: spec.pause_or_default(),
            });
        }

        Self {
            text,
            speed_ms: cfg.speed_ms,
            jitter_ratio: cfg.jitter_ratio,
            typos,
            typo_by_index,
            triggered: BTreeSet::new(),
            committed: String::new(),
            cursor: 0,
            mode: Mode::Normal,
            complete: false,
        }
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Position inside the active typo's wrong text, if one is being typed or erased.
    pub fn typo_progress(&self) -> Option<usize> {
        match self.mode {
            Mode::TypingTypo { progress, .. } | Mode::Correcting { progress, .. } => {
                Some(progress)
            }
            Mode::Normal | Mode::PausingAfterTypo { .. } => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    /// Number of typos that will actually fire during this run.
    pub fn armed_typos(&self) -> usize {
        self.typos.len()
    }

    /// Advance by one tick. Returns `None` once the run is complete.
    pub fn step(&mut self, rng: &mut impl Rng) -> Option<Step> {
        if self.complete {
            return None;
        }

        let step = match self.mode {
            Mode::Normal => self.step_normal(rng),
            Mode::TypingTypo { typo, progress } => self.step_typo(typo, progress),
            Mode::PausingAfterTypo { typo } => {
                debug!(at = self.typos[typo].at, "pause over, correcting typo");
                self.step_correct(typo, 0)
            }
            Mode::Correcting { typo, progress } => self.step_correct(typo, progress),
        };
        Some(step)
    }

    fn pending_typo_at(&self, index: usize) -> Option<usize> {
        if self.triggered.contains(&index) {
            return None;
        }
        self.typo_by_index.get(&index).copied()
    }

    fn step_normal(&mut self, rng: &mut impl Rng) -> Step {
        if let Some(typo) = self.pending_typo_at(self.cursor) {
            debug!(at = self.cursor, "typo triggered");
            return self.step_typo(typo, 0);
        }

        let Some(&ch) = self.text.get(self.cursor) else {
            debug!(len = self.text.len(), "typing complete");
            self.complete = true;
            return Step {
                effect: Effect::Completed,
                next_delay_ms: None,
            };
        };

        let index = self.cursor;
        self.committed.push(ch);
        self.cursor += 1;
        Step {
            effect: Effect::Typed { ch, index },
            next_delay_ms: Some(normal_delay_ms(self.speed_ms, self.jitter_ratio, rng)),
        }
    }

    fn step_typo(&mut self, typo: usize, progress: usize) -> Step {
        let armed = &self.typos[typo];
        let ch = armed.wrong[progress];
        let progress = progress + 1;
        self.committed.push(ch);

        let next_delay_ms = if progress < armed.wrong.len() {
            self.mode = Mode::TypingTypo { typo, progress };
            typo_delay_ms(self.speed_ms)
        } else {
            self.mode = Mode::PausingAfterTypo { typo };
            armed.pause_ms
        };

        Step {
            effect: Effect::TypoTyped { ch },
            next_delay_ms: Some(next_delay_ms),
        }
    }

    fn step_correct(&mut self, typo: usize, progress: usize) -> Step {
        let armed = &self.typos[typo];
        // The wrong text is the buffer's tail; there is always a char to erase.
        let ch = self.committed.pop().unwrap_or_default();
        let progress = progress + 1;

        let next_delay_ms = if progress < armed.wrong.len() {
            self.mode = Mode::Correcting { typo, progress };
            correct_delay_ms(self.speed_ms)
        } else {
            debug!(at = armed.at, "typo corrected");
            self.triggered.insert(armed.at);
            self.mode = Mode::Normal;
            self.speed_ms
        };

        Step {
            effect: Effect::Erased { ch },
            next_delay_ms: Some(next_delay_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run_to_end(machine: &mut TypingMachine) -> Vec<(Step, String)> {
        let mut rng = StdRng::seed_from_u64(0);
        let mut out = Vec::new();
        while let Some(step) = machine.step(&mut rng) {
            out.push((step, machine.committed().to_string()));
        }
        out
    }

    #[test]
    fn plain_text_types_each_char_in_order() {
        let mut m = TypingMachine::new(&TypingConfig::new("Hello"));
        let steps = run_to_end(&mut m);

        let typed: Vec<(char, usize)> = steps
            .iter()
            .filter_map(|(s, _)| match s.effect {
                Effect::Typed { ch, index } => Some((ch, index)),
                _ => None,
            })
            .collect();
        assert_eq!(
            typed,
            vec![('H', 0), ('e', 1), ('l', 2), ('l', 3), ('o', 4)]
        );
        assert_eq!(steps.last().map(|(s, _)| s.effect), Some(Effect::Completed));
        assert_eq!(m.committed(), "Hello");
        assert!(m.is_complete());
    }

    #[test]
    fn typo_is_typed_paused_and_erased_before_the_real_char() {
        let cfg = TypingConfig::new("abc")
            .with_speed(100)
            .with_typo(TypoSpec::new(1, "xy").with_pause(400));
        let mut m = TypingMachine::new(&cfg);
        let steps = run_to_end(&mut m);

        let buffers: Vec<&str> = steps.iter().map(|(_, b)| b.as_str()).collect();
        assert_eq!(buffers, vec!["a", "ax", "axy", "ax", "a", "ab", "abc", "abc"]);

        let delays: Vec<Option<u64>> = steps.iter().skip(1).map(|(s, _)| s.next_delay_ms).collect();
        // typo char, last typo char (pause), erase, last erase (back to speed)
        assert_eq!(&delays[..4], &[Some(70), Some(400), Some(50), Some(100)]);
    }

    #[test]
    fn typo_pause_defaults_to_300ms() {
        let cfg = TypingConfig::new("ab").with_typo(TypoSpec::new(0, "z"));
        let mut m = TypingMachine::new(&cfg);
        let mut rng = StdRng::seed_from_u64(0);

        let step = m.step(&mut rng).unwrap();
        assert_eq!(step.effect, Effect::TypoTyped { ch: 'z' });
        assert_eq!(step.next_delay_ms, Some(300));
        assert_eq!(m.mode(), Mode::PausingAfterTypo { typo: 0 });
    }

    #[test]
    fn zero_pause_falls_back_to_the_default() {
        let cfg = TypingConfig::new("ab")
            .with_speed(100)
            .with_typo(TypoSpec::new(1, "x").with_pause(0));
        let mut m = TypingMachine::new(&cfg);
        let mut rng = StdRng::seed_from_u64(0);

        m.step(&mut rng);
        let step = m.step(&mut rng).unwrap();
        assert_eq!(step.effect, Effect::TypoTyped { ch: 'x' });
        assert_eq!(step.next_delay_ms, Some(300));
    }

    #[test]
    fn typo_fires_only_once() {
        let cfg = TypingConfig::new("aa").with_typo(TypoSpec::new(1, "q"));
        let mut m = TypingMachine::new(&cfg);
        let steps = run_to_end(&mut m);

        let typo_chars = steps
            .iter()
            .filter(|(s, _)| matches!(s.effect, Effect::TypoTyped { .. }))
            .count();
        assert_eq!(typo_chars, 1);
        assert_eq!(m.committed(), "aa");
    }

    #[test]
    fn out_of_range_and_empty_typos_are_ignored() {
        let cfg = TypingConfig::new("Hello World")
            .with_typo(TypoSpec::new(16, "Wrold").with_pause(400))
            .with_typo(TypoSpec::new(11, "x"))
            .with_typo(TypoSpec::new(2, ""));
        let mut m = TypingMachine::new(&cfg);
        assert_eq!(m.armed_typos(), 0);

        let steps = run_to_end(&mut m);
        assert!(steps
            .iter()
            .all(|(s, _)| !matches!(s.effect, Effect::TypoTyped { .. } | Effect::Erased { .. })));
        assert_eq!(m.committed(), "Hello World");
    }

    #[test]
    fn duplicate_offsets_keep_the_first_entry() {
        let cfg = TypingConfig::new("abc")
            .with_typo(TypoSpec::new(1, "x"))
            .with_typo(TypoSpec::new(1, "yy"));
        let mut m = TypingMachine::new(&cfg);
        assert_eq!(m.armed_typos(), 1);

        let steps = run_to_end(&mut m);
        let wrong: String = steps
            .iter()
            .filter_map(|(s, _)| match s.effect {
                Effect::TypoTyped { ch } => Some(ch),
                _ => None,
            })
            .collect();
        assert_eq!(wrong, "x");
    }

    #[test]
    fn committed_len_matches_cursor_in_normal_mode() {
        let cfg = TypingConfig::new("héllo wörld")
            .with_typo(TypoSpec::new(0, "ü"))
            .with_typo(TypoSpec::new(6, "wo"));
        let mut m = TypingMachine::new(&cfg);
        let mut rng = StdRng::seed_from_u64(3);

        while m.step(&mut rng).is_some() {
            if m.mode() == Mode::Normal {
                assert_eq!(m.committed().chars().count(), m.cursor());
            }
        }
        assert_eq!(m.committed(), "héllo wörld");
    }

    #[test]
    fn typo_progress_is_reported_only_while_typing_or_erasing() {
        let cfg = TypingConfig::new("ab").with_typo(TypoSpec::new(0, "xyz"));
        let mut m = TypingMachine::new(&cfg);
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(m.typo_progress(), None);
        m.step(&mut rng);
        assert_eq!(m.typo_progress(), Some(1));
        m.step(&mut rng);
        m.step(&mut rng);
        assert_eq!(m.typo_progress(), None); // pausing
        m.step(&mut rng);
        assert_eq!(m.typo_progress(), Some(1));
    }

    #[test]
    fn empty_text_completes_on_first_step() {
        let mut m = TypingMachine::new(&TypingConfig::new(""));
        let mut rng = StdRng::seed_from_u64(0);

        let step = m.step(&mut rng).unwrap();
        assert_eq!(step.effect, Effect::Completed);
        assert_eq!(step.next_delay_ms, None);
        assert!(m.step(&mut rng).is_none());
    }
}
