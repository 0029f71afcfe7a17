//! Lifecycle around [`TypingMachine`]: one owned timer, restart, cancel, hooks.
//!
//! Every scheduled tick carries the generation it was armed in. `start` and
//! `cancel` bump the generation and drop the pending handle first, so a tick
//! that still fires afterwards (or was already popped by the scheduler) finds a
//! newer generation and leaves the state alone.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::config::validate_config;
use crate::machine::{Effect, Mode, TypingMachine};
use crate::model::TypingConfig;
use crate::scheduler::{Scheduler, TimerHandle};

pub type CharacterHook = Box<dyn FnMut(char, usize)>;
pub type CompleteHook = Box<dyn FnMut()>;
pub type ChangeHook = Box<dyn FnMut(&Effect, &str)>;

#[derive(Default)]
struct Hooks {
    on_character: Option<CharacterHook>,
    on_complete: Option<CompleteHook>,
    on_change: Option<ChangeHook>,
}

struct State {
    machine: Option<TypingMachine>,
    show_cursor: bool,
    pending: Option<TimerHandle>,
    generation: u64,
    rng: StdRng,
}

struct Shared {
    state: RefCell<State>,
    hooks: RefCell<Hooks>,
    scheduler: Rc<dyn Scheduler>,
}

/// A typing animation bound to a scheduler.
///
/// At most one tick is pending per engine. Dropping the engine cancels it.
pub struct TypingEngine {
    shared: Rc<Shared>,
}

impl fmt::Debug for TypingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("TypingEngine")
            .field("generation", &state.generation)
            .field("pending", &state.pending)
            .field("machine", &state.machine)
            .finish()
    }
}

impl TypingEngine {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self::with_rng(scheduler, StdRng::from_entropy())
    }

    pub fn with_seed(scheduler: Rc<dyn Scheduler>, seed: u64) -> Self {
        Self::with_rng(scheduler, StdRng::seed_from_u64(seed))
    }

    fn with_rng(scheduler: Rc<dyn Scheduler>, rng: StdRng) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(State {
                    machine: None,
                    show_cursor: true,
                    pending: None,
                    generation: 0,
                    rng,
                }),
                hooks: RefCell::new(Hooks::default()),
                scheduler,
            }),
        }
    }

    /// Called once per char of the real text, never for typo chars or erases.
    pub fn on_character(self, hook: impl FnMut(char, usize) + 'static) -> Self {
        self.shared.hooks.borrow_mut().on_character = Some(Box::new(hook));
        self
    }

    /// Called once per run, after the buffer equals the full text.
    pub fn on_complete(self, hook: impl FnMut() + 'static) -> Self {
        self.shared.hooks.borrow_mut().on_complete = Some(Box::new(hook));
        self
    }

    /// Called after every tick with the effect and the buffer it produced.
    pub fn on_change(self, hook: impl FnMut(&Effect, &str) + 'static) -> Self {
        self.shared.hooks.borrow_mut().on_change = Some(Box::new(hook));
        self
    }

    /// Begin a run, discarding any run in progress.
    ///
    /// The first tick fires after `start_delay_ms`. An empty text completes on
    /// that first tick.
    pub fn start(&self, cfg: &TypingConfig) -> Result<()> {
        validate_config(cfg)?;
        self.cancel();

        {
            let mut state = self.shared.state.borrow_mut();
            state.machine = Some(TypingMachine::new(cfg));
            state.show_cursor = cfg.show_cursor;
            debug!(
                generation = state.generation,
                len = cfg.text.chars().count(),
                typos = cfg.typos.len(),
                "typing run started"
            );
        }

        arm(&self.shared, cfg.start_delay_ms);
        Ok(())
    }

    /// Stop the run. The buffer keeps whatever it shows now.
    ///
    /// Safe to call in any state, any number of times.
    pub fn cancel(&self) {
        let pending = {
            let mut state = self.shared.state.borrow_mut();
            state.generation += 1;
            state.pending.take()
        };
        if let Some(handle) = pending {
            debug!(?handle, "cancelled pending tick");
            self.shared.scheduler.cancel(handle);
        }
    }

    pub fn committed_text(&self) -> String {
        let state = self.shared.state.borrow();
        state
            .machine
            .as_ref()
            .map(|m| m.committed().to_string())
            .unwrap_or_default()
    }

    pub fn is_complete(&self) -> bool {
        let state = self.shared.state.borrow();
        state.machine.as_ref().is_some_and(TypingMachine::is_complete)
    }

    /// Whether a tick is scheduled.
    pub fn is_running(&self) -> bool {
        self.shared.state.borrow().pending.is_some()
    }

    pub fn mode(&self) -> Option<Mode> {
        self.shared.state.borrow().machine.as_ref().map(TypingMachine::mode)
    }

    /// The caret shown next to the text: on while typing, off once complete.
    pub fn cursor_visible(&self) -> bool {
        let state = self.shared.state.borrow();
        state.show_cursor && !state.machine.as_ref().is_some_and(TypingMachine::is_complete)
    }
}

impl Drop for TypingEngine {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn arm(shared: &Rc<Shared>, delay_ms: u64) {
    let generation = shared.state.borrow().generation;
    let weak: Weak<Shared> = Rc::downgrade(shared);

    let handle = shared.scheduler.schedule(
        delay_ms,
        Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                tick(&shared, generation);
            }
        }),
    );

    shared.state.borrow_mut().pending = Some(handle);
}

fn tick(shared: &Rc<Shared>, generation: u64) {
    let (step, committed) = {
        let mut state = shared.state.borrow_mut();
        if state.generation != generation {
            debug!(generation, current = state.generation, "stale tick ignored");
            return;
        }
        state.pending = None;

        let State { machine, rng, .. } = &mut *state;
        let Some(machine) = machine.as_mut() else {
            return;
        };
        let Some(step) = machine.step(rng) else {
            return;
        };
        (step, machine.committed().to_string())
    };

    // Re-arm before running hooks so a hook that calls `cancel` or `start`
    // sees (and replaces) the next tick.
    if let Some(delay_ms) = step.next_delay_ms {
        arm(shared, delay_ms);
    }

    let mut hooks = shared.hooks.borrow_mut();
    if let Some(hook) = hooks.on_change.as_mut() {
        hook(&step.effect, &committed);
    }
    match step.effect {
        Effect::Typed { ch, index } => {
            if let Some(hook) = hooks.on_character.as_mut() {
                hook(ch, index);
            }
        }
        Effect::Completed => {
            if let Some(hook) = hooks.on_complete.as_mut() {
                hook();
            }
        }
        Effect::TypoTyped { .. } | Effect::Erased { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypoSpec;
    use crate::scheduler::ManualClock;
    use std::cell::Cell;

    #[test]
    fn start_delay_holds_back_the_first_char() {
        let clock = Rc::new(ManualClock::new());
        let engine = TypingEngine::with_seed(clock.clone(), 1);
        engine
            .start(&TypingConfig::new("hi").with_start_delay(500))
            .unwrap();

        clock.advance(499);
        assert_eq!(engine.committed_text(), "");
        clock.advance(1);
        assert_eq!(engine.committed_text(), "h");
    }

    #[test]
    fn exactly_one_tick_pending_while_running() {
        let clock = Rc::new(ManualClock::new());
        let engine = TypingEngine::with_seed(clock.clone(), 2);
        engine
            .start(&TypingConfig::new("abcd").with_typo(TypoSpec::new(2, "zz")))
            .unwrap();

        while clock.run_next() {
            if engine.is_complete() {
                assert_eq!(clock.pending(), 0);
                assert!(!engine.is_running());
            } else {
                assert_eq!(clock.pending(), 1);
                assert!(engine.is_running());
            }
        }
        assert_eq!(engine.committed_text(), "abcd");
    }

    #[test]
    fn cursor_hides_on_completion() {
        let clock = Rc::new(ManualClock::new());
        let engine = TypingEngine::with_seed(clock.clone(), 3);
        engine.start(&TypingConfig::new("x")).unwrap();
        assert!(engine.cursor_visible());

        clock.run_until_idle();
        assert!(!engine.cursor_visible());

        let mut cfg = TypingConfig::new("y");
        cfg.show_cursor = false;
        engine.start(&cfg).unwrap();
        assert!(!engine.cursor_visible());
    }

    #[test]
    fn invalid_config_is_rejected_without_touching_the_run() {
        let clock = Rc::new(ManualClock::new());
        let engine = TypingEngine::with_seed(clock.clone(), 4);
        engine.start(&TypingConfig::new("abc")).unwrap();
        clock.run_next();

        assert!(engine.start(&TypingConfig::new("zzz").with_speed(0)).is_err());
        clock.run_until_idle();
        assert_eq!(engine.committed_text(), "abc");
    }

    #[test]
    fn dropping_the_engine_cancels_its_timer() {
        let clock = Rc::new(ManualClock::new());
        let fired = Rc::new(Cell::new(false));
        {
            let f = fired.clone();
            let engine =
                TypingEngine::with_seed(clock.clone(), 5).on_character(move |_, _| f.set(true));
            engine.start(&TypingConfig::new("abc")).unwrap();
            assert_eq!(clock.pending(), 1);
        }
        assert_eq!(clock.pending(), 0);
        clock.run_until_idle();
        assert!(!fired.get());
    }
}
