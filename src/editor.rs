//! A simulated code editor: the code is typed in, then an output line shows up.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::TypingEngine;
use crate::model::TypingConfig;
use crate::scheduler::{Scheduler, TimerHandle};

pub const EDITOR_JITTER_RATIO: f64 = 0.15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEditorConfig {
    pub code: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// When false the full code is shown at once.
    #[serde(default)]
    pub show_typing: bool,
    #[serde(default = "default_typing_speed_ms")]
    pub typing_speed_ms: u64,
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,
    #[serde(default)]
    pub show_output: bool,
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_output_delay_ms")]
    pub output_delay_ms: u64,
}

impl Default for CodeEditorConfig {
    fn default() -> Self {
        Self {
            code: "console.log('Hello World');".to_string(),
            file_name: default_file_name(),
            language: default_language(),
            show_typing: false,
            typing_speed_ms: default_typing_speed_ms(),
            typing_delay_ms: default_typing_delay_ms(),
            show_output: false,
            output: default_output(),
            output_delay_ms: default_output_delay_ms(),
        }
    }
}

impl CodeEditorConfig {
    pub fn typing_config(&self) -> TypingConfig {
        TypingConfig {
            text: self.code.clone(),
            speed_ms: self.typing_speed_ms,
            start_delay_ms: self.typing_delay_ms,
            jitter_ratio: EDITOR_JITTER_RATIO,
            show_cursor: true,
            typos: Vec::new(),
        }
    }
}

fn default_file_name() -> String {
    "index.html".to_string()
}

fn default_language() -> String {
    "javascript".to_string()
}

fn default_typing_speed_ms() -> u64 {
    80
}

fn default_typing_delay_ms() -> u64 {
    500
}

fn default_output() -> String {
    "Hello World".to_string()
}

fn default_output_delay_ms() -> u64 {
    2000
}

#[derive(Debug, Default)]
struct OutputState {
    /// Set for a non-animated session: the code shown in full.
    static_code: Option<String>,
    visible: bool,
    reveal_after_ms: Option<u64>,
    pending: Option<TimerHandle>,
    generation: u64,
}

/// Typing engine plus the delayed output reveal. Dropping the session cancels
/// both timers.
pub struct CodeEditorSession {
    engine: TypingEngine,
    output: Rc<RefCell<OutputState>>,
    scheduler: Rc<dyn Scheduler>,
}

impl std::fmt::Debug for CodeEditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeEditorSession")
            .field("engine", &self.engine)
            .field("output", &self.output)
            .finish()
    }
}

impl CodeEditorSession {
    pub fn new(scheduler: Rc<dyn Scheduler>, seed: Option<u64>) -> Self {
        let engine = match seed {
            Some(seed) => TypingEngine::with_seed(scheduler.clone(), seed),
            None => TypingEngine::new(scheduler.clone()),
        };
        Self::with_engine(scheduler, engine)
    }

    /// Wrap an engine built on the same `scheduler`. The session installs its
    /// own completion hook; other hooks on `engine` are kept.
    pub fn with_engine(scheduler: Rc<dyn Scheduler>, engine: TypingEngine) -> Self {
        let output = Rc::new(RefCell::new(OutputState::default()));
        let engine = {
            let weak = Rc::downgrade(&output);
            let scheduler = scheduler.clone();
            engine.on_complete(move || schedule_reveal(&weak, &scheduler))
        };

        Self {
            engine,
            output,
            scheduler,
        }
    }

    pub fn engine(&self) -> &TypingEngine {
        &self.engine
    }

    pub fn start(&self, cfg: &CodeEditorConfig) -> Result<()> {
        self.cancel();

        {
            let mut out = self.output.borrow_mut();
            out.visible = !cfg.show_typing && cfg.show_output;
            out.reveal_after_ms = cfg.show_output.then_some(cfg.output_delay_ms);
            out.static_code = (!cfg.show_typing).then(|| cfg.code.clone());
        }

        if cfg.show_typing {
            self.engine.start(&cfg.typing_config())?;
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.engine.cancel();
        let pending = {
            let mut out = self.output.borrow_mut();
            out.generation += 1;
            out.pending.take()
        };
        if let Some(handle) = pending {
            self.scheduler.cancel(handle);
        }
    }

    pub fn display_code(&self) -> String {
        match &self.output.borrow().static_code {
            Some(code) => code.clone(),
            None => self.engine.committed_text(),
        }
    }

    pub fn is_typing(&self) -> bool {
        self.output.borrow().static_code.is_none() && self.engine.is_running()
    }

    pub fn cursor_visible(&self) -> bool {
        self.output.borrow().static_code.is_none() && self.engine.cursor_visible()
    }

    pub fn output_visible(&self) -> bool {
        self.output.borrow().visible
    }
}

impl Drop for CodeEditorSession {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn schedule_reveal(output: &Weak<RefCell<OutputState>>, scheduler: &Rc<dyn Scheduler>) {
    let Some(state) = output.upgrade() else {
        return;
    };
    let (delay_ms, generation) = {
        let out = state.borrow();
        let Some(delay_ms) = out.reveal_after_ms else {
            return;
        };
        (delay_ms, out.generation)
    };

    let weak = Rc::downgrade(&state);
    let handle = scheduler.schedule(
        delay_ms,
        Box::new(move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut out = state.borrow_mut();
            if out.generation != generation {
                return;
            }
            debug!("output revealed");
            out.pending = None;
            out.visible = true;
        }),
    );
    state.borrow_mut().pending = Some(handle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualClock;

    fn typing_cfg() -> CodeEditorConfig {
        CodeEditorConfig {
            code: "x = 1".to_string(),
            show_typing: true,
            show_output: true,
            output: "1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn static_mode_shows_everything_without_timers() {
        let clock = Rc::new(ManualClock::new());
        let session = CodeEditorSession::new(clock.clone(), Some(1));
        let cfg = CodeEditorConfig {
            show_output: true,
            ..Default::default()
        };
        session.start(&cfg).unwrap();

        assert_eq!(session.display_code(), "console.log('Hello World');");
        assert!(session.output_visible());
        assert!(!session.cursor_visible());
        assert_eq!(clock.pending(), 0);
    }

    #[test]
    fn output_appears_after_typing_plus_delay() {
        let clock = Rc::new(ManualClock::new());
        let session = CodeEditorSession::new(clock.clone(), Some(2));
        session.start(&typing_cfg()).unwrap();

        clock.advance(499);
        assert_eq!(session.display_code(), "");
        assert!(session.is_typing());

        while !session.engine().is_complete() {
            assert!(clock.run_next());
        }
        let done_at = clock.now_ms();
        assert_eq!(session.display_code(), "x = 1");
        assert!(!session.output_visible());

        clock.advance(1_999);
        assert!(!session.output_visible());
        clock.advance(1);
        assert!(session.output_visible());
        assert_eq!(clock.now_ms(), done_at + 2_000);
    }

    #[test]
    fn cancel_stops_the_output_reveal() {
        let clock = Rc::new(ManualClock::new());
        let session = CodeEditorSession::new(clock.clone(), Some(3));
        session.start(&typing_cfg()).unwrap();

        while !session.engine().is_complete() {
            assert!(clock.run_next());
        }
        assert_eq!(clock.pending(), 1);

        session.cancel();
        assert_eq!(clock.pending(), 0);
        clock.advance(10_000);
        assert!(!session.output_visible());
    }
}
