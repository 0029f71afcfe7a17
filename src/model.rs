use serde::{Deserialize, Serialize};

pub const TIMELINE_VERSION: u32 = 1;

pub const DEFAULT_SPEED_MS: u64 = 80;
pub const DEFAULT_JITTER_RATIO: f64 = 0.2;
pub const DEFAULT_TYPO_PAUSE_MS: u64 = 300;

/// Input for one typing run. Immutable while the run is in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Required in JSON; the CLI's `--input` replaces it after loading.
    pub text: String,
    #[serde(default = "default_speed_ms")]
    pub speed_ms: u64,
    #[serde(default)]
    pub start_delay_ms: u64,
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
    #[serde(default = "default_show_cursor")]
    pub show_cursor: bool,
    #[serde(default)]
    pub typos: Vec<TypoSpec>,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            speed_ms: DEFAULT_SPEED_MS,
            start_delay_ms: 0,
            jitter_ratio: DEFAULT_JITTER_RATIO,
            show_cursor: true,
            typos: Vec::new(),
        }
    }
}

impl TypingConfig {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed_ms: u64) -> Self {
        self.speed_ms = speed_ms;
        self
    }

    pub fn with_start_delay(mut self, start_delay_ms: u64) -> Self {
        self.start_delay_ms = start_delay_ms;
        self
    }

    pub fn with_typo(mut self, typo: TypoSpec) -> Self {
        self.typos.push(typo);
        self
    }
}

fn default_speed_ms() -> u64 {
    DEFAULT_SPEED_MS
}

fn default_jitter_ratio() -> f64 {
    DEFAULT_JITTER_RATIO
}

fn default_show_cursor() -> bool {
    true
}

/// A scripted mistake: at char offset `at`, type `wrong`, pause, then erase it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypoSpec {
    pub at: usize,
    pub wrong: String,
    /// Pause between the last wrong char and the first erase. `None` or `0`
    /// means [`DEFAULT_TYPO_PAUSE_MS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_ms: Option<u64>,
}

impl TypoSpec {
    pub fn new(at: usize, wrong: impl Into<String>) -> Self {
        Self {
            at,
            wrong: wrong.into(),
            pause_ms: None,
        }
    }

    pub fn with_pause(mut self, pause_ms: u64) -> Self {
        self.pause_ms = Some(pause_ms);
        self
    }

    pub fn pause_or_default(&self) -> u64 {
        self.pause_ms
            .filter(|&ms| ms > 0)
            .unwrap_or(DEFAULT_TYPO_PAUSE_MS)
    }
}

/// A recorded typing run, in tick order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timeline {
    pub version: u32,
    pub config: TypingConfig,
    pub events: Vec<TimelineEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEvent {
    Wait { ms: u64 },
    Type { ch: char, index: usize },
    Typo { ch: char },
    Erase,
    Complete,
}
