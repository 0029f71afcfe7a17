use anyhow::{anyhow, Result};

use crate::model::{TypingConfig, TypoSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Developer speed.
    Fast,
    Normal,
    /// Hesitant beginner.
    Slow,
    /// Slow, with a "Wrold" slip at offset 16.
    Beginner,
    /// Quick, with a "fucntion" slip at offset 10.
    Coding,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Fast,
        Preset::Normal,
        Preset::Slow,
        Preset::Beginner,
        Preset::Coding,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Fast => "fast",
            Preset::Normal => "normal",
            Preset::Slow => "slow",
            Preset::Beginner => "beginner",
            Preset::Coding => "coding",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("unknown preset {name:?}"))
    }

    pub fn speed_ms(self) -> u64 {
        match self {
            Preset::Fast => 50,
            Preset::Normal => 80,
            Preset::Slow => 150,
            Preset::Beginner => 120,
            Preset::Coding => 60,
        }
    }

    pub fn typos(self) -> Vec<TypoSpec> {
        match self {
            Preset::Fast | Preset::Normal | Preset::Slow => Vec::new(),
            Preset::Beginner => vec![TypoSpec::new(16, "Wrold").with_pause(400)],
            Preset::Coding => vec![TypoSpec::new(10, "fucntion").with_pause(300)],
        }
    }

    pub fn config(self, text: impl Into<String>) -> TypingConfig {
        TypingConfig {
            text: text.into(),
            speed_ms: self.speed_ms(),
            typos: self.typos(),
            ..Default::default()
        }
    }
}
