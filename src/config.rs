use std::fs;
use std::path::Path;

use anyhow::{anyhow, ensure, Context, Result};

use crate::model::{TypingConfig, TypoSpec};

pub fn validate_config(cfg: &TypingConfig) -> Result<()> {
    ensure!(cfg.speed_ms > 0, "speed_ms must be > 0");
    ensure!(cfg.jitter_ratio.is_finite(), "jitter_ratio must be finite");
    ensure!(
        (0.0..1.0).contains(&cfg.jitter_ratio),
        "jitter_ratio must be in [0.0, 1.0)"
    );
    Ok(())
}

/// Load a [`TypingConfig`] from a JSON file. Missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<TypingConfig> {
    let json =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let cfg: TypingConfig =
        serde_json::from_str(&json).context("failed to parse typing config JSON")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Parse a `--typo` flag value of the form `AT:WRONG` or `AT:WRONG:PAUSE_MS`.
///
/// A trailing `:N` is always read as the pause, so a wrong text that itself
/// ends in `:<digits>` needs an explicit pause after it.
pub fn parse_typo_flag(value: &str) -> Result<TypoSpec> {
    let (at, rest) = value
        .split_once(':')
        .ok_or_else(|| anyhow!("expected AT:WRONG[:PAUSE_MS], got {value:?}"))?;
    let at: usize = at
        .trim()
        .parse()
        .with_context(|| format!("invalid typo offset {at:?}"))?;

    if let Some((wrong, pause)) = rest.rsplit_once(':') {
        if let Ok(pause_ms) = pause.parse::<u64>() {
            ensure!(!wrong.is_empty(), "typo wrong text must not be empty");
            return Ok(TypoSpec::new(at, wrong).with_pause(pause_ms));
        }
    }

    ensure!(!rest.is_empty(), "typo wrong text must not be empty");
    Ok(TypoSpec::new(at, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_speed() {
        let cfg = TypingConfig::new("abc").with_speed(0);
        let err = validate_config(&cfg).unwrap_err();
        assert!(format!("{err:#}").contains("speed_ms"));
    }

    #[test]
    fn rejects_jitter_out_of_range() {
        let mut cfg = TypingConfig::new("abc");
        cfg.jitter_ratio = 1.5;
        assert!(validate_config(&cfg).is_err());
        cfg.jitter_ratio = f64::NAN;
        assert!(validate_config(&cfg).is_err());
    }

    #[test]
    fn missing_json_fields_take_defaults() {
        let cfg: TypingConfig = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(cfg.speed_ms, 80);
        assert_eq!(cfg.start_delay_ms, 0);
        assert!(cfg.show_cursor);
        assert!(cfg.typos.is_empty());
    }

    #[test]
    fn json_without_text_is_rejected() {
        let err = serde_json::from_str::<TypingConfig>(r#"{"speed_ms":50}"#).unwrap_err();
        assert!(err.to_string().contains("text"));
    }

    #[test]
    fn parses_typo_flags() {
        assert_eq!(
            parse_typo_flag("16:Wrold:400").unwrap(),
            TypoSpec::new(16, "Wrold").with_pause(400)
        );
        assert_eq!(
            parse_typo_flag("3:teh").unwrap(),
            TypoSpec::new(3, "teh")
        );
        assert_eq!(
            parse_typo_flag("0:a:b").unwrap(),
            TypoSpec::new(0, "a:b")
        );
        assert!(parse_typo_flag("nope").is_err());
        assert!(parse_typo_flag("x:abc").is_err());
        assert!(parse_typo_flag("4:").is_err());
    }
}
