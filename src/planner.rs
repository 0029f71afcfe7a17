use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{ensure, Result};

use crate::config::validate_config;
use crate::engine::TypingEngine;
use crate::machine::Effect;
use crate::model::{Timeline, TimelineEvent, TypingConfig, TIMELINE_VERSION};
use crate::scheduler::ManualClock;

pub fn event_for_effect(effect: &Effect) -> TimelineEvent {
    match *effect {
        Effect::Typed { ch, index } => TimelineEvent::Type { ch, index },
        Effect::TypoTyped { ch } => TimelineEvent::Typo { ch },
        Effect::Erased { .. } => TimelineEvent::Erase,
        Effect::Completed => TimelineEvent::Complete,
    }
}

/// Run `cfg` to completion on a virtual clock and record every tick.
///
/// The same `seed` always yields the same timeline.
pub fn generate_timeline(cfg: TypingConfig, seed: u64) -> Result<Timeline> {
    validate_config(&cfg)?;

    let clock = Rc::new(ManualClock::new());
    let events: Rc<RefCell<Vec<TimelineEvent>>> = Rc::default();

    let engine = {
        let clock = clock.clone();
        let events = events.clone();
        let mut last_ms = 0u64;
        TypingEngine::with_seed(clock.clone(), seed).on_change(move |effect, _| {
            let now = clock.now_ms();
            let mut events = events.borrow_mut();
            if now > last_ms {
                events.push(TimelineEvent::Wait { ms: now - last_ms });
            }
            last_ms = now;
            events.push(event_for_effect(effect));
        })
    };

    engine.start(&cfg)?;
    clock.run_until_idle();
    ensure!(engine.is_complete(), "typing run did not complete");
    drop(engine);

    let events = events.take();
    Ok(Timeline {
        version: TIMELINE_VERSION,
        config: cfg,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypoSpec;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_seed_same_timeline() {
        let cfg = TypingConfig::new("seeded run").with_typo(TypoSpec::new(3, "xx"));
        let a = generate_timeline(cfg.clone(), 99).unwrap();
        let b = generate_timeline(cfg, 99).unwrap();
        assert_eq!(a.events, b.events);
    }

    #[test]
    fn start_delay_is_the_first_wait() {
        let cfg = TypingConfig::new("ab").with_start_delay(500);
        let timeline = generate_timeline(cfg, 1).unwrap();
        assert_eq!(timeline.events[0], TimelineEvent::Wait { ms: 500 });
        assert_eq!(timeline.events[1], TimelineEvent::Type { ch: 'a', index: 0 });
        assert_eq!(timeline.events.last(), Some(&TimelineEvent::Complete));
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(generate_timeline(TypingConfig::new("ab").with_speed(0), 1).is_err());
    }
}
