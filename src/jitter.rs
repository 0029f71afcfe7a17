use rand::Rng;
use rand_distr::{Distribution, Uniform};

/// Floor for jittered delays in normal typing.
pub const MIN_NORMAL_DELAY_MS: u64 = 30;

/// Typo chars go out faster than normal ones...
pub const TYPO_SPEED_FACTOR: f64 = 0.7;
/// ...and erasing is faster still.
pub const CORRECT_SPEED_FACTOR: f64 = 0.5;

/// Delay before the next normal char: `speed ± jitter_ratio * speed`, uniform,
/// floored at [`MIN_NORMAL_DELAY_MS`].
pub fn normal_delay_ms(speed_ms: u64, jitter_ratio: f64, rng: &mut impl Rng) -> u64 {
    let speed = speed_ms as f64;
    let spread = speed * jitter_ratio;
    let offset = if spread > 0.0 {
        Uniform::new_inclusive(-spread, spread).sample(rng)
    } else {
        0.0
    };

    (speed + offset).round().max(MIN_NORMAL_DELAY_MS as f64) as u64
}

pub fn typo_delay_ms(speed_ms: u64) -> u64 {
    scaled(speed_ms, TYPO_SPEED_FACTOR)
}

pub fn correct_delay_ms(speed_ms: u64) -> u64 {
    scaled(speed_ms, CORRECT_SPEED_FACTOR)
}

fn scaled(speed_ms: u64, factor: f64) -> u64 {
    (speed_ms as f64 * factor).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn normal_delay_stays_within_jitter_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let d = normal_delay_ms(100, 0.2, &mut rng);
            assert!((80..=120).contains(&d), "delay {d} outside band");
        }
    }

    #[test]
    fn normal_delay_is_floored() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(normal_delay_ms(10, 0.2, &mut rng) >= MIN_NORMAL_DELAY_MS);
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(normal_delay_ms(80, 0.0, &mut rng), 80);
    }

    #[test]
    fn typo_phases_use_fixed_multipliers() {
        assert_eq!(typo_delay_ms(100), 70);
        assert_eq!(correct_delay_ms(100), 50);
        assert_eq!(typo_delay_ms(120), 84);
        assert_eq!(correct_delay_ms(75), 38);
    }
}
