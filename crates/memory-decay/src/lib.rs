//! Importance scoring, decay, reinforcement, archival threshold (spec §4.B).

use memory_core::config::DecayConfig;
use regex::RegexSet;

/// Weighted trigger taxonomy used to assign a memory's base importance
/// at capture time. Order matters: the highest-priority match wins.
struct TriggerTaxonomy {
    critical: RegexSet,
    user_correction: RegexSet,
    cross_project: RegexSet,
    explicit_learning: RegexSet,
}

impl TriggerTaxonomy {
    fn new() -> Self {
        Self {
            critical: RegexSet::new([r"(?i)\bcritical\b", r"(?i)\bmust not\b"]).unwrap(),
            user_correction: RegexSet::new([
                r"(?i)\bactually\b",
                r"(?i)\bno,\s",
                r"(?i)that'?s wrong",
            ])
            .unwrap(),
            cross_project: RegexSet::new([
                r"(?i)across projects",
                r"(?i)in (other|every) project",
            ])
            .unwrap(),
            explicit_learning: RegexSet::new([
                r"(?i)learned that",
                r"(?i)discovered that",
                r"(?i)\brealized\b",
            ])
            .unwrap(),
        }
    }

    fn classify(&self, text: &str) -> (f64, &'static str) {
        if self.critical.is_match(text) {
            (0.9, "critical")
        } else if self.user_correction.is_match(text) {
            (0.75, "user_correction")
        } else if self.cross_project.is_match(text) {
            (0.7, "cross_project_reference")
        } else if self.explicit_learning.is_match(text) {
            (0.65, "explicit_learning")
        } else {
            (0.5, "default")
        }
    }
}

/// Assigns a base importance in [0,1] and the matched trigger family name.
pub fn classify_base_importance(text: &str) -> (f64, &'static str) {
    TriggerTaxonomy::new().classify(text)
}

/// spec §4.B: `new = old * 0.99^days_since_last_reinforcement`.
pub fn decay(old: f64, days_since_last_reinforcement: f64, config: &DecayConfig) -> f64 {
    let decayed = old * config.daily_decay_base.powf(days_since_last_reinforcement.max(0.0));
    decayed.clamp(0.0, 1.0)
}

/// spec §4.B: `new = min(0.95, old * 1.15)`, applied on GOOD/EASY.
pub fn reinforce(old: f64, config: &DecayConfig) -> f64 {
    (old * config.reinforcement_multiplier)
        .min(config.importance_cap)
        .clamp(0.0, 1.0)
}

/// spec §4.B: archive if importance < 0.2 and days-since-reinforcement
/// exceeds the configurable stale threshold (default 180).
pub fn should_archive(importance: f64, days_since_last_reinforcement: f64, config: &DecayConfig) -> bool {
    importance < config.archive_importance_floor
        && days_since_last_reinforcement > config.stale_threshold_days as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_learning_classified_in_expected_band() {
        let (importance, family) =
            classify_base_importance("I learned that direct language works better.");
        assert_eq!(family, "explicit_learning");
        assert!((0.6..=0.8).contains(&importance), "importance {importance} out of band");
    }

    #[test]
    fn critical_outranks_other_matches() {
        let (_, family) =
            classify_base_importance("actually this is CRITICAL and must not regress");
        assert_eq!(family, "critical");
    }

    #[test]
    fn s4_decay_archive_scenario() {
        // spec §8 S4: importance 0.3, last_reinforced 200 days ago, stale_threshold=180.
        let cfg = DecayConfig {
            stale_threshold_days: 180,
            ..Default::default()
        };
        let decayed = decay(0.3, 200.0, &cfg);
        assert!((decayed - 0.3 * 0.99f64.powf(200.0)).abs() < 1e-9);
        assert!(decayed < 0.05, "expected ~0.04, got {decayed}");
        assert!(should_archive(decayed, 200.0, &cfg));
    }

    #[test]
    fn reinforcement_never_exceeds_cap() {
        let cfg = DecayConfig::default();
        let mut importance = 0.9;
        for _ in 0..20 {
            importance = reinforce(importance, &cfg);
            assert!(importance <= 0.95 + 1e-12);
        }
    }

    proptest::proptest! {
        #[test]
        fn importance_always_in_unit_interval(old in 0.0f64..=1.0, days in 0.0f64..=10_000.0) {
            let cfg = DecayConfig::default();
            let d = decay(old, days, &cfg);
            proptest::prop_assert!((0.0..=1.0).contains(&d));
            let r = reinforce(old, &cfg);
            proptest::prop_assert!(r <= 0.95 + 1e-9);
            proptest::prop_assert!(r >= 0.0);
        }
    }
}
