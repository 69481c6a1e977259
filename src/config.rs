//! Builder-style configuration for the three engines, following the
//! `derive_builder` pattern already used in
//! `static_evaluation/evaluators/advanced_evaluator.rs`: a plain struct
//! of tunables with per-field defaults, construct via the generated
//! `*Builder`.

use std::path::PathBuf;

use derive_builder::Builder;

pub const NEGAMAX_MIN_DEPTH: u32 = 2;
pub const NEGAMAX_MAX_DEPTH: u32 = 126;
pub const UCT_MAX_DEPTH: u32 = 254;
pub const UCT_MIN_PROBES: u64 = 1_000;
pub const UCT_DEFAULT_BIAS: f64 = 0.353;
pub const UCT_INITIAL_REPORT_PROBES: u64 = 125_000;
pub const UCT_REPORT_PROBES_GROWTH: f64 = 1.35;
pub const DEFAULT_CACHE_BYTES: usize = 1 << 24;
pub const DEFAULT_MAX_SCORE: i32 = 30_000;
pub const DEFAULT_MOVE_TIME_MS: u64 = 5_000;

/// Clamps to `[MIN_DEPTH, MAX_DEPTH]` then rounds up to an even number
/// (spec §4.2's `set_depth`).
pub fn clamp_negamax_depth(depth: u32) -> u32 {
    let clamped = depth.clamp(NEGAMAX_MIN_DEPTH, NEGAMAX_MAX_DEPTH);
    if clamped % 2 == 0 {
        clamped
    } else {
        clamped + 1
    }
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct NegamaxConfig {
    #[builder(default = "8")]
    pub depth: u32,

    #[builder(default = "DEFAULT_MOVE_TIME_MS")]
    pub move_time_ms: u64,

    #[builder(default = "0")]
    pub contempt: i32,

    #[builder(default = "DEFAULT_MAX_SCORE")]
    pub infinity: i32,

    #[builder(default = "DEFAULT_CACHE_BYTES")]
    pub cache_bytes: usize,
}

impl Default for NegamaxConfig {
    fn default() -> Self {
        NegamaxConfigBuilder::default().build().expect("all fields have defaults")
    }
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into))]
pub struct UctConfig {
    #[builder(default = "UCT_MAX_DEPTH")]
    pub depth: u32,

    #[builder(default = "DEFAULT_MOVE_TIME_MS")]
    pub move_time_ms: u64,

    #[builder(default = "0")]
    pub contempt: i32,

    #[builder(default = "DEFAULT_MAX_SCORE")]
    pub infinity: i32,

    #[builder(default = "UCT_DEFAULT_BIAS")]
    pub exploration_bias: f64,
}

impl Default for UctConfig {
    fn default() -> Self {
        UctConfigBuilder::default().build().expect("all fields have defaults")
    }
}

#[derive(Builder, Debug, Clone)]
#[builder(setter(into, strip_option), default)]
pub struct DoeConfig {
    /// Worker pool size. `None` at build time means "2 x cores", resolved
    /// by `DoeEngine::new` since `num_cpus::get()` is not a const fn.
    pub pool_size: Option<usize>,

    /// Where the persistent key-value store lives; `None` uses the
    /// platform data directory via `directories-next`.
    pub store_path: Option<PathBuf>,

    #[builder(default = "10")]
    pub report_every: u64,

    #[builder(default = "30")]
    pub shutdown_timeout_secs: u64,
}

impl Default for DoeConfig {
    fn default() -> Self {
        DoeConfigBuilder::default().build().expect("all fields have defaults")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negamax_depth_rounds_up_to_even() {
        assert_eq!(clamp_negamax_depth(7), 8);
        assert_eq!(clamp_negamax_depth(8), 8);
        assert_eq!(clamp_negamax_depth(1), NEGAMAX_MIN_DEPTH);
        assert_eq!(clamp_negamax_depth(1000), NEGAMAX_MAX_DEPTH);
    }

    #[test]
    fn negamax_config_builder_overrides_defaults() {
        let cfg = NegamaxConfigBuilder::default()
            .depth(10u32)
            .contempt(-5)
            .build()
            .unwrap();
        assert_eq!(cfg.depth, 10);
        assert_eq!(cfg.contempt, -5);
        assert_eq!(cfg.move_time_ms, DEFAULT_MOVE_TIME_MS);
    }

    #[test]
    fn doe_config_defaults_to_auto_pool_size() {
        let cfg = DoeConfig::default();
        assert!(cfg.pool_size.is_none());
        assert_eq!(cfg.report_every, 10);
    }
}
