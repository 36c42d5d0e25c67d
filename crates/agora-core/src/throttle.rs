//! Request throttling and circuit breaking for the action provider.
//!
//! Decision sources are the one part of the system the kernel does not
//! control, so every provider call goes through this gate first. The
//! gate layers five independent checks, evaluated in order:
//!
//! 1. night mode (global circuit breaker, measured in ticks)
//! 2. per-agent error cooldown (exponential backoff, wall clock)
//! 3. mandatory rest (every Nth successful request sits one out)
//! 4. per-agent minimum request interval
//! 5. global minimum request interval
//!
//! A denial is not an error: the engine substitutes an idle action
//! carrying the denial reason and the tick proceeds normally.
//!
//! All wall-clock reads go through a [`TimeSource`] so tests can drive
//! time by hand.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use agora_types::AgentId;

/// A monotonic clock, in fractional seconds from an arbitrary origin.
pub trait TimeSource: Send {
    /// The current time in seconds.
    fn now(&self) -> f64;
}

/// The production clock: seconds since limiter construction.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock anchored at now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A hand-driven clock for tests; clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<Mutex<f64>>);

impl ManualClock {
    /// A clock starting at `start` seconds.
    pub fn starting_at(start: f64) -> Self {
        Self(Arc::new(Mutex::new(start)))
    }

    /// Move time forward by `secs`.
    pub fn advance(&self, secs: f64) {
        if let Ok(mut now) = self.0.lock() {
            *now += secs;
        }
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        self.0.lock().map_or(0.0, |now| *now)
    }
}

const fn default_base_cooldown() -> f64 {
    5.0
}
const fn default_max_cooldown() -> f64 {
    120.0
}
const fn default_multiplier() -> f64 {
    2.0
}
const fn default_agent_interval() -> f64 {
    0.5
}
const fn default_global_interval() -> f64 {
    0.1
}
const fn default_rest_interval() -> u64 {
    5
}
const fn default_night_threshold() -> u32 {
    3
}
const fn default_night_duration() -> u64 {
    5
}

/// Tunable limits for the throttle.
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleConfig {
    /// Cooldown after a first provider error, in seconds.
    #[serde(default = "default_base_cooldown")]
    pub base_cooldown_secs: f64,
    /// Ceiling on any single cooldown, in seconds.
    #[serde(default = "default_max_cooldown")]
    pub max_cooldown_secs: f64,
    /// Backoff multiplier per additional consecutive error.
    #[serde(default = "default_multiplier")]
    pub cooldown_multiplier: f64,
    /// Minimum seconds between requests for one agent.
    #[serde(default = "default_agent_interval")]
    pub min_request_interval_secs: f64,
    /// Minimum seconds between any two requests system-wide.
    #[serde(default = "default_global_interval")]
    pub global_min_interval_secs: f64,
    /// Every Nth successful request triggers one mandatory rest.
    #[serde(default = "default_rest_interval")]
    pub mandatory_rest_interval: u64,
    /// Provider errors within one tick that trip night mode.
    #[serde(default = "default_night_threshold")]
    pub night_error_threshold: u32,
    /// How many ticks night mode lasts once tripped.
    #[serde(default = "default_night_duration")]
    pub night_duration_ticks: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_cooldown_secs: default_base_cooldown(),
            max_cooldown_secs: default_max_cooldown(),
            cooldown_multiplier: default_multiplier(),
            min_request_interval_secs: default_agent_interval(),
            global_min_interval_secs: default_global_interval(),
            mandatory_rest_interval: default_rest_interval(),
            night_error_threshold: default_night_threshold(),
            night_duration_ticks: default_night_duration(),
        }
    }
}

/// The answer to "may this agent call the provider right now?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleVerdict {
    /// Go ahead.
    Allowed,
    /// Not now; the reason is surfaced in the substituted idle action.
    Denied {
        /// Human-readable denial reason.
        reason: String,
    },
}

impl ThrottleVerdict {
    /// Whether the request may proceed.
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    fn denied(reason: impl Into<String>) -> Self {
        Self::Denied {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct AgentThrottle {
    consecutive_errors: u32,
    total_requests: u64,
    successful_requests: u64,
    cooldown_until: f64,
    last_request: Option<f64>,
    last_error_time: Option<f64>,
    resting: bool,
}

/// The provider gate: per-agent backoff plus global pacing and the
/// night-mode circuit breaker.
pub struct RateLimiter {
    config: ThrottleConfig,
    clock: Box<dyn TimeSource>,
    agents: BTreeMap<AgentId, AgentThrottle>,
    last_global_request: Option<f64>,
    current_tick: u64,
    errors_this_tick: u32,
    night_mode: bool,
    night_started_tick: u64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("tracked_agents", &self.agents.len())
            .field("current_tick", &self.current_tick)
            .field("night_mode", &self.night_mode)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}

impl RateLimiter {
    /// A limiter on the system clock.
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock::new()))
    }

    /// A limiter reading time from an injected clock.
    pub fn with_clock(config: ThrottleConfig, clock: Box<dyn TimeSource>) -> Self {
        Self {
            config,
            clock,
            agents: BTreeMap::new(),
            last_global_request: None,
            current_tick: 0,
            errors_this_tick: 0,
            night_mode: false,
            night_started_tick: 0,
        }
    }

    /// Decide whether `agent` may call the provider right now.
    ///
    /// Checks fire in a fixed order; the first to deny wins. A pending
    /// mandatory rest is consumed by the denial it causes, so it blocks
    /// exactly one request.
    pub fn can_make_request(&mut self, agent: &AgentId) -> ThrottleVerdict {
        let now = self.clock.now();

        if self.night_mode {
            let remaining = self.night_ticks_remaining();
            return ThrottleVerdict::denied(format!(
                "Night mode active (rest period). {remaining} ticks remaining."
            ));
        }

        let state = self.agents.entry(agent.clone()).or_default();

        if now < state.cooldown_until {
            let remaining = state.cooldown_until - now;
            return ThrottleVerdict::denied(format!(
                "Rate limited. Cooldown: {remaining:.1}s remaining"
            ));
        }

        if state.resting {
            state.resting = false;
            return ThrottleVerdict::denied("Mandatory rest period (preventing API overload)");
        }

        if let Some(last) = state.last_request {
            let elapsed = now - last;
            if elapsed < self.config.min_request_interval_secs {
                let wait = self.config.min_request_interval_secs - elapsed;
                return ThrottleVerdict::denied(format!(
                    "Too soon since last request. Wait {wait:.2}s"
                ));
            }
        }

        if let Some(last) = self.last_global_request {
            let elapsed = now - last;
            if elapsed < self.config.global_min_interval_secs {
                let wait = self.config.global_min_interval_secs - elapsed;
                return ThrottleVerdict::denied(format!("Global rate limit. Wait {wait:.2}s"));
            }
        }

        ThrottleVerdict::Allowed
    }

    /// Record that a provider call is being issued for `agent`.
    pub fn record_request_start(&mut self, agent: &AgentId) {
        let now = self.clock.now();
        let state = self.agents.entry(agent.clone()).or_default();
        state.last_request = Some(now);
        state.total_requests = state.total_requests.saturating_add(1);
        self.last_global_request = Some(now);
    }

    /// Record a successful provider call.
    ///
    /// Resets the agent's error streak; every Nth success queues one
    /// mandatory rest so no agent can monopolize the provider.
    pub fn record_request_success(&mut self, agent: &AgentId) {
        let rest_interval = self.config.mandatory_rest_interval;
        let state = self.agents.entry(agent.clone()).or_default();
        state.consecutive_errors = 0;
        state.successful_requests = state.successful_requests.saturating_add(1);
        if state.successful_requests.checked_rem(rest_interval) == Some(0) {
            state.resting = true;
            debug!(agent_id = %agent, "mandatory rest queued");
        }
    }

    /// Record a failed provider call.
    ///
    /// Starts (or extends) the agent's exponential cooldown; an error
    /// message mentioning rate limits doubles it. Enough errors within
    /// one tick trip night mode for the whole system.
    pub fn record_request_error(&mut self, agent: &AgentId, message: &str) {
        let now = self.clock.now();
        let state = self.agents.entry(agent.clone()).or_default();
        state.consecutive_errors = state.consecutive_errors.saturating_add(1);
        state.last_error_time = Some(now);

        let exponent = f64::from(state.consecutive_errors.saturating_sub(1).min(5));
        let mut cooldown = self.config.base_cooldown_secs
            * self.config.cooldown_multiplier.powf(exponent);
        cooldown = cooldown.min(self.config.max_cooldown_secs);

        let lowered = message.to_lowercase();
        if lowered.contains("rate") || lowered.contains("too many") {
            cooldown = (cooldown * 2.0).min(self.config.max_cooldown_secs);
        }
        state.cooldown_until = now + cooldown;

        warn!(
            agent_id = %agent,
            consecutive_errors = state.consecutive_errors,
            cooldown_secs = cooldown,
            error = message,
            "provider error recorded"
        );

        self.errors_this_tick = self.errors_this_tick.saturating_add(1);
        if !self.night_mode && self.errors_this_tick >= self.config.night_error_threshold {
            self.trigger_night_mode(self.config.night_duration_ticks);
        }
    }

    /// Advance the limiter to `tick`.
    ///
    /// Resets the per-tick error counter and ends night mode once its
    /// duration has elapsed, clearing any queued rests with it.
    pub fn set_tick(&mut self, tick: u64) {
        self.current_tick = tick;
        self.errors_this_tick = 0;
        if self.night_mode
            && tick >= self.night_started_tick.saturating_add(self.config.night_duration_ticks)
        {
            self.night_mode = false;
            self.clear_all_rests();
            info!(tick, "night mode ended");
        }
    }

    /// Trip night mode for `duration_ticks`, starting now.
    ///
    /// Queued mandatory rests are cleared; night mode supersedes them.
    pub fn trigger_night_mode(&mut self, duration_ticks: u64) {
        self.night_mode = true;
        self.night_started_tick = self.current_tick;
        self.config.night_duration_ticks = duration_ticks;
        self.clear_all_rests();
        warn!(
            tick = self.current_tick,
            duration_ticks, "night mode engaged"
        );
    }

    /// Whether night mode is currently active.
    pub const fn is_night_mode(&self) -> bool {
        self.night_mode
    }

    fn night_ticks_remaining(&self) -> u64 {
        self.night_started_tick
            .saturating_add(self.config.night_duration_ticks)
            .saturating_sub(self.current_tick)
    }

    /// Clear a queued mandatory rest for one agent.
    pub fn clear_rest(&mut self, agent: &AgentId) {
        if let Some(state) = self.agents.get_mut(agent) {
            state.resting = false;
        }
    }

    /// Clear every queued mandatory rest.
    pub fn clear_all_rests(&mut self) {
        for state in self.agents.values_mut() {
            state.resting = false;
        }
    }

    /// Forget everything tracked about one agent.
    pub fn reset_agent(&mut self, agent: &AgentId) {
        self.agents.remove(agent);
    }

    /// Forget all throttle state, including night mode.
    pub fn reset_all(&mut self) {
        self.agents.clear();
        self.last_global_request = None;
        self.errors_this_tick = 0;
        self.night_mode = false;
        self.night_started_tick = 0;
    }

    /// Seconds until `agent` could next be allowed, 0 when allowed now.
    pub fn get_wait_time(&self, agent: &AgentId) -> f64 {
        let now = self.clock.now();
        let mut wait: f64 = 0.0;
        if let Some(state) = self.agents.get(agent) {
            wait = wait.max(state.cooldown_until - now);
            if let Some(last) = state.last_request {
                wait = wait.max(self.config.min_request_interval_secs - (now - last));
            }
        }
        if let Some(last) = self.last_global_request {
            wait = wait.max(self.config.global_min_interval_secs - (now - last));
        }
        wait.max(0.0)
    }

    /// Observability snapshot for one agent.
    pub fn get_agent_status(&self, agent: &AgentId) -> serde_json::Value {
        let now = self.clock.now();
        self.agents.get(agent).map_or_else(
            || json!({ "tracked": false }),
            |state| {
                json!({
                    "tracked": true,
                    "consecutive_errors": state.consecutive_errors,
                    "total_requests": state.total_requests,
                    "successful_requests": state.successful_requests,
                    "resting": state.resting,
                    "seconds_since_last_error": state.last_error_time.map(|t| now - t),
                    "cooldown_remaining_secs": (state.cooldown_until - now).max(0.0),
                })
            },
        )
    }

    /// Observability snapshot for the whole limiter.
    pub fn get_global_status(&self) -> serde_json::Value {
        json!({
            "current_tick": self.current_tick,
            "tracked_agents": self.agents.len(),
            "errors_this_tick": self.errors_this_tick,
            "night_mode": self.night_mode,
            "night_ticks_remaining": if self.night_mode { self.night_ticks_remaining() } else { 0 },
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn limiter(clock: &ManualClock) -> RateLimiter {
        RateLimiter::with_clock(ThrottleConfig::default(), Box::new(clock.clone()))
    }

    fn agent(id: &str) -> AgentId {
        AgentId::new(id)
    }

    #[test]
    fn first_request_is_allowed() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        assert!(limiter.can_make_request(&agent("a")).is_allowed());
    }

    #[test]
    fn per_agent_interval_denies_rapid_requests() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        limiter.record_request_start(&a);
        clock.advance(0.2);
        let verdict = limiter.can_make_request(&a);
        match verdict {
            ThrottleVerdict::Denied { reason } => {
                assert!(reason.starts_with("Too soon since last request"));
            }
            ThrottleVerdict::Allowed => panic!("expected denial"),
        }
        clock.advance(0.4);
        assert!(limiter.can_make_request(&a).is_allowed());
    }

    #[test]
    fn global_interval_spans_agents() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        limiter.record_request_start(&agent("a"));
        clock.advance(0.05);
        let verdict = limiter.can_make_request(&agent("b"));
        match verdict {
            ThrottleVerdict::Denied { reason } => {
                assert!(reason.starts_with("Global rate limit"));
            }
            ThrottleVerdict::Allowed => panic!("expected denial"),
        }
        clock.advance(0.1);
        assert!(limiter.can_make_request(&agent("b")).is_allowed());
    }

    #[test]
    fn error_cooldown_backs_off_exponentially() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");

        limiter.record_request_error(&a, "boom");
        let wait = limiter.get_wait_time(&a);
        assert!((4.9..=5.1).contains(&wait), "first error waits ~5s, got {wait}");

        limiter.record_request_error(&a, "boom");
        let wait = limiter.get_wait_time(&a);
        assert!((9.9..=10.1).contains(&wait), "second error waits ~10s, got {wait}");

        limiter.record_request_error(&a, "boom");
        let wait = limiter.get_wait_time(&a);
        assert!((19.9..=20.1).contains(&wait), "third error waits ~20s, got {wait}");
    }

    #[test]
    fn cooldown_caps_at_maximum() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        for _ in 0..12 {
            limiter.record_request_error(&a, "boom");
        }
        let wait = limiter.get_wait_time(&a);
        assert!(wait <= 120.0 + 0.1, "capped at 120s, got {wait}");
    }

    #[test]
    fn rate_limit_wording_doubles_cooldown() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        limiter.record_request_error(&a, "HTTP 429: Too Many Requests");
        let wait = limiter.get_wait_time(&a);
        assert!((9.9..=10.1).contains(&wait), "doubled base, got {wait}");
    }

    #[test]
    fn success_resets_error_streak() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        limiter.record_request_error(&a, "boom");
        limiter.record_request_error(&a, "boom");
        clock.advance(30.0);
        limiter.record_request_success(&a);
        limiter.record_request_error(&a, "boom");
        // Streak restarted: back to the base cooldown.
        let wait = limiter.get_wait_time(&a);
        assert!((4.9..=5.1).contains(&wait), "reset to ~5s, got {wait}");
    }

    #[test]
    fn every_fifth_success_forces_one_rest() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        for _ in 0..5 {
            limiter.record_request_success(&a);
        }
        let verdict = limiter.can_make_request(&a);
        match verdict {
            ThrottleVerdict::Denied { reason } => {
                assert!(reason.contains("rest"), "unexpected reason: {reason}");
            }
            ThrottleVerdict::Allowed => panic!("expected mandatory rest"),
        }
        // The rest blocks exactly one request.
        assert!(limiter.can_make_request(&a).is_allowed());
    }

    #[test]
    fn repeated_errors_trip_night_mode() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        limiter.set_tick(10);
        limiter.record_request_error(&agent("a"), "boom");
        limiter.record_request_error(&agent("b"), "boom");
        assert!(!limiter.is_night_mode());
        limiter.record_request_error(&agent("c"), "boom");
        assert!(limiter.is_night_mode());

        let verdict = limiter.can_make_request(&agent("d"));
        match verdict {
            ThrottleVerdict::Denied { reason } => {
                assert_eq!(reason, "Night mode active (rest period). 5 ticks remaining.");
            }
            ThrottleVerdict::Allowed => panic!("expected night-mode denial"),
        }
    }

    #[test]
    fn night_mode_ends_after_its_duration() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        limiter.set_tick(10);
        limiter.trigger_night_mode(5);
        limiter.set_tick(14);
        assert!(limiter.is_night_mode());
        limiter.set_tick(15);
        assert!(!limiter.is_night_mode());
        clock.advance(600.0);
        assert!(limiter.can_make_request(&agent("a")).is_allowed());
    }

    #[test]
    fn night_mode_supersedes_queued_rests() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        for _ in 0..5 {
            limiter.record_request_success(&a);
        }
        assert_eq!(limiter.get_agent_status(&a)["resting"], true);
        limiter.trigger_night_mode(5);
        assert_eq!(limiter.get_agent_status(&a)["resting"], false);
    }

    #[test]
    fn night_mode_errors_reset_each_tick() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        limiter.set_tick(1);
        limiter.record_request_error(&agent("a"), "boom");
        limiter.record_request_error(&agent("b"), "boom");
        limiter.set_tick(2);
        limiter.record_request_error(&agent("c"), "boom");
        // Two in tick 1, one in tick 2: threshold of three never met.
        assert!(!limiter.is_night_mode());
    }

    #[test]
    fn statuses_report_state() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        limiter.record_request_success(&a);
        let status = limiter.get_agent_status(&a);
        assert_eq!(status["successful_requests"], 1);
        assert_eq!(status["consecutive_errors"], 0);
        let global = limiter.get_global_status();
        assert_eq!(global["tracked_agents"], 1);
        assert_eq!(global["night_mode"], false);
        assert_eq!(
            limiter.get_agent_status(&agent("ghost"))["tracked"],
            false
        );
    }

    #[test]
    fn reset_all_clears_everything() {
        let clock = ManualClock::starting_at(100.0);
        let mut limiter = limiter(&clock);
        let a = agent("a");
        limiter.record_request_error(&a, "boom");
        limiter.trigger_night_mode(5);
        limiter.reset_all();
        assert!(!limiter.is_night_mode());
        assert!(limiter.can_make_request(&a).is_allowed());
    }
}
