//! Per-asset strategy loop.
//!
//! One [`StrategyLoop`] runs on its own thread for each registered asset:
//! fetch bars, compute indicators, evaluate, gate, dispatch, then sleep.
//! Failures end the current cycle only. The sleep after a failure follows
//! [`TraderError::retry_policy`]; a panic inside a cycle is caught and
//! treated like a terminal failure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::domain::bar::validate_bars;
use crate::domain::error::{RetryPolicy, TraderError};
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::order::{self, Fill, OrderPlan, OrderSide};
use crate::domain::risk::{GateRejection, RiskGate};
use crate::domain::signal::{self, Evaluation, TrendDirection};
use crate::domain::strategy::StrategyConfig;
use crate::domain::timeframe::Timeframe;
use crate::ports::clock_port::Clock;
use crate::ports::log_port::LogSink;
use crate::ports::terminal_port::TerminalPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Stop flag whose waiters wake as soon as a stop is requested.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        *stopped = true;
        self.wake.notify_all();
    }

    /// Clears a previous stop so the owner can be started again.
    pub fn resume(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleeps up to `timeout`. Returns `true` if a stop was requested
    /// before or during the wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Point-in-time view of one asset's loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyStatus {
    pub asset: String,
    pub timeframe: Timeframe,
    pub lot: f64,
    pub state: LoopState,
    pub last_ticket: Option<u64>,
    pub cycles: u64,
}

/// Identity and mutable run state of one asset's strategy.
#[derive(Debug)]
pub struct AssetStrategy {
    asset: String,
    timeframe: Timeframe,
    lot: f64,
    stop: StopSignal,
    last_ticket: Mutex<Option<u64>>,
    cycles: AtomicU64,
}

impl AssetStrategy {
    pub fn new(asset: &str, timeframe: Timeframe, lot: f64) -> Self {
        Self {
            asset: asset.to_string(),
            timeframe,
            lot,
            stop: StopSignal::new(),
            last_ticket: Mutex::new(None),
            cycles: AtomicU64::new(0),
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn lot(&self) -> f64 {
        self.lot
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn state(&self) -> LoopState {
        if self.stop.is_stopped() {
            LoopState::Stopped
        } else {
            LoopState::Running
        }
    }

    pub fn last_ticket(&self) -> Option<u64> {
        *self.last_ticket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_ticket(&self, ticket: u64) {
        *self.last_ticket.lock().unwrap_or_else(PoisonError::into_inner) = Some(ticket);
    }

    pub fn status(&self) -> StrategyStatus {
        StrategyStatus {
            asset: self.asset.clone(),
            timeframe: self.timeframe,
            lot: self.lot,
            state: self.state(),
            last_ticket: self.last_ticket(),
            cycles: self.cycles.load(Ordering::Relaxed),
        }
    }
}

/// Indicators and evaluation for the latest closed bar.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub snapshot: IndicatorSnapshot,
    pub evaluation: Evaluation,
}

impl Analysis {
    /// Order plan for the candidate direction, if any.
    pub fn plan(&self, min_reward_risk: f64) -> Result<Option<OrderPlan>, TraderError> {
        match self.evaluation.candidate.side() {
            Some(side) => order::plan_order(
                side,
                self.snapshot.latest_atr(),
                self.evaluation.trend.strength,
                min_reward_risk,
            )
            .map(Some),
            None => Ok(None),
        }
    }
}

/// How a completed cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Hold,
    Rejected {
        side: OrderSide,
        rejection: GateRejection,
    },
    Filled(Fill),
}

pub struct StrategyLoop {
    strategy: Arc<AssetStrategy>,
    config: Arc<StrategyConfig>,
    terminal: Arc<dyn TerminalPort>,
    clock: Arc<dyn Clock>,
    log: Arc<dyn LogSink>,
}

impl StrategyLoop {
    pub fn new(
        strategy: Arc<AssetStrategy>,
        config: Arc<StrategyConfig>,
        terminal: Arc<dyn TerminalPort>,
        clock: Arc<dyn Clock>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            strategy,
            config,
            terminal,
            clock,
            log,
        }
    }

    pub fn strategy(&self) -> &Arc<AssetStrategy> {
        &self.strategy
    }

    /// Runs cycles until a stop is requested. A stop during a sleep ends
    /// the loop immediately; a stop during a cycle ends it once the cycle
    /// returns.
    pub fn run(&self) {
        let asset = self.strategy.asset();
        debug!(asset, timeframe = %self.strategy.timeframe(), "strategy loop started");
        self.log.log(
            asset,
            &format!(
                "strategy started on {} with lot {}",
                self.strategy.timeframe(),
                self.strategy.lot()
            ),
        );

        while !self.strategy.stop.is_stopped() {
            let pause = self.step();
            if self.strategy.stop.wait(pause) {
                break;
            }
        }

        self.log.log(asset, "strategy stopped");
        debug!(asset, "strategy loop exited");
    }

    /// One guarded cycle. Returns how long to sleep before the next one.
    fn step(&self) -> Duration {
        let engine = &self.config.engine;
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()));
        self.strategy.cycles.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(Ok(_)) => engine.cycle_interval,
            Ok(Err(err)) => {
                self.warn(&format!("cycle failed: {err}"));
                match err.retry_policy() {
                    RetryPolicy::Normal => engine.cycle_interval,
                    RetryPolicy::Backoff => engine.backoff_interval,
                }
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                self.warn(&format!("cycle panicked: {reason}"));
                engine.backoff_interval
            }
        }
    }

    /// Fetches bars, validates them and evaluates the latest readings.
    pub fn analyse(&self) -> Result<Analysis, TraderError> {
        let asset = self.strategy.asset();
        let bars = self
            .terminal
            .fetch_bars(asset, self.strategy.timeframe(), self.config.engine.bar_count)
            .map_err(|err| TraderError::FetchFailed {
                asset: asset.to_string(),
                reason: err.to_string(),
            })?;
        validate_bars(asset, &bars, self.config.engine.min_bars)?;

        let snapshot = IndicatorSnapshot::compute(&bars, &self.config.indicators)?;
        let evaluation = signal::evaluate(&snapshot, &self.config.signal)?;
        Ok(Analysis {
            snapshot,
            evaluation,
        })
    }

    pub fn run_cycle(&self) -> Result<CycleOutcome, TraderError> {
        let asset = self.strategy.asset();
        let analysis = self.analyse()?;
        let evaluation = &analysis.evaluation;
        self.report(evaluation);

        let Some(candidate) = evaluation.candidate.side() else {
            return Ok(CycleOutcome::Hold);
        };

        let gate = RiskGate::new(self.terminal.as_ref(), self.clock.as_ref(), &self.config.risk)
            .check_entry()?;
        let decision = signal::decide(evaluation, &gate);
        if let Err(rejection) = gate {
            self.say(&format!("{candidate} signal held back: {rejection}"));
            return Ok(CycleOutcome::Rejected {
                side: candidate,
                rejection,
            });
        }
        let Some(side) = decision.side() else {
            return Ok(CycleOutcome::Hold);
        };

        self.say(&format!(
            "{side} signal confirmed ({} confirmations)",
            match side {
                OrderSide::Buy => evaluation.buy_confirmations,
                OrderSide::Sell => evaluation.sell_confirmations,
            }
        ));

        let Some(plan) = analysis.plan(self.config.risk.min_reward_risk)? else {
            return Ok(CycleOutcome::Hold);
        };
        self.say(&format!(
            "entry parameters: ATR {:.2}, strength {}/5, SL x{:.2} ({:.2} pts), TP x{:.2} ({:.2} pts)",
            analysis.snapshot.latest_atr(),
            plan.strength,
            plan.sl_multiplier,
            plan.sl_distance,
            plan.tp_multiplier,
            plan.tp_distance
        ));

        let fill = order::dispatch(
            self.terminal.as_ref(),
            asset,
            &plan,
            self.strategy.lot(),
            &self.config.risk,
            &self.config.order,
        )?;
        self.strategy.record_ticket(fill.ticket);

        let req = &fill.request;
        self.say(&format!(
            "{} order filled: ticket {}, volume {}, price {:.5}, SL {:.5}, TP {:.5}",
            req.side, fill.ticket, req.volume, req.price, req.stop_loss, req.take_profit
        ));
        Ok(CycleOutcome::Filled(fill))
    }

    /// Detailed analysis lines for a trending market.
    fn report(&self, ev: &Evaluation) {
        let trend = ev.trend;
        if trend.direction == TrendDirection::Flat {
            self.say("no clear trend");
            return;
        }

        let stars: String = (0..5)
            .map(|i| if i < trend.strength { '*' } else { '.' })
            .collect();
        let rsi_zone = if ev.rsi > self.config.signal.rsi_overbought {
            "overbought"
        } else if ev.rsi < self.config.signal.rsi_oversold {
            "oversold"
        } else {
            "neutral"
        };

        self.say(&format!("detailed analysis: {} trend", trend.direction));
        self.say(&format!("  strength: [{stars}] ({}/5)", trend.strength));
        self.say(&format!("  RSI: {:.1} ({rsi_zone})", ev.rsi));
        self.say(&format!("  stochastic %K: {:.1}", ev.stoch_k));
        self.say(&format!("  momentum: {:.2}", ev.momentum));
        self.say(&format!(
            "  volume: {}",
            if ev.volume_high { "high" } else { "normal" }
        ));
        self.say(&format!(
            "  MACD: {}",
            if ev.macd_above_signal { "positive" } else { "negative" }
        ));

        let confirmed = match trend.direction {
            TrendDirection::Up => ev.macd_buy || ev.rsi_buy,
            TrendDirection::Down => ev.macd_sell || ev.rsi_sell,
            TrendDirection::Flat => false,
        };
        if confirmed {
            self.say(&format!("{} trend with technical confirmation", trend.direction));
        } else {
            self.say(&format!("{} trend detected, awaiting confirmation", trend.direction));
        }
    }

    /// Status lines are suppressed once a stop has been requested.
    fn say(&self, message: &str) {
        if !self.strategy.stop.is_stopped() {
            self.log.log(self.strategy.asset(), message);
        }
    }

    fn warn(&self, message: &str) {
        if !self.strategy.stop.is_stopped() {
            self.log.warn(self.strategy.asset(), message);
        }
    }
}
