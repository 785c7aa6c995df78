//! End-to-end tests of the evaluation, gating and dispatch pipeline against
//! a scripted terminal.
//!
//! Tests cover:
//! - Trend and reversal scenarios through the full indicator set
//! - Risk gate rejections inside a strategy cycle
//! - Dispatch outcomes (fill, terminal rejection, spread re-check, sizing)
//! - Failure classification and retry policy
//! - Coordinator registry and thread lifecycle

mod common;

use common::*;
use multitrader::domain::error::{RetryPolicy, TraderError};
use multitrader::domain::order::OrderSide;
use multitrader::domain::risk::GateRejection;
use multitrader::domain::signal::{SignalDecision, TrendDirection};
use multitrader::domain::strategy::StrategyConfig;
use multitrader::domain::strategy_loop::{AssetStrategy, CycleOutcome, StrategyLoop};
use multitrader::domain::timeframe::Timeframe;
use std::sync::Arc;
use std::time::{Duration, Instant};

const ASSET: &str = "WIN";

struct Harness {
    terminal: Arc<MockTerminal>,
    log: Arc<RecordingLogSink>,
    worker: StrategyLoop,
}

fn harness_with(terminal: MockTerminal, clock: FixedClock, config: StrategyConfig) -> Harness {
    let terminal = Arc::new(terminal);
    let log = Arc::new(RecordingLogSink::new());
    let worker = StrategyLoop::new(
        Arc::new(AssetStrategy::new(ASSET, Timeframe::M5, 1.0)),
        Arc::new(config),
        terminal.clone(),
        Arc::new(clock),
        log.clone(),
    );
    Harness {
        terminal,
        log,
        worker,
    }
}

fn harness(bars: Vec<multitrader::domain::bar::PriceBar>) -> Harness {
    harness_with(
        MockTerminal::new().with_asset(ASSET, bars, 0.05),
        FixedClock::at(10, 0),
        StrategyConfig::default(),
    )
}

/// 190 bars falling by 1.0, then three bars rising by 0.2: deeply oversold
/// with RSI and MACD both turning up, but no trend.
fn reversal_bars() -> Vec<multitrader::domain::bar::PriceBar> {
    let mut closes: Vec<f64> = (0..190).map(|i| 400.0 - i as f64).collect();
    let last = closes[closes.len() - 1];
    closes.extend((1..=3).map(|j| last + 0.2 * j as f64));
    bars_from_closes(&closes, &[], 0.2)
}

/// Clean 0.5-per-bar uptrend, a two-bar drop of 5.0, nine flat bars, then
/// three bars rising by 2.0 on a volume spike: RSI climbs out of the mid
/// twenties while the MACD line crosses back above its signal line.
fn pullback_recovery_bars() -> Vec<multitrader::domain::bar::PriceBar> {
    let mut closes: Vec<f64> = (0..186).map(|i| 100.0 + i as f64 * 0.5).collect();
    let tail = [-5.0, -5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0];
    for step in tail {
        let last = closes[closes.len() - 1];
        closes.push(last + step);
    }
    let mut volumes = vec![100u64; closes.len()];
    if let Some(last) = volumes.last_mut() {
        *last = 500;
    }
    bars_from_closes(&closes, &volumes, 0.2)
}

mod signal_scenarios {
    use super::*;
    use multitrader::domain::indicator::snapshot::back;

    #[test]
    fn uptrend_recovery_with_macd_cross_buys_end_to_end() {
        let bars = pullback_recovery_bars();
        assert_eq!(bars.len(), 200);
        let h = harness(bars);
        let analysis = h.worker.analyse().unwrap();
        let snap = &analysis.snapshot;
        let ev = &analysis.evaluation;

        let rsi = [back(&snap.rsi, 2), back(&snap.rsi, 1), back(&snap.rsi, 0)];
        assert!(rsi[0] > 20.0 && rsi[0] < 27.0, "rsi two bars ago {}", rsi[0]);
        assert!(rsi[0] < rsi[1] && rsi[1] < rsi[2]);
        assert!(rsi[2] > 33.0 && rsi[2] < 40.0, "latest rsi {}", rsi[2]);

        assert!(back(&snap.macd_line, 1) < back(&snap.signal_line, 1));
        assert!(back(&snap.macd_line, 0) > back(&snap.signal_line, 0));
        assert!(back(&snap.macd_line, 0) > back(&snap.macd_line, 1));
        assert!(ev.macd_buy);

        assert_eq!(ev.trend.direction, TrendDirection::Up);
        assert!(ev.trend.strength >= 3);
        assert_eq!(ev.candidate, SignalDecision::Buy);

        let plan = analysis.plan(1.2).unwrap().unwrap();
        assert_eq!(plan.side, OrderSide::Buy);
        assert!(plan.sl_distance > 0.0);
        assert!(plan.tp_distance > plan.sl_distance * 1.2);

        match h.worker.run_cycle().unwrap() {
            CycleOutcome::Filled(fill) => assert_eq!(fill.request.side, OrderSide::Buy),
            other => panic!("expected a fill, got {other:?}"),
        }
        assert_eq!(h.terminal.submitted().len(), 1);
    }

    #[test]
    fn uptrend_with_volume_spike_buys() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        let analysis = h.worker.analyse().unwrap();
        let ev = &analysis.evaluation;

        assert_eq!(ev.trend.direction, TrendDirection::Up);
        assert_eq!(ev.trend.strength, 4);
        assert!(ev.volume_high);
        assert_eq!(ev.buy_confirmations, 4);
        assert_eq!(ev.candidate, SignalDecision::Buy);
        assert_approx(analysis.snapshot.latest_atr(), 0.7, 1e-6);
    }

    #[test]
    fn downtrend_with_volume_spike_sells() {
        let h = harness(downtrend_bars(200, 300.0, 0.5));
        let ev = h.worker.analyse().unwrap().evaluation;

        assert_eq!(ev.trend.direction, TrendDirection::Down);
        assert_eq!(ev.trend.strength, 4);
        assert_eq!(ev.sell_confirmations, 4);
        assert_eq!(ev.candidate, SignalDecision::Sell);
    }

    #[test]
    fn oversold_reversal_buys_without_trend() {
        let h = harness(reversal_bars());
        let analysis = h.worker.analyse().unwrap();
        let ev = &analysis.evaluation;

        assert_eq!(ev.trend.direction, TrendDirection::Flat);
        assert_eq!(ev.trend.strength, 0);
        assert!(ev.rsi_buy);
        assert!(ev.macd_buy);
        assert!(ev.rsi < 30.0);
        assert_eq!(ev.buy_confirmations, 2);
        assert_eq!(ev.candidate, SignalDecision::Buy);

        let plan = analysis.plan(1.2).unwrap().unwrap();
        assert_eq!(plan.side, OrderSide::Buy);
        assert_approx(plan.sl_multiplier, 1.0, 1e-9);
        assert_approx(plan.tp_multiplier, 1.2, 1e-9);
    }

    #[test]
    fn flat_market_holds_without_touching_the_gate() {
        let h = harness(flat_bars(200, 150.0));
        h.terminal.set_positions(99);
        let outcome = h.worker.run_cycle().unwrap();
        assert_eq!(outcome, CycleOutcome::Hold);
        assert!(h.terminal.submitted().is_empty());
        assert!(h.log.contains("no clear trend"));
    }
}

mod gated_cycles {
    use super::*;

    #[test]
    fn full_position_book_rejects_buy() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        h.terminal.set_positions(3);

        let outcome = h.worker.run_cycle().unwrap();
        assert_eq!(
            outcome,
            CycleOutcome::Rejected {
                side: OrderSide::Buy,
                rejection: GateRejection::MaxPositions { open: 3, max: 3 },
            }
        );
        assert!(h.terminal.submitted().is_empty());
        assert!(h.log.contains("maximum positions reached (3/3)"));
        assert!(h.log.warnings().is_empty());
    }

    #[test]
    fn drawdown_over_limit_rejects() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        h.terminal.set_equity(9_600.0);
        let outcome = h.worker.run_cycle().unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Rejected {
                rejection: GateRejection::Drawdown { .. },
                ..
            }
        ));
        assert!(h.terminal.submitted().is_empty());
    }

    #[test]
    fn outside_session_rejects() {
        let h = harness_with(
            MockTerminal::new().with_asset(ASSET, uptrend_bars(200, 100.0, 0.5), 0.05),
            FixedClock::at(8, 30),
            StrategyConfig::default(),
        );
        let outcome = h.worker.run_cycle().unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::Rejected {
                rejection: GateRejection::OutsideSession { .. },
                ..
            }
        ));
    }

    #[test]
    fn session_end_is_inclusive() {
        let h = harness_with(
            MockTerminal::new().with_asset(ASSET, uptrend_bars(200, 100.0, 0.5), 0.05),
            FixedClock::at(17, 30),
            StrategyConfig::default(),
        );
        assert!(matches!(h.worker.run_cycle().unwrap(), CycleOutcome::Filled(_)));
    }
}

mod dispatch {
    use super::*;

    #[test]
    fn buy_fills_at_ask_with_atr_scaled_levels() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        let outcome = h.worker.run_cycle().unwrap();

        let CycleOutcome::Filled(fill) = outcome else {
            panic!("expected a fill, got {outcome:?}");
        };
        let req = &fill.request;
        assert_eq!(fill.ticket, 1000);
        assert_eq!(req.side, OrderSide::Buy);
        assert_eq!(req.asset, ASSET);
        assert_approx(req.volume, 1.0, 1e-12);
        assert_approx(req.price, 199.55, 1e-9);
        // ATR 0.7, strength 4: SL 0.7 x 1.4, TP 0.7 x 1.2 x 2.0, in points
        assert_approx(req.price - req.stop_loss, 0.98 * 0.01, 1e-9);
        assert_approx(req.take_profit - req.price, 1.68 * 0.01, 1e-9);
        assert_eq!(req.magic, 123_456);
        assert_eq!(req.deviation, 10);
        assert_eq!(req.tag, "multitrader");

        assert_eq!(h.terminal.submitted().len(), 1);
        assert_eq!(h.worker.strategy().last_ticket(), Some(1000));
        assert!(h.log.contains("BUY order filled: ticket 1000"));
    }

    #[test]
    fn sell_fills_at_bid() {
        let h = harness(downtrend_bars(200, 300.0, 0.5));
        let CycleOutcome::Filled(fill) = h.worker.run_cycle().unwrap() else {
            panic!("expected a fill");
        };
        let req = &fill.request;
        assert_eq!(req.side, OrderSide::Sell);
        assert_approx(req.price, 200.5, 1e-9);
        assert!(req.stop_loss > req.price);
        assert!(req.take_profit < req.price);
    }

    #[test]
    fn wide_spread_blocks_dispatch() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        h.terminal.set_tick(ASSET, 199.5, 199.5 + 0.6);

        let err = h.worker.run_cycle().unwrap_err();
        match &err {
            TraderError::MarketUnavailable { asset, reason } => {
                assert_eq!(asset, ASSET);
                assert_eq!(reason, "spread too wide (60.0 points, max 50.0)");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(err.retry_policy(), RetryPolicy::Normal);
        assert!(h.terminal.submitted().is_empty());
    }

    #[test]
    fn closed_market_blocks_dispatch() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        h.terminal.set_tick(ASSET, 0.0, 0.0);
        assert!(matches!(
            h.worker.run_cycle(),
            Err(TraderError::MarketUnavailable { .. })
        ));
    }

    #[test]
    fn terminal_rejection_is_reported_once() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        *h.terminal.reject_with.lock().unwrap() = Some((10019, "No money".to_string()));

        let err = h.worker.run_cycle().unwrap_err();
        assert!(matches!(
            &err,
            TraderError::DispatchRejected { code: 10019, comment } if comment == "No money"
        ));
        assert_eq!(h.terminal.submitted().len(), 1);
        assert_eq!(h.worker.strategy().last_ticket(), None);
    }

    #[test]
    fn risk_based_volume_replaces_lot() {
        let mut config = StrategyConfig::default();
        config.risk.risk_per_trade_pct = 0.5;
        let h = harness_with(
            MockTerminal::new().with_asset(ASSET, uptrend_bars(200, 100.0, 0.5), 0.05),
            FixedClock::at(10, 0),
            config,
        );
        h.worker.run_cycle().unwrap();
        // 10000 x 0.5% / tick value 1.0
        assert_approx(h.terminal.submitted()[0].volume, 50.0, 1e-9);
    }
}

mod failures {
    use super::*;

    #[test]
    fn short_history_is_insufficient_data() {
        let h = harness(uptrend_bars(50, 100.0, 0.5));
        let err = h.worker.run_cycle().unwrap_err();
        assert!(matches!(
            err,
            TraderError::InsufficientData {
                bars: 50,
                minimum: 100,
                ..
            }
        ));
        assert_eq!(err.retry_policy(), RetryPolicy::Normal);
    }

    #[test]
    fn failed_fetch_skips_on_normal_interval() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        *h.terminal.fetch_error.lock().unwrap() = Some("timeout".to_string());
        let err = h.worker.run_cycle().unwrap_err();
        assert!(matches!(err, TraderError::FetchFailed { .. }));
        assert_eq!(err.retry_policy(), RetryPolicy::Normal);
    }

    #[test]
    fn terminal_failure_in_gate_backs_off() {
        let h = harness(uptrend_bars(200, 100.0, 0.5));
        *h.terminal.position_error.lock().unwrap() = Some("connection lost".to_string());
        let err = h.worker.run_cycle().unwrap_err();
        assert!(matches!(err, TraderError::Terminal { .. }));
        assert_eq!(err.retry_policy(), RetryPolicy::Backoff);
        assert!(h.terminal.submitted().is_empty());
    }

    #[test]
    fn unknown_asset_has_no_data() {
        let h = harness_with(
            MockTerminal::new(),
            FixedClock::at(10, 0),
            StrategyConfig::default(),
        );
        assert!(matches!(
            h.worker.run_cycle(),
            Err(TraderError::NoData { .. })
        ));
    }
}

mod coordinator_lifecycle {
    use super::*;
    use multitrader::domain::coordinator::Coordinator;
    use multitrader::domain::strategy_loop::LoopState;

    fn fast_config() -> StrategyConfig {
        let mut config = StrategyConfig::default();
        config.engine.cycle_interval = Duration::from_millis(10);
        config.engine.backoff_interval = Duration::from_millis(20);
        config
    }

    fn coordinator(terminal: Arc<MockTerminal>) -> Coordinator {
        Coordinator::new(terminal, Arc::new(FixedClock::at(10, 0)), fast_config())
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn add_is_idempotent_per_asset() {
        let terminal = Arc::new(MockTerminal::new().with_asset("WIN", flat_bars(200, 1.0), 0.01));
        let coordinator = coordinator(terminal);
        let log = Arc::new(RecordingLogSink::new());

        assert!(coordinator.add("WIN", Timeframe::M5, 1.0, log.clone()));
        assert!(!coordinator.add("WIN", Timeframe::M1, 2.0, log.clone()));
        assert!(coordinator.add("PETR4", Timeframe::M15, 100.0, log));
        assert_eq!(coordinator.assets(), vec!["PETR4", "WIN"]);

        let status = coordinator.status_of("WIN").unwrap();
        assert_eq!(status.timeframe, Timeframe::M5);
        assert_eq!(status.lot, 1.0);
        coordinator.shutdown();
    }

    #[test]
    fn remove_unknown_asset_is_false() {
        let coordinator = coordinator(Arc::new(MockTerminal::new()));
        assert!(!coordinator.remove("VALE3"));
    }

    #[test]
    fn remove_stops_and_deregisters() {
        let terminal = Arc::new(MockTerminal::new().with_asset("WIN", flat_bars(200, 1.0), 0.01));
        let coordinator = coordinator(terminal);
        let log = Arc::new(RecordingLogSink::new());
        coordinator.add("WIN", Timeframe::M5, 1.0, log.clone());

        assert!(coordinator.remove("WIN"));
        assert_eq!(coordinator.status_of("WIN"), None);
        assert!(coordinator.assets().is_empty());
        // remove joins the worker, so its final line is already written
        assert!(log.contains("strategy stopped"));
    }

    #[test]
    fn stop_all_then_start_all_resumes() {
        let terminal = Arc::new(MockTerminal::new().with_asset("WIN", flat_bars(200, 1.0), 0.01));
        let coordinator = coordinator(terminal);
        coordinator.add("WIN", Timeframe::M5, 1.0, Arc::new(RecordingLogSink::new()));
        assert!(wait_until(|| coordinator.status_of("WIN").unwrap().cycles > 0));

        coordinator.stop_all();
        coordinator.stop_all();
        assert_eq!(coordinator.status_of("WIN").unwrap().state, LoopState::Stopped);

        coordinator.start_all();
        let resumed = coordinator.status_of("WIN").unwrap();
        assert_eq!(resumed.state, LoopState::Running);
        let before = resumed.cycles;
        assert!(wait_until(|| coordinator.status_of("WIN").unwrap().cycles > before + 1));
        coordinator.shutdown();
        assert!(coordinator.assets().is_empty());
    }

    #[test]
    fn start_all_does_not_block_status_while_joining() {
        let terminal = Arc::new(MockTerminal::new().with_asset("WIN", flat_bars(200, 1.0), 0.01));
        terminal.set_fetch_delay(Duration::from_millis(1500));
        let coordinator = Arc::new(coordinator(terminal.clone()));
        coordinator.add("WIN", Timeframe::M5, 1.0, Arc::new(RecordingLogSink::new()));
        // the worker is now sleeping inside fetch_bars
        assert!(wait_until(|| terminal.fetch_count() > 0));

        coordinator.stop_all();
        let restarter = {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || coordinator.start_all())
        };
        std::thread::sleep(Duration::from_millis(100));

        let start = Instant::now();
        let status = coordinator.status_of("WIN").unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(status.state, LoopState::Stopped);
        assert_eq!(coordinator.assets(), vec!["WIN"]);

        *terminal.fetch_delay.lock().unwrap() = None;
        restarter.join().unwrap();
        assert_eq!(coordinator.status_of("WIN").unwrap().state, LoopState::Running);
        coordinator.shutdown();
    }

    #[test]
    fn remove_during_restart_is_not_respawned() {
        let terminal = Arc::new(MockTerminal::new().with_asset("WIN", flat_bars(200, 1.0), 0.01));
        terminal.set_fetch_delay(Duration::from_millis(800));
        let coordinator = Arc::new(coordinator(terminal.clone()));
        coordinator.add("WIN", Timeframe::M5, 1.0, Arc::new(RecordingLogSink::new()));
        assert!(wait_until(|| terminal.fetch_count() > 0));

        coordinator.stop_all();
        let restarter = {
            let coordinator = Arc::clone(&coordinator);
            std::thread::spawn(move || coordinator.start_all())
        };
        std::thread::sleep(Duration::from_millis(100));
        // the old worker was handed to start_all, so remove has nothing to join
        assert!(coordinator.remove("WIN"));
        restarter.join().unwrap();

        assert!(coordinator.assets().is_empty());
        assert_eq!(coordinator.status_of("WIN"), None);
    }

    #[test]
    fn loop_records_fill_ticket() {
        let terminal = Arc::new(MockTerminal::new().with_asset(
            "WIN",
            uptrend_bars(200, 100.0, 0.5),
            0.05,
        ));
        let coordinator = coordinator(terminal.clone());
        coordinator.add("WIN", Timeframe::M5, 1.0, Arc::new(RecordingLogSink::new()));

        assert!(wait_until(|| coordinator
            .status_of("WIN")
            .unwrap()
            .last_ticket
            .is_some()));
        coordinator.shutdown();
        assert!(!terminal.submitted().is_empty());
    }

    #[test]
    fn panicking_asset_does_not_disturb_others() {
        let terminal = Arc::new(
            MockTerminal::new()
                .with_asset("WIN", flat_bars(200, 1.0), 0.01)
                .with_asset("PETR4", flat_bars(200, 30.0), 0.01),
        );
        *terminal.panic_asset.lock().unwrap() = Some("WIN".to_string());
        let coordinator = coordinator(terminal);
        let log = Arc::new(RecordingLogSink::new());
        coordinator.add("WIN", Timeframe::M5, 1.0, log.clone());
        coordinator.add("PETR4", Timeframe::M5, 100.0, log.clone());

        assert!(wait_until(|| {
            coordinator.status_of("WIN").unwrap().cycles > 1
                && coordinator.status_of("PETR4").unwrap().cycles > 1
        }));
        assert_eq!(coordinator.status_of("WIN").unwrap().state, LoopState::Running);
        assert!(
            log.lines()
                .iter()
                .any(|l| l.asset == "WIN" && l.warning && l.message.contains("panicked"))
        );
        coordinator.shutdown();
    }

    #[test]
    fn stop_wakes_loop_during_long_sleep() {
        let terminal = Arc::new(MockTerminal::new().with_asset("WIN", flat_bars(200, 1.0), 0.01));
        let mut config = fast_config();
        config.engine.cycle_interval = Duration::from_secs(600);
        let coordinator = Coordinator::new(terminal.clone(), Arc::new(FixedClock::at(10, 0)), config);
        coordinator.add("WIN", Timeframe::M5, 1.0, Arc::new(RecordingLogSink::new()));
        assert!(wait_until(|| terminal.fetch_count() > 0));

        let start = Instant::now();
        assert!(coordinator.remove("WIN"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
