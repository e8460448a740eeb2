//! End-to-end strategy runs against in-memory ports
//!
//! ```
//! cargo test --test strategy_runs
//! ```

mod common;

use common::{btc, RecordingOrders, ScriptedMarket, StaticHoldings};
use dip_trader::common::types::Side;
use dip_trader::{
    cancellation, CancelToken, OrderRequest, PositionIntent, RunFailure, RunResult,
    StrategyRunner, StrategyVariant, TraderError,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    market: Arc<ScriptedMarket>,
    orders: Arc<RecordingOrders>,
    holdings: Arc<StaticHoldings>,
}

impl Harness {
    fn new(market: ScriptedMarket, orders: RecordingOrders) -> Self {
        Self::with_holdings(market, orders, StaticHoldings::new(&[]))
    }

    fn with_holdings(
        market: ScriptedMarket,
        orders: RecordingOrders,
        holdings: StaticHoldings,
    ) -> Self {
        Self {
            market: Arc::new(market),
            orders: Arc::new(orders),
            holdings: Arc::new(holdings),
        }
    }

    fn runner(&self) -> StrategyRunner {
        StrategyRunner::new(
            self.market.clone(),
            self.orders.clone(),
            self.holdings.clone(),
        )
    }
}

fn fast(intent: PositionIntent) -> PositionIntent {
    intent.with_poll_interval(Duration::from_millis(1))
}

fn dip_intent() -> PositionIntent {
    fast(
        PositionIntent::new(btc())
            .with_notional(dec!(10000))
            .with_dip_percent(dec!(1))
            .with_profit_percent(dec!(5))
            .with_loss_percent(dec!(3)),
    )
}

fn market_buy(notional: Decimal) -> OrderRequest {
    OrderRequest::MarketBuy {
        symbol: btc(),
        notional,
    }
}

fn market_sell(quantity: Decimal) -> OrderRequest {
    OrderRequest::MarketSell {
        symbol: btc(),
        quantity,
    }
}

// ============================================================================
// Dip entry with fixed exit
// ============================================================================

#[test_log::test(tokio::test)]
async fn test_dip_entry_then_take_profit() {
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(99.5), dec!(99), dec!(101), dec!(103.95)]),
        RecordingOrders::new(dec!(100)),
    );

    let result = harness
        .runner()
        .run_dip_fixed_exit(&dip_intent(), CancelToken::never())
        .await
        .unwrap();

    let order = result.order().expect("run should complete");
    assert_eq!(order.side, Side::Sell);
    assert_eq!(
        harness.orders.placed(),
        vec![market_buy(dec!(10000)), market_sell(dec!(100))]
    );
    // Nothing is fetched after the terminal sample
    assert_eq!(harness.market.fetches(), 5);
}

#[tokio::test]
async fn test_dip_entry_then_stop_loss() {
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(99), dec!(97), dec!(96.03)]),
        RecordingOrders::new(dec!(100)),
    );

    let result = harness
        .runner()
        .run_dip_fixed_exit(&dip_intent(), CancelToken::never())
        .await
        .unwrap();

    assert!(result.is_completed());
    assert_eq!(
        harness.orders.placed(),
        vec![market_buy(dec!(10000)), market_sell(dec!(100))]
    );
}

#[tokio::test]
async fn test_price_outages_are_skipped() {
    let harness = Harness::new(
        ScriptedMarket::with_gaps(vec![
            Some(dec!(100)),
            None,
            None,
            Some(dec!(99)),
            None,
            Some(dec!(103.95)),
        ]),
        RecordingOrders::new(dec!(100)),
    );

    let result = harness
        .runner()
        .run_dip_fixed_exit(&dip_intent(), CancelToken::never())
        .await
        .unwrap();

    assert!(result.is_completed());
    assert_eq!(harness.market.fetches(), 6);
    assert_eq!(harness.orders.placed().len(), 2);
}

#[tokio::test]
async fn test_rejected_entry_fails_without_exit() {
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(99)]),
        RecordingOrders::new(dec!(100)).reject_next("insufficient_funds_bid: not enough KRW"),
    );

    let result = harness
        .runner()
        .run_dip_fixed_exit(&dip_intent(), CancelToken::never())
        .await
        .unwrap();

    assert_eq!(
        result,
        RunResult::Failed(RunFailure::EntryFailed {
            reason: "insufficient_funds_bid: not enough KRW".to_string(),
            entry_order: None,
        })
    );
    assert_eq!(harness.orders.placed(), vec![market_buy(dec!(10000))]);
    assert_eq!(harness.market.fetches(), 2);
}

#[tokio::test]
async fn test_invalid_intent_never_touches_ports() {
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100)]),
        RecordingOrders::new(dec!(100)),
    );
    let intent = fast(PositionIntent::new(btc()));

    let err = harness
        .runner()
        .run_dip_fixed_exit(&intent, CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(err, TraderError::InvalidIntent(_)));
    assert_eq!(harness.market.fetches(), 0);
    assert!(harness.orders.placed().is_empty());
}

// ============================================================================
// Trailing variants
// ============================================================================

#[tokio::test]
async fn test_dip_trailing_exit_locks_in_gain() {
    // Entry at 99; high of 102 puts the stop at 100.98
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(99), dec!(102), dec!(100.5)]),
        RecordingOrders::new(dec!(100)),
    );
    let intent = dip_intent().with_trailing_percent(dec!(1));

    let result = harness
        .runner()
        .run_dip_trailing_exit(&intent, CancelToken::never())
        .await
        .unwrap();

    assert!(result.is_completed());
    assert_eq!(
        harness.orders.placed(),
        vec![market_buy(dec!(10000)), market_sell(dec!(100))]
    );
}

#[test_log::test(tokio::test)]
async fn test_trailing_stop_sells_queried_quantity_once() {
    let harness = Harness::with_holdings(
        ScriptedMarket::new(&[
            dec!(100),
            dec!(105),
            dec!(110),
            dec!(109),
            dec!(108.9),
            dec!(100),
        ]),
        RecordingOrders::new(dec!(108.9)),
        StaticHoldings::new(&[("KRW", dec!(5000)), ("BTC", dec!(0.5))]),
    );
    let intent = fast(PositionIntent::new(btc()).with_trailing_percent(dec!(1)));

    let result = harness
        .runner()
        .run(StrategyVariant::TrailingStopExit, &intent, CancelToken::never())
        .await
        .unwrap();

    assert!(result.is_completed());
    assert_eq!(harness.orders.placed(), vec![market_sell(dec!(0.5))]);
    assert_eq!(harness.holdings.queries(), 1);
    assert_eq!(harness.market.fetches(), 5);
}

#[tokio::test]
async fn test_trailing_stop_without_holdings_is_invalid() {
    let harness = Harness::with_holdings(
        ScriptedMarket::new(&[dec!(100)]),
        RecordingOrders::new(dec!(100)),
        StaticHoldings::new(&[("KRW", dec!(5000))]),
    );
    let intent = fast(PositionIntent::new(btc()));

    let err = harness
        .runner()
        .run_trailing_stop_exit(&intent, CancelToken::never())
        .await
        .unwrap_err();

    assert!(matches!(err, TraderError::InvalidIntent(_)));
    assert_eq!(harness.market.fetches(), 0);
}

#[tokio::test]
async fn test_trailing_buy_enters_on_rebound() {
    // Low of 95 puts the buy trigger at 95.95
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(98), dec!(95), dec!(95.5), dec!(96)]),
        RecordingOrders::new(dec!(96)),
    );
    let intent = fast(
        PositionIntent::new(btc())
            .with_notional(dec!(9600))
            .with_trailing_percent(dec!(1)),
    );

    let result = harness
        .runner()
        .run_trailing_buy_entry(&intent, CancelToken::never())
        .await
        .unwrap();

    let order = result.order().expect("entry fill completes the run");
    assert_eq!(order.side, Side::Buy);
    assert_eq!(order.filled_quantity, dec!(100));
    assert_eq!(harness.orders.placed(), vec![market_buy(dec!(9600))]);
}

// ============================================================================
// Cancellation and concurrency
// ============================================================================

#[tokio::test]
async fn test_cancel_before_start_fetches_nothing() {
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100)]),
        RecordingOrders::new(dec!(100)),
    );
    let (handle, token) = cancellation();
    handle.cancel();

    let result = harness
        .runner()
        .run_dip_fixed_exit(&dip_intent(), token)
        .await
        .unwrap();

    let failure = result.failure().expect("cancelled run fails");
    assert_eq!(failure.kind(), "aborted");
    assert!(failure.open_position().is_none());
    assert_eq!(harness.market.fetches(), 0);
}

#[tokio::test]
async fn test_cancel_interrupts_sleep() {
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100)]),
        RecordingOrders::new(dec!(100)),
    );
    let intent = dip_intent().with_poll_interval(Duration::from_secs(60));
    let (handle, token) = cancellation();
    handle.cancel_after(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        harness.runner().run_dip_fixed_exit(&intent, token),
    )
    .await
    .expect("cancellation should end the run promptly")
    .unwrap();

    match result {
        RunResult::Failed(RunFailure::Aborted { position, .. }) => assert!(position.is_none()),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(harness.market.fetches(), 1);
    assert!(harness.orders.placed().is_empty());
}

#[tokio::test]
async fn test_cancel_interrupts_hanging_fetch() {
    let harness = Harness::new(ScriptedMarket::stalled(), RecordingOrders::new(dec!(100)));
    let (handle, token) = cancellation();
    handle.cancel_after(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        harness.runner().run_dip_fixed_exit(&dip_intent(), token),
    )
    .await
    .expect("cancellation should end the run promptly")
    .unwrap();

    match result {
        RunResult::Failed(RunFailure::Aborted { reason, position }) => {
            assert!(reason.contains("fetching"), "{}", reason);
            assert!(position.is_none());
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(harness.market.fetches(), 1);
    assert!(harness.orders.placed().is_empty());
}

#[tokio::test]
async fn test_cancel_during_entry_order_keeps_its_fill() {
    // The buy takes 300ms; cancellation lands while it is in flight
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(99)]),
        RecordingOrders::new(dec!(100)).with_latency(Duration::from_millis(300)),
    );
    let (handle, token) = cancellation();
    handle.cancel_after(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        harness.runner().run_dip_fixed_exit(&dip_intent(), token),
    )
    .await
    .expect("run should end once the order returns")
    .unwrap();

    let failure = result.failure().expect("cancelled run fails");
    assert_eq!(failure.kind(), "aborted");
    let position = failure
        .open_position()
        .expect("the in-flight buy filled, so the position is open");
    assert_eq!(position.quantity, dec!(100));
    assert_eq!(position.entry_price, Some(dec!(99)));
    assert!(position.entry_order.is_some());
    assert_eq!(harness.orders.placed(), vec![market_buy(dec!(10000))]);
    // No sample is taken after the cancelled order returns
    assert_eq!(harness.market.fetches(), 2);
}

#[tokio::test]
async fn test_cancel_while_holding_reports_open_position() {
    let harness = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(99), dec!(100)]),
        RecordingOrders::new(dec!(100)),
    );
    let intent = dip_intent().with_poll_interval(Duration::from_millis(20));
    let (handle, token) = cancellation();
    handle.cancel_after(Duration::from_millis(300));

    let result = harness
        .runner()
        .run_dip_fixed_exit(&intent, token)
        .await
        .unwrap();

    let failure = result.failure().expect("cancelled run fails");
    assert_eq!(failure.kind(), "aborted");
    let position = failure.open_position().expect("entered position is reported");
    assert_eq!(position.quantity, dec!(100));
    assert_eq!(position.entry_price, Some(dec!(99)));
    assert_eq!(harness.orders.placed(), vec![market_buy(dec!(10000))]);
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let first = Harness::new(
        ScriptedMarket::new(&[dec!(100), dec!(99), dec!(103.95)]),
        RecordingOrders::new(dec!(100)),
    );
    let second = Harness::new(
        ScriptedMarket::new(&[dec!(200), dec!(198), dec!(190)]),
        RecordingOrders::new(dec!(200)),
    );
    let (first_runner, second_runner) = (first.runner(), second.runner());
    let intent = dip_intent();

    let (a, b) = tokio::join!(
        first_runner.run_dip_fixed_exit(&intent, CancelToken::never()),
        second_runner.run_dip_fixed_exit(&intent, CancelToken::never()),
    );

    assert!(a.unwrap().is_completed());
    assert!(b.unwrap().is_completed());
    assert_eq!(
        first.orders.placed(),
        vec![market_buy(dec!(10000)), market_sell(dec!(100))]
    );
    assert_eq!(
        second.orders.placed(),
        vec![market_buy(dec!(10000)), market_sell(dec!(50))]
    );
}
