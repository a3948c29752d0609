use binary_market_core::config::CoreConfig;
use binary_market_core::engine::MatchingEngine;
use binary_market_core::market_data::{ChannelSubscriber, FeedEvent, OrderBookFeed, OrderBookPoller};
use binary_market_core::models::OrderSide;
use binary_market_core::repositories::{
    AccountService, InMemoryAccountService, InMemoryOrderRepository, InMemoryPositionRepository,
    InMemorySettlementRepository,
};
use binary_market_core::services::{MarketSettlementService, OrderPlacementService, PlacementRequest};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MARKET: &str = "match-1234";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "binary_market_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CoreConfig::from_env()?;
    tracing::info!(?config, "configuration loaded");

    let engine = Arc::new(MatchingEngine::with_config(&config));
    let orders = Arc::new(InMemoryOrderRepository::new());
    let positions = Arc::new(InMemoryPositionRepository::new());
    let settlements = Arc::new(InMemorySettlementRepository::new());
    let accounts = Arc::new(InMemoryAccountService::new());
    for account in ["alice", "bob", "carol"] {
        accounts.open_account(account, dec!(1000));
    }

    // Subscribers get pushed snapshots after each placement and polled ones on an interval
    let feed = Arc::new(OrderBookFeed::new());
    let (subscriber, mut events) = ChannelSubscriber::new();
    feed.subscribe(MARKET, Arc::new(subscriber));

    let poller = Arc::new(OrderBookPoller::new(
        engine.clone(),
        feed.clone(),
        Duration::from_millis(config.poll_interval_ms),
    ));
    poller.start();

    let placement = OrderPlacementService::new(
        engine.clone(),
        orders,
        positions.clone(),
        accounts.clone(),
        config.clone(),
    )
    .with_feed(feed);

    let script = [
        PlacementRequest::limit("bob", MARKET, OrderSide::Sell, dec!(0.40), dec!(100)),
        PlacementRequest::limit("carol", MARKET, OrderSide::Sell, dec!(0.45), dec!(50)),
        PlacementRequest::limit("carol", MARKET, OrderSide::Buy, dec!(0.30), dec!(20)),
        PlacementRequest::limit("alice", MARKET, OrderSide::Buy, dec!(0.45), dec!(120)),
        PlacementRequest::market("alice", MARKET, OrderSide::Buy, dec!(10)),
    ];
    for request in script {
        match placement.place(request) {
            Ok(receipt) => println!("{} -> {}", receipt.order.id, receipt.summary),
            Err(e) => println!("rejected: {}", e),
        }
    }

    println!("{}", serde_json::to_string_pretty(&engine.snapshot(MARKET))?);

    tokio::time::sleep(Duration::from_millis(config.poll_interval_ms * 2)).await;
    poller.stop();

    let mut updates = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, FeedEvent::Updated(_)) {
            updates += 1;
        }
    }
    tracing::info!("{} order book updates delivered", updates);

    let settlement =
        MarketSettlementService::new(positions, accounts.clone(), settlements, &config);
    let summary = settlement.settle(MARKET, OrderSide::Buy)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    for account in ["alice", "bob", "carol"] {
        if let Some(balance) = accounts.get_balance(account)? {
            println!("{}: {}", account, balance);
        }
    }

    Ok(())
}
