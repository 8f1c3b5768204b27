use orderbook_domain::value_objects::currency_pair::CurrencyPair;
use orderbook_domain::value_objects::exchange::Exchange;
use orderbook_domain::value_objects::trade::{Trade, TradeSide};
use orderbook_infrastructure::persistence::registry::StoreRegistry;
use rust_decimal::Decimal;
use std::sync::{Arc, Barrier};
use std::thread;

fn trade(id: u64, timestamp: i64) -> Trade {
    Trade {
        id,
        timestamp,
        side: TradeSide::Sell,
        rate: Decimal::new(5, 1),
        volume: Decimal::ONE,
    }
}

#[test]
fn open_or_get_returns_same_store() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(dir.path());
    let pair = CurrencyPair::new("BTC", "ETH");

    let first = registry.open_or_get(Exchange::Poloniex, &pair).unwrap();
    let second = registry.open_or_get(Exchange::Poloniex, &pair).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(registry.open_count(), 1);
}

#[test]
fn concurrent_first_access_opens_once() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(StoreRegistry::new(dir.path()));
    let pair = CurrencyPair::new("BTC", "XRP");
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let pair = pair.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registry.open_or_get(Exchange::Poloniex, &pair).unwrap()
            })
        })
        .collect();

    let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for store in &stores[1..] {
        assert!(Arc::ptr_eq(&stores[0], store));
    }
    assert_eq!(registry.open_count(), 1);
}

#[test]
fn distinct_pairs_get_distinct_stores() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(dir.path());
    let a = registry
        .open_or_get(Exchange::Poloniex, &CurrencyPair::new("BTC", "XRP"))
        .unwrap();
    let b = registry
        .open_or_get(Exchange::Poloniex, &CurrencyPair::new("BTC", "ETH"))
        .unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(registry.open_count(), 2);
}

#[test]
fn iterator_and_compact_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(dir.path());
    let pair = CurrencyPair::new("USDT", "BTC");
    registry
        .open_or_get(Exchange::Poloniex, &pair)
        .unwrap()
        .write_trades(&[trade(2, 20), trade(1, 10)])
        .unwrap();

    registry.compact(Exchange::Poloniex, &pair).unwrap();
    let ids: Vec<u64> = registry
        .new_iterator(Exchange::Poloniex, &pair)
        .unwrap()
        .map(|row| row.unwrap().id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[test]
fn close_all_closes_every_store() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(dir.path());
    let store = registry
        .open_or_get(Exchange::Poloniex, &CurrencyPair::new("BTC", "XRP"))
        .unwrap();
    registry
        .open_or_get(Exchange::Poloniex, &CurrencyPair::new("BTC", "ETH"))
        .unwrap();

    registry.close_all().unwrap();
    assert_eq!(registry.open_count(), 0);
    assert!(store.is_closed());
    assert!(store.write_trades(&[trade(1, 1)]).is_err());
}

#[test]
fn pair_reopens_after_close_all_while_old_handle_is_held() {
    let dir = tempfile::tempdir().unwrap();
    let registry = StoreRegistry::new(dir.path());
    let pair = CurrencyPair::new("BTC", "XRP");
    let held = registry.open_or_get(Exchange::Poloniex, &pair).unwrap();
    held.write_trades(&[trade(1, 10)]).unwrap();

    registry.close_all().unwrap();
    let reopened = registry.open_or_get(Exchange::Poloniex, &pair).unwrap();

    assert!(!Arc::ptr_eq(&held, &reopened));
    assert!(held.is_closed());
    assert_eq!(reopened.watermarks().highest_timestamp, 10);
    reopened.write_trades(&[trade(2, 20)]).unwrap();
}
