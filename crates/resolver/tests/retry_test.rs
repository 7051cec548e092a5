mod helpers;

use compass_dns_resolver::{DnsResolver, QueryStatus};
use helpers::dns_server_mock::{MockBehavior, MockDnsServer};
use helpers::{capturing_event_manager, test_config};
use std::time::{Duration, Instant};

#[tokio::test]
async fn test_servfail_twice_then_success() {
    helpers::init_tracing();
    let (server, addr) = MockDnsServer::start().await;
    server.script(vec![
        MockBehavior::ServFail,
        MockBehavior::ServFail,
        MockBehavior::Answer(vec!["192.0.2.2".parse().unwrap()]),
    ]);

    let resolver = DnsResolver::with_event_manager(capturing_event_manager().0);
    resolver.load_config(test_config(addr)).unwrap();

    let started = Instant::now();
    let outcome = resolver.resolve("flaky.test").await;
    let elapsed = started.elapsed();

    assert_eq!(outcome.status, QueryStatus::Success);
    assert_eq!(outcome.addresses, vec!["192.0.2.2".to_string()]);
    assert_eq!(server.queries_received(), 3);

    // Backoff before retry k is min(50 << (k-1), 1000): 50ms then 100ms.
    assert!(
        elapsed >= Duration::from_millis(150),
        "observed {}ms",
        elapsed.as_millis()
    );
    assert!(elapsed < Duration::from_millis(1500));

    let stats = resolver.stats();
    assert_eq!(stats.total_retries, 2);
    assert_eq!(stats.retry_attempts["flaky.test"], vec![1, 2]);
    assert_eq!(stats.successful_queries, 1);
}

#[tokio::test]
async fn test_timeout_exhausts_all_attempts() {
    let (server, addr) = MockDnsServer::start_with_default(MockBehavior::Ignore).await;
    let (events, captured) = capturing_event_manager();
    let resolver = DnsResolver::with_event_manager(events);

    let mut config = test_config(addr);
    config.servers[0].timeout_ms = 150;
    resolver.load_config(config).unwrap();

    let outcome = resolver.resolve("silent.test").await;

    assert_eq!(outcome.status, QueryStatus::Timeout);
    assert_eq!(server.queries_received(), 3, "one per attempt");

    let stats = resolver.stats();
    assert_eq!(stats.error_counts["TIMEOUT"], 1, "recorded once on delivery");
    assert_eq!(stats.failed_queries, 1);
    assert_eq!(stats.total_retries, 2);

    assert!(resolver.cache().peek("silent.test").is_none(), "no cache insert");
    assert!(captured.lock().unwrap().is_empty(), "no change event");
}

#[tokio::test]
async fn test_max_attempts_one_performs_exactly_one_attempt() {
    let (server, addr) = MockDnsServer::start_with_default(MockBehavior::ServFail).await;
    let resolver = DnsResolver::with_event_manager(capturing_event_manager().0);

    let mut config = test_config(addr);
    config.retry.max_attempts = 1;
    resolver.load_config(config).unwrap();

    let outcome = resolver.resolve("once.test").await;

    assert_eq!(outcome.status, QueryStatus::ServFail);
    assert_eq!(server.queries_received(), 1);
    assert_eq!(resolver.stats().total_retries, 0);
}

#[tokio::test]
async fn test_nxdomain_is_not_retried() {
    let (server, addr) = MockDnsServer::start().await;
    server.script(vec![
        MockBehavior::NxDomain,
        MockBehavior::Answer(vec!["192.0.2.1".parse().unwrap()]),
    ]);

    let resolver = DnsResolver::with_event_manager(capturing_event_manager().0);
    resolver.load_config(test_config(addr)).unwrap();

    let outcome = resolver.resolve("missing.test").await;

    assert_eq!(outcome.status, QueryStatus::NxDomain);
    assert_eq!(server.queries_received(), 1, "authoritative non-existence is final");
    assert_eq!(resolver.stats().error_counts["NXDOMAIN"], 1);
}

#[tokio::test]
async fn test_empty_answer_reclassified_as_nodata() {
    let (server, addr) = MockDnsServer::start_with_default(MockBehavior::Empty).await;
    let resolver = DnsResolver::with_event_manager(capturing_event_manager().0);
    resolver.load_config(test_config(addr)).unwrap();

    let outcome = resolver.resolve("empty.test").await;

    assert_eq!(outcome.status, QueryStatus::NoData);
    assert!(outcome.addresses.is_empty());
    assert_eq!(server.queries_received(), 1, "NODATA is not retried");
    assert!(resolver.cache().peek("empty.test").is_none());
}

#[tokio::test]
async fn test_empty_hostname_rejected_as_malformed() {
    let (server, addr) = MockDnsServer::start().await;
    let resolver = DnsResolver::with_event_manager(capturing_event_manager().0);
    resolver.load_config(test_config(addr)).unwrap();

    let outcome = resolver.resolve("").await;

    assert_eq!(outcome.status, QueryStatus::Malformed);
    assert_eq!(server.queries_received(), 0, "rejected before any socket work");
}
