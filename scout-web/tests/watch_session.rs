mod common;

use std::sync::Arc;
use std::time::Duration;

use scout_web::{Extractor, StaticPage, WatchSession};
use tokio::sync::mpsc;
use tokio::time::timeout;
use url::Url;

fn page_with(domains: &[&str]) -> String {
    let items: String = domains.iter().map(|d| format!("<li>{d}</li>")).collect();
    format!("<html><body><ul>{items}</ul></body></html>")
}

#[tokio::test(start_paused = true)]
async fn initial_detection_then_debounced_delta() {
    common::init_test_tracing();
    let url = Url::parse("https://listing.example.org/page").unwrap();
    let page = Arc::new(StaticPage::new(Some(url), page_with(&["alpha.com"])));
    let (tx, mut rx) = mpsc::channel(8);

    let handle = WatchSession::start(page.clone(), Extractor::default(), Duration::from_millis(1000), tx);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.domains, vec!["alpha.com"]);
    assert_eq!(first.url.as_deref(), Some("https://listing.example.org/page"));

    page.update(page_with(&["alpha.com", "beta.io"])).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    page.update(page_with(&["alpha.com", "beta.io", "gamma.net"])).await;

    // The second change restarts the quiet window.
    assert!(timeout(Duration::from_millis(900), rx.recv()).await.is_err());

    let next = rx.recv().await.unwrap();
    assert_eq!(next.domains, vec!["beta.io", "gamma.net"]);
    assert_eq!(next.total_domains, vec!["alpha.com", "beta.io", "gamma.net"]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn changes_without_new_domains_emit_nothing() {
    common::init_test_tracing();
    let page = Arc::new(StaticPage::new(None, page_with(&["alpha.com"])));
    let (tx, mut rx) = mpsc::channel(8);
    let handle = WatchSession::start(page.clone(), Extractor::default(), Duration::from_millis(1000), tx);
    rx.recv().await.unwrap();

    page.update(page_with(&["ALPHA.com", "www.alpha.com"])).await;
    assert!(timeout(Duration::from_secs(5), rx.recv()).await.is_err());
    assert!(handle.is_running());
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stopping_discards_the_session() {
    common::init_test_tracing();
    let page = Arc::new(StaticPage::new(None, page_with(&["alpha.com"])));
    let (tx, mut rx) = mpsc::channel(8);
    let handle = WatchSession::start(page.clone(), Extractor::default(), Duration::from_millis(1000), tx);
    rx.recv().await.unwrap();

    page.update(page_with(&["alpha.com", "beta.io"])).await;
    handle.stop().await;

    // Session (and its sender) are gone; nothing else arrives.
    assert!(rx.recv().await.is_none());

    // A fresh session starts with an empty seen set.
    let (tx, mut rx) = mpsc::channel(8);
    let handle = WatchSession::start(page.clone(), Extractor::default(), Duration::from_millis(1000), tx);
    let again = rx.recv().await.unwrap();
    assert_eq!(again.domains, vec!["alpha.com", "beta.io"]);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_returns_while_listener_is_not_reading() {
    common::init_test_tracing();
    let page = Arc::new(StaticPage::new(None, page_with(&["alpha.com"])));
    let (tx, _rx) = mpsc::channel(1);
    let handle = WatchSession::start(page.clone(), Extractor::default(), Duration::from_millis(1000), tx);

    // The first event fills the channel; the next one has nowhere to go.
    page.update(page_with(&["alpha.com", "beta.io"])).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    timeout(Duration::from_secs(30), handle.stop())
        .await
        .expect("stop finishes with a full channel");
}
