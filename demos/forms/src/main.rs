//! Forms - two call sites sharing one action identity
//!
//! Headless version of the duplicated-form screen: the same slow action is
//! dispatched from two independent call sites. Each call site shows its own
//! optimistic pending/result state, while the shared inflight registry sees
//! the union of both. Resubmitting on one call site cancels only that call
//! site's previous submission.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use form_dispatch::prelude::*;
use tokio::time::sleep;
use tracing::info;

async fn do_something(name: String) -> String {
    sleep(Duration::from_millis(2000)).await;
    info!("resolving {name}");
    name
}

fn render_form(label: &str, dispatcher: &ActionDispatcher<String, String, Infallible>) {
    match (dispatcher.pending_submission(), dispatcher.display_result()) {
        (Some(pending), _) => info!("{label}: loading... {pending}"),
        (None, Some(Ok(result))) => info!("{label}: {result}"),
        _ => info!("{label}: waiting on you..."),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,form_dispatch_core=debug".into()),
        )
        .init();

    let coordinator = Coordinator::new();
    let some_action: FormAction<String, String, Infallible> =
        FormAction::new(|value: Arc<String>| async move { Ok(do_something((*value).clone()).await) });
    let action_id = some_action.id();

    // Two independent call sites over one action identity.
    let first = Arc::new(coordinator.dispatcher(some_action.clone(), None));
    let second = Arc::new(coordinator.dispatcher(some_action.clone(), None));

    let a = tokio::spawn({
        let first = Arc::clone(&first);
        async move { first.submit(String::from("beef")).await }
    });
    let b = tokio::spawn({
        let second = Arc::clone(&second);
        async move { second.submit(String::from("pork")).await }
    });
    tokio::task::yield_now().await;

    render_form("form #1", &first);
    render_form("form #2", &second);

    let inflight = coordinator.inflight().snapshot(action_id);
    let values: Vec<&str> = inflight
        .iter()
        .filter_map(|s| s.downcast_ref::<String>().map(String::as_str))
        .collect();
    info!("inflight for shared action: {values:?}");

    // Interrupt form #1: its first submission is superseded.
    sleep(Duration::from_millis(200)).await;
    let superseded = a;
    let a = tokio::spawn({
        let first = Arc::clone(&first);
        async move { first.submit(String::from("chuck")).await }
    });
    tokio::task::yield_now().await;
    render_form("form #1 after interrupt", &first);

    // The superseded caller still gets the real outcome; the call site's
    // state never shows it.
    let beef = superseded.await.expect("join").expect("action");
    info!("superseded submission still resolved to {beef}");

    let chuck = a.await.expect("join").expect("action");
    let pork = b.await.expect("join").expect("action");
    info!("settled: form #1 -> {chuck}, form #2 -> {pork}");

    render_form("form #1", &first);
    render_form("form #2", &second);
    info!(
        "inflight empty: {}",
        coordinator.inflight().snapshot(action_id).is_empty()
    );
}
