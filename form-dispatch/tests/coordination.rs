//! End-to-end coordination scenarios across dispatcher, registry, and cache.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use form_dispatch::prelude::*;
use tokio::time::sleep;

/// In-memory stand-in for a backend the demos and tests mutate.
#[derive(Default)]
struct CartStore {
    items: Mutex<Vec<String>>,
}

impl CartStore {
    async fn add(&self, item: &str) {
        sleep(Duration::from_millis(20)).await;
        self.items.lock().unwrap().push(item.to_string());
    }

    async fn get(&self) -> Vec<String> {
        sleep(Duration::from_millis(10)).await;
        self.items.lock().unwrap().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn interrupted_submission_is_discarded_but_tracked() {
    let coordinator = Coordinator::new();
    let action: FormAction<u32, u32, Infallible> = FormAction::new(|n| async move {
        let delay = if *n == 1 { 100 } else { 50 };
        sleep(Duration::from_millis(delay)).await;
        Ok(*n)
    });
    let dispatcher = Arc::new(coordinator.dispatcher(action, None));
    let action_id = dispatcher.action_id();

    // Submit X, then Y before X's action resolves.
    let x = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.submit(1).await }
    });
    tokio::task::yield_now().await;

    let y_pending = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.submit(2).await }
    });
    tokio::task::yield_now().await;

    // While Y is pending the inflight set shows only Y.
    let inflight = coordinator.inflight().snapshot(action_id);
    assert_eq!(inflight.len(), 1);
    assert_eq!(inflight[0].downcast_ref::<u32>(), Some(&2));

    let y = y_pending.await.unwrap().unwrap();
    assert_eq!(*y, 2);

    // X's direct caller still gets X's real outcome, but the dispatcher's
    // settled state only ever reflects Y.
    let x = x.await.unwrap().unwrap();
    assert_eq!(*x, 1);
    let settled = dispatcher.settled_result().unwrap().unwrap();
    assert_eq!(*settled, 2);

    assert!(coordinator.inflight().snapshot(action_id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn successful_action_revalidates_cached_target() {
    let coordinator = Arc::new(Coordinator::new());
    let store = Arc::new(CartStore::default());

    // Prime the cache with the empty cart.
    let fetch_store = Arc::clone(&store);
    let cart = coordinator
        .targets()
        .read("cart", move || async move {
            Ok::<_, Infallible>(fetch_store.get().await)
        })
        .await
        .unwrap();
    assert!(cart.is_empty());

    // An action configured to revalidate ["cart"] succeeds.
    let action_store = Arc::clone(&store);
    let add_to_cart: FormAction<String, (), Infallible> = FormAction::new(move |item: Arc<String>| {
        let store = Arc::clone(&action_store);
        async move {
            store.add(&item).await;
            Ok(())
        }
    });
    let dispatcher = coordinator.dispatcher(add_to_cart, Some(vec!["cart".into()]));
    dispatcher.submit(String::from("shoes")).await.unwrap();

    // The next read refetches instead of returning the stale empty value.
    let fetch_store = Arc::clone(&store);
    let cart = coordinator
        .targets()
        .read("cart", move || async move {
            Ok::<_, Infallible>(fetch_store.get().await)
        })
        .await
        .unwrap();
    assert_eq!(*cart, vec![String::from("shoes")]);
}

#[tokio::test(start_paused = true)]
async fn concurrent_call_sites_share_one_inflight_set() {
    let coordinator = Coordinator::new();
    let action: FormAction<&'static str, &'static str, Infallible> =
        FormAction::new(|name| async move {
            sleep(Duration::from_millis(50)).await;
            Ok(*name)
        });

    // Two dispatcher instances for the same action identity.
    let first = Arc::new(coordinator.dispatcher(action.clone(), None));
    let second = Arc::new(coordinator.dispatcher(action.clone(), None));
    let action_id = action.id();

    let a = tokio::spawn({
        let first = Arc::clone(&first);
        async move { first.submit("a").await }
    });
    tokio::task::yield_now().await;
    let b = tokio::spawn({
        let second = Arc::clone(&second);
        async move { second.submit("b").await }
    });
    tokio::task::yield_now().await;

    // Both submissions, in registration order.
    let inflight = coordinator.inflight().snapshot(action_id);
    let names: Vec<&str> = inflight
        .iter()
        .filter_map(|s| s.downcast_ref::<&str>().copied())
        .collect();
    assert_eq!(names, vec!["a", "b"]);

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();
    assert!(coordinator.inflight().snapshot(action_id).is_empty());
}

#[tokio::test(start_paused = true)]
async fn optimistic_state_batches_pending_with_registry_entry() {
    let coordinator = Coordinator::new();
    let action: FormAction<u32, u32, Infallible> = FormAction::new(|n| async move {
        sleep(Duration::from_millis(50)).await;
        Ok(*n)
    });
    let dispatcher = Arc::new(coordinator.dispatcher(action, None));

    // Any observer woken by the registry change event must already see the
    // optimistic pending value.
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let watcher = dispatcher.watch_optimistic();
    let _sub = coordinator.inflight().subscribe(move |change| {
        let pending = watcher.borrow().pending.as_deref().copied();
        sink.lock().unwrap().push((change.action, pending));
    });

    let worker = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.submit(9).await }
    });
    tokio::task::yield_now().await;

    let seen = observed.lock().unwrap().clone();
    assert_eq!(seen, vec![(dispatcher.action_id(), Some(9))]);

    worker.await.unwrap().unwrap();
}
