//! Cart - products/cart demo for form-dispatch
//!
//! Headless version of the classic two-panel cart screen:
//! - a "products" target listing the catalog
//! - a "cart" target listing the cart contents
//! - an add-to-cart action that revalidates ["cart"] on success
//!
//! The backend is simulated in memory with artificial latency; the core
//! neither knows nor cares.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use form_dispatch::prelude::*;
use tokio::time::sleep;
use tracing::info;

// ============================================================================
// Backend - simulated external collaborator
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
struct Product {
    id: String,
    name: String,
    price: u32,
}

impl Product {
    fn new(id: &str, name: &str, price: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
        }
    }
}

struct CartStore {
    items: Mutex<Vec<Product>>,
}

impl CartStore {
    fn new() -> Self {
        Self {
            items: Mutex::new(vec![Product::new("1", "Shoes", 20)]),
        }
    }

    async fn add(&self, item: Product) {
        sleep(Duration::from_millis(1000)).await;
        self.items.lock().unwrap().push(item);
    }

    async fn get(&self) -> Vec<Product> {
        sleep(Duration::from_millis(500)).await;
        self.items.lock().unwrap().clone()
    }
}

async fn fetch_products() -> Vec<Product> {
    sleep(Duration::from_millis(500)).await;
    vec![
        Product::new("1", "Shoes", 20),
        Product::new("2", "Hat", 40),
        Product::new("3", "Socks", 5),
        Product::new("4", "Pants", 60),
    ]
}

// ============================================================================
// Rendering - log the state the core exposes
// ============================================================================

fn render_cart(label: &str, items: &[Product]) {
    if items.is_empty() {
        info!("{label}: your cart is empty");
    } else {
        let names: Vec<&str> = items.iter().map(|p| p.name.as_str()).collect();
        info!("{label}: {}", names.join(", "));
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

    let coordinator = Arc::new(Coordinator::new());
    let store = Arc::new(CartStore::new());

    // Suspending reads of both targets.
    let products = coordinator
        .targets()
        .read("products", || async {
            Ok::<_, Infallible>(fetch_products().await)
        })
        .await
        .expect("products fetch");
    info!("loaded {} products", products.len());

    let fetch_store = Arc::clone(&store);
    let cart: Arc<Vec<Product>> = coordinator
        .targets()
        .read("cart", move || async move {
            Ok::<_, Infallible>(fetch_store.get().await)
        })
        .await
        .expect("cart fetch");
    render_cart("initial cart", &cart);

    // The add-to-cart action makes "cart" stale on success.
    let action_store = Arc::clone(&store);
    let add_to_cart: FormAction<Product, (), Infallible> = FormAction::new(move |item: Arc<Product>| {
        let store = Arc::clone(&action_store);
        async move {
            store.add((*item).clone()).await;
            Ok(())
        }
    });
    let dispatcher = Arc::new(coordinator.dispatcher(add_to_cart, Some(vec!["cart".into()])));

    let submit = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        let hat = products[1].clone();
        async move { dispatcher.submit(hat).await }
    });
    tokio::task::yield_now().await;

    // Optimistic state while the action runs.
    if let Some(pending) = dispatcher.pending_submission() {
        info!("adding {}...", pending.name);
    }
    let stable = coordinator
        .targets()
        .peek::<Vec<Product>, _>("cart")
        .expect("peek");
    render_cart("cart while adding (stable view)", &stable);

    submit.await.expect("join").expect("add-to-cart");
    info!("add-to-cart settled");

    // "cart" was revalidated: this read refetches instead of reusing the
    // cached value.
    let fetch_store = Arc::clone(&store);
    let cart: Arc<Vec<Product>> = coordinator
        .targets()
        .read("cart", move || async move {
            Ok::<_, Infallible>(fetch_store.get().await)
        })
        .await
        .expect("cart refetch");
    render_cart("cart after revalidation", &cart);
}
