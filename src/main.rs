//! Product Showcase Backend
//!
//! REST backend for a product showcase: submissions, upvotes, moderation,
//! reviews, coupons and subscription payments. SQLite persistence and Tantivy
//! full-text search over products.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod payments;
mod search;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{IdentityVerifier, JwtVerifier};
use config::Config;
use db::Repository;
use payments::{PaymentGateway, StripeGateway};
use search::SearchIndex;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub search: Arc<SearchIndex>,
    pub config: Arc<Config>,
    /// `None` when no token secret is configured; guarded routes then refuse every caller.
    pub identity: Option<Arc<dyn IdentityVerifier>>,
    pub payments: Arc<dyn PaymentGateway>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Product Showcase Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Index path: {:?}", config.index_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    let identity: Option<Arc<dyn IdentityVerifier>> = match config.jwt_secret.as_deref() {
        Some(secret) => Some(Arc::new(JwtVerifier::new(
            secret,
            config.jwt_issuer.as_deref(),
        ))),
        None => {
            tracing::warn!(
                "No token secret configured (SHOWCASE_JWT_SECRET). Guarded routes will reject every request!"
            );
            None
        }
    };

    if config.stripe_secret_key.is_none() {
        tracing::warn!("No payment key configured (STRIPE_SECRET_KEY). Payment intents are disabled.");
    }
    let payments: Arc<dyn PaymentGateway> = Arc::new(StripeGateway::new(
        &config.stripe_api_base,
        config.stripe_secret_key.clone(),
    ));

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Initialize search index
    let search = Arc::new(SearchIndex::open(&config.index_path)?);

    // Build initial search index from database
    tracing::info!("Building search index...");
    let products = repo.all_products().await?;
    search.rebuild(&products).await?;
    tracing::info!("Search index built with {} products", products.len());

    let state = AppState {
        repo,
        search,
        config: Arc::new(config.clone()),
        identity,
        payments,
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router, grouped by access policy.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/users", post(api::register_user))
        // Products
        .route("/products", get(api::list_products))
        .route("/products/{id}", get(api::get_product))
        .route("/posts/{id}", get(api::get_product))
        .route("/acceptedProducts", get(api::accepted_products))
        .route("/featuredProducts", get(api::featured_products))
        .route("/trendingProducts", get(api::trending_products))
        // Reviews
        .route("/reviews/{id}", get(api::list_reviews))
        // Coupons
        .route("/coupons", get(api::list_coupons))
        .route("/coupons/{id}", get(api::get_coupon));

    let authenticated_routes = Router::new()
        // Users
        .route("/users/email/{email}", get(api::get_user_by_email))
        .route("/users/role/{email}", get(api::get_user_role))
        .route("/users/{user}/subscription", put(api::update_subscription))
        .route("/users/{user}/products", get(api::list_user_products))
        // Products
        .route("/addProducts", post(api::submit_product))
        .route(
            "/products/{id}",
            patch(api::update_product).delete(api::delete_product),
        )
        .route(
            "/posts/{id}",
            patch(api::update_product).delete(api::delete_product),
        )
        .route("/products/{id}/upvote", patch(api::upvote_product))
        .route("/products/{id}/report", patch(api::report_product))
        // Reviews
        .route("/reviews", post(api::create_review))
        // Payments
        .route("/create-payment-intent", post(api::create_payment_intent))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_authenticated,
        ));

    let staff_routes = Router::new()
        .route("/users", get(api::list_users))
        .route("/reportedProducts", get(api::reported_products))
        .route("/products/{id}/status", patch(api::update_product_status))
        .route("/products/{id}/featured", patch(api::update_product_featured))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_staff,
        ));

    let admin_routes = Router::new()
        .route("/users/{user}/role", patch(api::update_user_role))
        .route("/coupons", post(api::create_coupon))
        .route(
            "/coupons/{id}",
            patch(api::update_coupon).delete(api::delete_coupon),
        )
        .route("/site-stats", get(api::site_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Liveness banner.
async fn root() -> &'static str {
    "Showcase server is running"
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
