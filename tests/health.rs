use cozzy_fits::routes::{health::health_check, home::home};

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert!(!data.version.is_empty());
}

#[tokio::test]
async fn home_links_the_storefront() {
    let response = home().await;
    assert_eq!(response.0.message, "Welcome to COZZY FITS");

    let data = response.0.data.expect("home data");
    assert!(data.links.iter().any(|link| link == "/review_order"));
}
