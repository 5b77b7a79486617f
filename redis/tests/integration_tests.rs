//! Integration tests for `RedisCache` using testcontainers.
//!
//! Docker must be running; run with `cargo test -p conference-redis -- --ignored`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use conference_core::cache::{ANNOUNCEMENT_KEY, Cache, get_json, set_json};
use conference_redis::RedisCache;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;

async fn setup_cache() -> (ContainerAsync<Redis>, RedisCache) {
    let container = Redis::default()
        .start()
        .await
        .expect("Failed to start redis container");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get redis port");
    let cache = RedisCache::new(&format!("redis://127.0.0.1:{port}"))
        .await
        .expect("Failed to connect to redis");
    (container, cache)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn values_round_trip_and_delete() {
    let (_container, cache) = setup_cache().await;
    cache.ping().await.unwrap();

    assert!(cache.get(ANNOUNCEMENT_KEY).await.unwrap().is_none());
    set_json(&cache, ANNOUNCEMENT_KEY, &"Last chance!".to_string())
        .await
        .unwrap();
    let value: Option<String> = get_json(&cache, ANNOUNCEMENT_KEY).await.unwrap();
    assert_eq!(value.as_deref(), Some("Last chance!"));

    cache.delete(ANNOUNCEMENT_KEY).await.unwrap();
    cache.delete(ANNOUNCEMENT_KEY).await.unwrap();
    assert!(cache.get(ANNOUNCEMENT_KEY).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn prefixes_isolate_deployments() {
    let (_container, cache) = setup_cache().await;
    let staging = cache.clone().with_prefix("staging");

    cache.set("k", b"prod".to_vec()).await.unwrap();
    staging.set("k", b"staging".to_vec()).await.unwrap();

    assert_eq!(cache.get("k").await.unwrap().unwrap(), b"prod");
    assert_eq!(staging.get("k").await.unwrap().unwrap(), b"staging");
}
