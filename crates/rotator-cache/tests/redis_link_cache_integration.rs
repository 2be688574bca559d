use jiff::Timestamp;
use redis::AsyncCommands;
use rotator_cache::{
    DistributedLock, KeySpace, LockBackend, LockOptions, RedisCacheConfig, RedisLinkCache,
    RedisLockBackend,
};
use rotator_core::{LinkCache, LinkId, LinkRecord, ShortCode, ShortCodeRecord, Strategy};
use rotator_test_infra::RedisServer;
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    _server: RedisServer,
    conn: redis::aio::MultiplexedConnection,
    cache: RedisLinkCache,
}

impl Fixture {
    async fn new() -> Self {
        Self::with_config(RedisCacheConfig::default()).await
    }

    async fn with_config(config: RedisCacheConfig) -> Self {
        let server = RedisServer::new().await.unwrap();
        let conn = server.connection().await.unwrap();
        let cache = RedisLinkCache::with_config(conn.clone(), config);
        Self {
            _server: server,
            conn,
            cache,
        }
    }
}

fn code(s: &str) -> ShortCode {
    ShortCode::new_unchecked(s)
}

fn link(code_str: &str, id: LinkId, total_hit: u64) -> LinkRecord {
    let now = Timestamp::now();
    LinkRecord {
        id,
        code: code(code_str),
        original: format!("https://example.com/{code_str}/{id}"),
        total_hit,
        created_at: now,
        updated_at: now,
    }
}

fn hits(links: &[LinkRecord], id: LinkId) -> u64 {
    links.iter().find(|l| l.id == id).unwrap().total_hit
}

#[tokio::test]
#[ignore = "requires docker"]
async fn short_code_round_trip_with_ttl() {
    let mut fixture = Fixture::new().await;
    let now = Timestamp::now();
    let record = ShortCodeRecord {
        id: 3,
        code: code("abc123"),
        total_hit: 0,
        strategy: Strategy::Random,
        created_at: now,
        updated_at: now,
    };

    assert!(fixture.cache.get_short_code(&record.code).await.unwrap().is_none());
    fixture.cache.save_short_code(&record).await.unwrap();
    assert_eq!(
        fixture.cache.get_short_code(&record.code).await.unwrap(),
        Some(record)
    );

    let ttl: i64 = fixture.conn.ttl("rot:code:abc123").await.unwrap();
    assert!(ttl > 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn every_link_hash_carries_the_ttl() {
    let mut fixture = Fixture::new().await;
    fixture
        .cache
        .save_links(&[link("abc123", 1, 0), link("abc123", 2, 0)])
        .await
        .unwrap();

    for key in ["rot:links:abc123:rotate-id:1", "rot:links:abc123:rotate-id:2"] {
        let ttl: i64 = fixture.conn.ttl(key).await.unwrap();
        assert!(ttl > 0, "{key} has no ttl");
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn get_links_reads_every_scan_page() {
    let fixture = Fixture::new().await;
    let links: Vec<LinkRecord> = (1..=350).map(|id| link("many01", id, 0)).collect();
    fixture.cache.save_links(&links).await.unwrap();

    let cached = fixture.cache.get_links(&code("many01")).await.unwrap();
    assert_eq!(cached.len(), 350);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn prefix_codes_do_not_leak_into_each_other() {
    let fixture = Fixture::new().await;
    fixture
        .cache
        .save_links(&[link("ab1", 1, 0), link("ab12", 2, 0)])
        .await
        .unwrap();

    let cached = fixture.cache.get_links(&code("ab1")).await.unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].id, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn incr_on_missing_link_creates_no_partial_hash() {
    let mut fixture = Fixture::new().await;

    fixture.cache.incr_link(&code("abc123"), 7).await.unwrap();
    fixture.cache.incr_short_code(&code("abc123")).await.unwrap();

    let exists: bool = fixture
        .conn
        .exists("rot:links:abc123:rotate-id:7")
        .await
        .unwrap();
    assert!(!exists);
    assert!(fixture.cache.get_links(&code("abc123")).await.unwrap().is_empty());
    assert!(fixture.cache.get_short_code(&code("abc123")).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn incr_after_expiry_does_not_resurrect_the_hash() {
    let mut fixture = Fixture::with_config(
        RedisCacheConfig::builder()
            .ttl(Duration::from_secs(1))
            .build(),
    )
    .await;
    fixture.cache.save_links(&[link("abc123", 1, 4)]).await.unwrap();

    fixture.cache.incr_link(&code("abc123"), 1).await.unwrap();
    let cached = fixture.cache.get_links(&code("abc123")).await.unwrap();
    assert_eq!(hits(&cached, 1), 5);
    let ttl: i64 = fixture.conn.ttl("rot:links:abc123:rotate-id:1").await.unwrap();
    assert!(ttl > 0);

    let conn = fixture.conn.clone();
    awaitility::at_most(Duration::from_secs(5))
        .poll_interval(Duration::from_millis(100))
        .until_async(|| {
            let mut conn = conn.clone();
            async move {
                let exists: bool = conn.exists("rot:links:abc123:rotate-id:1").await.unwrap();
                !exists
            }
        })
        .await;

    fixture.cache.incr_link(&code("abc123"), 1).await.unwrap();

    let exists: bool = fixture
        .conn
        .exists("rot:links:abc123:rotate-id:1")
        .await
        .unwrap();
    assert!(!exists);
    assert!(fixture.cache.get_links(&code("abc123")).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_increments_lose_nothing() {
    let fixture = Fixture::new().await;
    fixture
        .cache
        .save_links(&[link("abc123", 1, 10)])
        .await
        .unwrap();

    let cache = Arc::new(fixture.cache.clone());
    let mut tasks = Vec::new();
    for _ in 0..100 {
        let cache = Arc::clone(&cache);
        tasks.push(tokio::spawn(async move {
            cache.incr_link(&code("abc123"), 1).await
        }));
    }

    let mut succeeded = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    let links = fixture.cache.get_links(&code("abc123")).await.unwrap();
    assert!(succeeded > 0);
    assert_eq!(hits(&links, 1), 10 + succeeded);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn custom_prefix_is_respected() {
    let mut fixture =
        Fixture::with_config(RedisCacheConfig::builder().key_prefix("it:").build()).await;
    fixture
        .cache
        .save_links(&[link("abc123", 1, 0)])
        .await
        .unwrap();

    let key = KeySpace::new("it:").link(&code("abc123"), 1);
    let exists: bool = fixture.conn.exists(&key).await.unwrap();
    assert!(exists);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn redis_lock_is_exclusive_and_token_owned() {
    let fixture = Fixture::new().await;
    let backend = RedisLockBackend::new(fixture.conn.clone());
    let ttl = Duration::from_secs(5);

    assert!(backend.try_acquire("rot:lock:t", "a", ttl).await.unwrap());
    assert!(!backend.try_acquire("rot:lock:t", "b", ttl).await.unwrap());
    assert!(!backend.release("rot:lock:t", "b").await.unwrap());
    assert!(backend.release("rot:lock:t", "a").await.unwrap());

    let lock = DistributedLock::new(backend);
    let lease = lock
        .acquire("rot:lock:t", &LockOptions::default())
        .await
        .unwrap();
    lock.release(lease).await.unwrap();
}
