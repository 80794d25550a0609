use jiff::{SignedDuration, Timestamp};
use shortn_core::{
    BackendError, Column, ColumnClient, ColumnParent, ColumnPath, ConsistencyLevel, Connector,
};
use shortn_storage::{RedisColumnClient, RedisConnector};
use shortn_test_infra::redis::{RedisConfig, RedisServer};

const KEYSPACE: &str = "shortn";
const ONE: ConsistencyLevel = ConsistencyLevel::One;

struct Fixture {
    _redis: RedisServer,
    connector: RedisConnector,
}

impl Fixture {
    async fn start() -> Self {
        let redis = RedisServer::new(RedisConfig::default())
            .await
            .expect("start redis");
        let url = redis.redis_url().await.expect("redis url");
        let connector = RedisConnector::new(url).expect("redis connector");

        Self {
            _redis: redis,
            connector,
        }
    }

    async fn client(&self) -> RedisColumnClient {
        let mut client = self.connector.connect().await.expect("connect");
        client.set_keyspace(KEYSPACE).await.expect("set keyspace");
        client
    }
}

fn path(column: &str) -> ColumnPath {
    ColumnPath::new("links", column)
}

fn parent() -> ColumnParent {
    ColumnParent::new("links")
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn insert_and_get_column() {
    let fixture = Fixture::start().await;
    let client = fixture.client().await;
    let now = Timestamp::now();

    client
        .insert(
            "abc1234",
            &parent(),
            &Column::new("url", "https://example.com", now),
            ONE,
        )
        .await
        .unwrap();

    let got = client.get("abc1234", &path("url"), ONE).await.unwrap();
    let got = got.expect("column should exist");
    assert_eq!(got.value, "https://example.com");
    assert_eq!(got.timestamp.as_microsecond(), now.as_microsecond());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn missing_column_is_none() {
    let fixture = Fixture::start().await;
    let client = fixture.client().await;

    assert!(client
        .get("missing", &path("url"), ONE)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn batch_insert_writes_both_columns() {
    let fixture = Fixture::start().await;
    let client = fixture.client().await;
    let now = Timestamp::now();
    let columns = [
        Column::new("url", "https://example.com", now),
        Column::new("owner", "alice", now),
    ];

    client
        .batch_insert("abc1234", &parent(), &columns, ONE)
        .await
        .unwrap();

    let owner = client.get("abc1234", &path("owner"), ONE).await.unwrap();
    assert_eq!(owner.unwrap().value, "alice");
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn older_write_loses() {
    let fixture = Fixture::start().await;
    let client = fixture.client().await;
    let now = Timestamp::now();

    client
        .insert(
            "abc1234",
            &parent(),
            &Column::new("url", "https://new.example", now),
            ONE,
        )
        .await
        .unwrap();
    client
        .insert(
            "abc1234",
            &parent(),
            &Column::new(
                "url",
                "https://old.example",
                now - SignedDuration::from_secs(10),
            ),
            ONE,
        )
        .await
        .unwrap();

    let got = client.get("abc1234", &path("url"), ONE).await.unwrap();
    assert_eq!(got.unwrap().value, "https://new.example");
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn keyspaces_are_isolated() {
    let fixture = Fixture::start().await;
    let client = fixture.client().await;
    let mut other = fixture.connector.connect().await.unwrap();
    other.set_keyspace("other").await.unwrap();

    client
        .insert(
            "abc1234",
            &parent(),
            &Column::new("url", "https://example.com", Timestamp::now()),
            ONE,
        )
        .await
        .unwrap();

    assert!(other
        .get("abc1234", &path("url"), ONE)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn wrong_type_is_an_invalid_request() {
    let fixture = Fixture::start().await;
    let client = fixture.client().await;

    // Occupy the row key with a plain string so hash commands fail.
    let redis_client = redis::Client::open(fixture.connector.addr()).unwrap();
    let mut conn = redis_client
        .get_multiplexed_async_connection()
        .await
        .unwrap();
    redis::cmd("SET")
        .arg("shortn:links:abc1234")
        .arg("not a hash")
        .query_async::<()>(&mut conn)
        .await
        .unwrap();

    let err = client.get("abc1234", &path("url"), ONE).await.unwrap_err();
    assert!(matches!(err, BackendError::InvalidRequest(_)));
    assert!(client.is_open());
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn closed_client_rejects_operations() {
    let fixture = Fixture::start().await;
    let client = fixture.client().await;

    client.close().await;

    assert!(!client.is_open());
    let err = client.get("abc1234", &path("url"), ONE).await.unwrap_err();
    assert!(matches!(err, BackendError::Transport(_)));
}
