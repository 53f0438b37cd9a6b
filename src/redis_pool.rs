use redis::{aio::MultiplexedConnection, Client};
use tokio::sync::OnceCell;
use tracing::info;

static SHARED: OnceCell<MultiplexedConnection> = OnceCell::const_new();

/// Returns the process-wide broker connection, opening it on first use.
///
/// The connection is multiplexed, so every clone shares one socket and the
/// handle lives until the process exits.
pub async fn shared_connection(redis_url: &str) -> redis::RedisResult<MultiplexedConnection> {
    SHARED
        .get_or_try_init(|| async {
            // Client::open will auto-handle rediss:// if TLS feature is enabled
            let client = Client::open(redis_url)?;
            let conn = client.get_multiplexed_async_connection().await?;
            info!("redis connection established");
            Ok(conn)
        })
        .await
        .cloned()
}
