pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_DELAY_MS: u64 = 60_000;

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 100;

pub const KEY_PREFIX: &str = "binderq";

pub const DEFAULT_REDIS_HOST: &str = "localhost";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
pub const DEFAULT_SESSION_COOKIE: &str = "session";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

pub const ADMIN_BASE_PATH: &str = "/api/admin/queues";
