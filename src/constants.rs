// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const WS_PATH: &str = "ws";

// Room configuration constants
pub const ROOM_HISTORY_LIMIT: usize = 100;
pub const MAX_MESSAGE_LENGTH: usize = 2000;
pub const MAX_USERNAME_LENGTH: usize = 50;

// Moderation constants
pub const SPAM_WINDOW_SECS: u64 = 5;
pub const SPAM_MAX_MESSAGES: usize = 5;
pub const FILTER_MASK: &str = "***";
pub const DEFAULT_FILTERED_WORDS: &[&str] = &["spam", "badword1", "badword2"];

// Event log configuration constants
pub const EVENT_LOG_CAPACITY: usize = 1000;
