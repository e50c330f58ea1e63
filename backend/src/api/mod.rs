//! HTTP API module: server, response types and the log stream.

pub mod logs;
pub mod server;
pub mod types;

pub use logs::{log_error, log_info, log_success, log_warning, LogEntry, LogLevel, LOG_BROADCASTER};
pub use server::{router, start_server};
pub use types::{error_response, ProcessResponse, RecordResponse};
