//! 工具模块
pub mod log_format;

pub use self::log_format::{preview_compact, summarize_ids};
