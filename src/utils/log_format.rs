//! 日志格式化工具
//! 用户输入的模式串、规则 ID 列表可能很长，写日志前统一截断

use std::fmt::{self, Write};

/// 规则 ID 列表最多展示的个数
const MAX_LOGGED_IDS: usize = 10;

/// 空白折叠 + 截断的惰性预览，不产生 String
/// 超出 max_len 时以 … 结尾
pub fn preview_compact(s: &str, max_len: usize) -> impl fmt::Display + '_ {
    struct CompactView<'a> {
        source: &'a str,
        max_length: usize,
    }

    impl fmt::Display for CompactView<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let mut char_count = 0;
            let mut last_was_whitespace = false;

            for ch in self.source.chars() {
                if char_count >= self.max_length {
                    f.write_char('…')?;
                    break;
                }

                if ch.is_whitespace() {
                    if !last_was_whitespace {
                        f.write_char(' ')?;
                        char_count += 1;
                        last_was_whitespace = true;
                    }
                } else {
                    f.write_char(ch)?;
                    char_count += 1;
                    last_was_whitespace = false;
                }
            }
            Ok(())
        }
    }

    CompactView {
        source: s,
        max_length: max_len,
    }
}

/// 规则 ID 列表摘要
/// 格式：[11, 12, 13] 或 [11, 12, … (total: 42)]
pub fn summarize_ids(ids: &[u32]) -> String {
    if ids.is_empty() {
        return "[]".to_string();
    }

    let mut result = String::with_capacity(MAX_LOGGED_IDS * 6 + 16);
    result.push('[');
    for (idx, id) in ids.iter().take(MAX_LOGGED_IDS).enumerate() {
        if idx > 0 {
            result.push_str(", ");
        }
        let _ = write!(result, "{}", id);
    }
    if ids.len() > MAX_LOGGED_IDS {
        let _ = write!(result, ", … (total: {})", ids.len());
    }
    result.push(']');
    result
}
