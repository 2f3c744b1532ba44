//! Token 分帧器
//!
//! 累积原始字节，并按空白逐个提取 token。协议不要求分隔符，
//! 因此一个 token 可能跨越多次 `feed`。

use thiserror::Error;

/// 默认缓冲区上限（64 KiB）
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 64 * 1024;

/// 分帧错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramerError {
    /// 未分隔的 token 超过上限，已丢弃
    #[error("Token exceeds receive buffer limit ({limit} bytes), discarded")]
    Overflow { limit: usize },
}

/// 分帧模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingMode {
    /// 乐观提取（兼容模式）
    ///
    /// 每次读取后立即提取当前可见的 token，即使其后尚未出现空白。
    /// 跨两次读取到达的 token（如 `"1.0"` + `",2.0 "`）会被拆成两个 token。
    /// 这是已知并接受的宽松行为，保留以兼容现有客户端。
    #[default]
    Optimistic,

    /// 分隔提取
    ///
    /// 只有后面跟着空白的 token 才会被提取；末尾未分隔的部分留在缓冲区，
    /// 直到更多字节到达或调用 [`TokenFramer::flush`]。
    Delimited,
}

/// Token 分帧器
///
/// 内部缓冲区不变量：
/// - 永远不包含 `\n` / `\r`（写入时替换为空格）
/// - 每次 `feed` 之后不以空白开头
/// - 末尾未分隔部分不超过 `max_buffer_bytes`
#[derive(Debug)]
pub struct TokenFramer {
    buffer: Vec<u8>,
    mode: FramingMode,
    max_buffer_bytes: usize,
    /// 正在丢弃一个超长 token 的剩余字节，直到下一个空白
    discarding: bool,
}

impl Default for TokenFramer {
    fn default() -> Self {
        Self::new(FramingMode::default(), DEFAULT_MAX_BUFFER_BYTES)
    }
}

impl TokenFramer {
    pub fn new(mode: FramingMode, max_buffer_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            mode,
            max_buffer_bytes,
            discarding: false,
        }
    }

    pub fn mode(&self) -> FramingMode {
        self.mode
    }

    /// 当前未消费的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 追加接收到的字节
    ///
    /// 换行 / 回车在写入时被规范化为空格，前导空白被丢弃。
    /// 只有末尾尚未分隔的 token 计入上限，已完整的 token 不受影响。
    ///
    /// # 错误
    ///
    /// 未分隔部分超过上限时丢弃该 token（包括后续到达的剩余字节，直到下一个空白），
    /// 返回 [`FramerError::Overflow`]。之前已完整的 token 仍可提取。
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), FramerError> {
        let mut bytes = bytes;
        if self.discarding {
            match bytes.iter().position(|b| b.is_ascii_whitespace()) {
                Some(pos) => {
                    self.discarding = false;
                    bytes = &bytes[pos..];
                },
                None => return Ok(()),
            }
        }

        self.buffer.extend(bytes.iter().map(|&b| match b {
            b'\n' | b'\r' => b' ',
            other => other,
        }));

        let leading = self
            .buffer
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(self.buffer.len());
        self.buffer.drain(..leading);

        let tail = self
            .buffer
            .iter()
            .rev()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(self.buffer.len());
        if tail > self.max_buffer_bytes {
            self.buffer.truncate(self.buffer.len() - tail);
            self.discarding = true;
            return Err(FramerError::Overflow {
                limit: self.max_buffer_bytes,
            });
        }
        Ok(())
    }

    /// 提取下一个 token
    ///
    /// 返回 `None` 表示缓冲区中还没有可提取的内容，调用方应等待更多字节。
    /// 成功时，token 及其之前的所有空白都会从缓冲区移除。
    pub fn next_token(&mut self) -> Option<String> {
        let (start, end) = self.first_segment()?;

        if self.mode == FramingMode::Delimited && end == self.buffer.len() {
            // 尚未出现结尾空白，等待更多字节
            return None;
        }

        Some(self.take(start, end))
    }

    /// 强制提取末尾未分隔的 token
    ///
    /// 用于对端关闭写方向等"不会再有字节"的场景。
    pub fn flush(&mut self) -> Option<String> {
        let (start, end) = self.first_segment()?;
        Some(self.take(start, end))
    }

    /// 丢弃所有未消费字节
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    fn first_segment(&self) -> Option<(usize, usize)> {
        let start = self.buffer.iter().position(|b| !b.is_ascii_whitespace())?;
        let end = self.buffer[start..]
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .map_or(self.buffer.len(), |offset| start + offset);
        Some((start, end))
    }

    fn take(&mut self, start: usize, end: usize) -> String {
        let token = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
        self.buffer.drain(..end);
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(framer: &mut TokenFramer) -> Vec<String> {
        std::iter::from_fn(|| framer.next_token()).collect()
    }

    #[test]
    fn test_extracts_tokens_in_order() {
        let mut framer = TokenFramer::default();
        framer.feed(b"0.05,0.03 0.1  s").unwrap();

        assert_eq!(drain(&mut framer), vec!["0.05,0.03", "0.1", "s"]);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_newlines_are_delimiters() {
        let mut framer = TokenFramer::default();
        framer.feed(b"1.0,2.0\r\n3.0\ns\r").unwrap();

        assert_eq!(drain(&mut framer), vec!["1.0,2.0", "3.0", "s"]);
    }

    #[test]
    fn test_whitespace_only_yields_nothing() {
        let mut framer = TokenFramer::default();
        framer.feed(b"  \r\n\t ").unwrap();

        assert_eq!(framer.next_token(), None);
        assert_eq!(framer.buffered_len(), 0);
    }

    #[test]
    fn test_idle_whitespace_does_not_count_toward_limit() {
        let mut framer = TokenFramer::new(FramingMode::Delimited, 16);
        for _ in 0..10 {
            framer.feed(b"\n\n\n\n\n\n\n\n\n\n").unwrap();
            assert_eq!(framer.next_token(), None);
        }

        framer.feed(b"0.1,0 s ").unwrap();
        assert_eq!(drain(&mut framer), vec!["0.1,0", "s"]);
    }

    #[test]
    fn test_complete_tokens_do_not_count_toward_limit() {
        let mut framer = TokenFramer::new(FramingMode::Delimited, 4);
        framer.feed(b"0.1,0 0.2,0 s ").unwrap();

        assert_eq!(drain(&mut framer), vec!["0.1,0", "0.2,0", "s"]);
    }

    #[test]
    fn test_consumes_leading_whitespace_with_token() {
        let mut framer = TokenFramer::default();
        framer.feed(b"   abc   def").unwrap();
        assert_eq!(framer.buffered_len(), "abc   def".len());

        assert_eq!(framer.next_token().as_deref(), Some("abc"));
        assert_eq!(framer.buffered_len(), "   def".len());
    }

    #[test]
    fn test_optimistic_mode_splits_fragmented_token() {
        // 兼容模式的已知行为：未分隔的片段会被提前提取
        let mut framer = TokenFramer::new(FramingMode::Optimistic, DEFAULT_MAX_BUFFER_BYTES);

        framer.feed(b"1.0").unwrap();
        assert_eq!(framer.next_token().as_deref(), Some("1.0"));

        framer.feed(b",2.0 ").unwrap();
        assert_eq!(framer.next_token().as_deref(), Some(",2.0"));
    }

    #[test]
    fn test_delimited_mode_joins_fragmented_token() {
        let mut framer = TokenFramer::new(FramingMode::Delimited, DEFAULT_MAX_BUFFER_BYTES);

        framer.feed(b"1.0").unwrap();
        assert_eq!(framer.next_token(), None);

        framer.feed(b",2.0").unwrap();
        assert_eq!(framer.next_token(), None);

        framer.feed(b" ").unwrap();
        assert_eq!(framer.next_token().as_deref(), Some("1.0,2.0"));
        assert_eq!(framer.next_token(), None);
    }

    #[test]
    fn test_flush_releases_trailing_token() {
        let mut framer = TokenFramer::new(FramingMode::Delimited, DEFAULT_MAX_BUFFER_BYTES);
        framer.feed(b"0.1 s").unwrap();

        assert_eq!(framer.next_token().as_deref(), Some("0.1"));
        assert_eq!(framer.next_token(), None);
        assert_eq!(framer.flush().as_deref(), Some("s"));
        assert_eq!(framer.flush(), None);
    }

    #[test]
    fn test_overflow_discards_oversized_token() {
        let mut framer = TokenFramer::new(FramingMode::Delimited, 8);
        framer.feed(b"0.1 12345").unwrap();

        let err = framer.feed(b"6789").unwrap_err();
        assert_eq!(err, FramerError::Overflow { limit: 8 });

        // 超长 token 之前的完整 token 保留
        assert_eq!(framer.next_token().as_deref(), Some("0.1"));
        assert_eq!(framer.next_token(), None);

        // 剩余字节直到下一个空白都属于被丢弃的 token
        framer.feed(b"000").unwrap();
        assert_eq!(framer.next_token(), None);
        framer.feed(b"0 s ").unwrap();
        assert_eq!(drain(&mut framer), vec!["s"]);
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        let mut framer = TokenFramer::default();
        framer.feed(&[0xff, b'1', b' ']).unwrap();

        let token = framer.next_token().unwrap();
        assert!(token.ends_with('1'));
        assert!(token.contains('\u{FFFD}'));
    }
}
