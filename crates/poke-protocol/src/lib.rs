//! # Poke Protocol
//!
//! 文本线协议的分帧与解析（无 IO 依赖）
//!
//! ## 模块
//!
//! - `framer`: 从字节流中逐个提取以空白分隔的 token
//! - `command`: 把 token 解析为停止 / 运动 / 拒绝命令
//!
//! ## 线协议
//!
//! 客户端发送以空白分隔的 token，不要求换行：
//!
//! ```text
//! s            停止（不区分大小写）
//! 0.05,0.03    primary,secondary（米）
//! 0.05         仅 primary，secondary 视为 0.0
//! ```
//!
//! ## 示例
//!
//! ```rust
//! use poke_protocol::{Command, TokenFramer, parse};
//!
//! let mut framer = TokenFramer::default();
//! framer.feed(b"0.05,0.03\ns").unwrap();
//!
//! let token = framer.next_token().unwrap();
//! assert_eq!(
//!     parse(&token),
//!     Some(Command::Move { primary: 0.05, secondary: 0.03 })
//! );
//! ```

pub mod command;
pub mod framer;

pub use command::{Command, parse, parse_number};
pub use framer::{DEFAULT_MAX_BUFFER_BYTES, FramerError, FramingMode, TokenFramer};
