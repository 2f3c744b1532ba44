//! 连接会话
//!
//! 一个连接生命周期内的 分帧 → 解析 → 分发 流水线，与 socket 无关。

use poke_motion::{MotionController, MotionSequencer};
use poke_protocol::{Command, FramingMode, TokenFramer, parse};
use std::fmt;
use tracing::{error, info, warn};

/// 连接关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// 收到停止命令
    Stop,
    /// 运动失败且配置为关闭连接
    MotionFailure,
    /// 对端关闭（仅在 `eof_policy = "close"` 时）
    PeerClosed,
    /// 不可恢复的 socket 错误
    SocketError(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Stop => write!(f, "stop command"),
            CloseReason::MotionFailure => write!(f, "motion failure"),
            CloseReason::PeerClosed => write!(f, "peer closed"),
            CloseReason::SocketError(e) => write!(f, "socket error: {}", e),
        }
    }
}

/// 处理一批字节后的流程走向
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    Close(CloseReason),
}

/// 会话统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// 提取的 token 数
    pub tokens: u64,
    /// 成功完成的戳动数
    pub moves: u64,
    /// 被拒绝的 token 数
    pub rejected: u64,
    /// 运动失败次数
    pub motion_failures: u64,
    /// 缓冲区溢出次数
    pub overflows: u64,
}

impl fmt::Display for SessionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tokens: {}, moves: {}, rejected: {}, motion failures: {}, overflows: {}",
            self.tokens, self.moves, self.rejected, self.motion_failures, self.overflows
        )
    }
}

/// 单个连接的会话
pub struct Session<'a, C> {
    framer: TokenFramer,
    sequencer: MotionSequencer<'a>,
    controller: C,
    close_on_motion_failure: bool,
    stats: SessionStats,
}

impl<'a, C: MotionController> Session<'a, C> {
    pub fn new(
        framer: TokenFramer,
        sequencer: MotionSequencer<'a>,
        controller: C,
        close_on_motion_failure: bool,
    ) -> Self {
        Self {
            framer,
            sequencer,
            controller,
            close_on_motion_failure,
            stats: SessionStats::default(),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn framing_mode(&self) -> FramingMode {
        self.framer.mode()
    }

    /// 处理一批接收到的字节
    ///
    /// 提取并分发当前所有可用的 token；遇到停止命令时立即返回，
    /// 剩余字节随会话一起丢弃。超长 token 被丢弃，其前后的 token 照常处理。
    pub fn handle_chunk(&mut self, bytes: &[u8]) -> SessionFlow {
        if let Err(e) = self.framer.feed(bytes) {
            warn!("{}", e);
            self.stats.overflows += 1;
        }

        while let Some(token) = self.framer.next_token() {
            if let SessionFlow::Close(reason) = self.dispatch(&token) {
                return SessionFlow::Close(reason);
            }
        }
        SessionFlow::Continue
    }

    /// 处理缓冲区中尚未分隔的残留 token（对端不会再发送数据时调用）
    pub fn finish(&mut self) -> SessionFlow {
        while let Some(token) = self.framer.flush() {
            if let SessionFlow::Close(reason) = self.dispatch(&token) {
                return SessionFlow::Close(reason);
            }
        }
        SessionFlow::Continue
    }

    fn dispatch(&mut self, token: &str) -> SessionFlow {
        let Some(command) = parse(token) else {
            return SessionFlow::Continue;
        };
        self.stats.tokens += 1;

        match command {
            Command::Stop => {
                info!("Stop signal received");
                SessionFlow::Close(CloseReason::Stop)
            },
            Command::Move { primary, secondary } => {
                match self
                    .sequencer
                    .execute(&mut self.controller, primary, secondary)
                {
                    Ok(_) => {
                        self.stats.moves += 1;
                        SessionFlow::Continue
                    },
                    Err(e) => {
                        self.stats.motion_failures += 1;
                        error!("{}", e);
                        if let Some(Err(retract)) = &e.recovery {
                            error!("Recovery retract also failed: {}", retract);
                        }
                        if self.close_on_motion_failure {
                            SessionFlow::Close(CloseReason::MotionFailure)
                        } else {
                            SessionFlow::Continue
                        }
                    },
                }
            },
            Command::Rejected { reason } => {
                self.stats.rejected += 1;
                warn!("Ignoring {}", reason);
                SessionFlow::Continue
            },
        }
    }
}
