//! 连接管理器
//!
//! 单客户端、单线程的 TCP 服务：
//!
//! ```text
//! Idle → Listening → Connected → Processing → Closed
//!            ↑                                  │
//!            └──────── after_close = listen ────┘
//! ```
//!
//! 只有两处有界等待：等待连接（`accept_timeout`）与等待数据（`recv_timeout`）。
//! 两者超时都只记录日志并继续等待。运动执行期间不读取 socket，
//! 新到达的字节留在内核接收缓冲区中。

use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use poke_motion::{MotionConfig, MotionController, MotionSequencer};
use poke_protocol::TokenFramer;
use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AfterClose, EofPolicy, ServerConfig};
use crate::session::{CloseReason, Session, SessionFlow, SessionStats};

const LISTENER: Token = Token(0);
const PEER: Token = Token(1);

/// 服务错误
#[derive(Error, Debug)]
pub enum ServerError {
    /// 绑定监听地址失败
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// 事件轮询失败
    #[error("Poll error: {0}")]
    Poll(#[source] io::Error),

    /// 接受连接失败
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Listening,
    Connected,
    Processing,
    Closed,
}

/// 单个连接的处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionReport {
    pub peer: SocketAddr,
    pub reason: CloseReason,
    pub stats: SessionStats,
}

/// 连接管理器
pub struct Server<C> {
    config: ServerConfig,
    motion: MotionConfig,
    controller: C,
    listener: TcpListener,
    poll: Poll,
    events: Events,
    state: ConnectionState,
}

impl<C: MotionController> Server<C> {
    /// 绑定并开始监听（Idle → Listening）
    pub fn bind(
        config: ServerConfig,
        motion: MotionConfig,
        controller: C,
    ) -> Result<Self, ServerError> {
        let addr = config.listen;
        let mut listener =
            TcpListener::bind(addr).map_err(|source| ServerError::Bind { addr, source })?;
        let poll = Poll::new().map_err(ServerError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(ServerError::Poll)?;

        let mut server = Self {
            config,
            motion,
            controller,
            listener,
            poll,
            events: Events::with_capacity(16),
            state: ConnectionState::Idle,
        };
        server.transition(ConnectionState::Listening);
        Ok(server)
    }

    /// 实际监听地址（绑定端口 0 时可用于获取分配的端口）
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn into_controller(self) -> C {
        self.controller
    }

    /// 运行服务，直到连接关闭且 `after_close = "exit"`
    pub fn run(&mut self) -> Result<(), ServerError> {
        info!(
            "Listening on {}... waiting for client ({:.0}s timeout)",
            self.config.listen,
            self.config.accept_timeout_secs
        );

        loop {
            self.serve_connection()?;

            match self.config.after_close {
                AfterClose::Exit => return Ok(()),
                AfterClose::Listen => {
                    self.transition(ConnectionState::Listening);
                    info!("Waiting for next client");
                },
            }
        }
    }

    /// 等待一个客户端并处理它直到连接关闭
    pub fn serve_connection(&mut self) -> Result<ConnectionReport, ServerError> {
        if self.state != ConnectionState::Listening {
            self.transition(ConnectionState::Listening);
        }

        let (stream, peer) = self.accept()?;
        info!("Connected by {}", peer);
        self.transition(ConnectionState::Connected);

        let (reason, stats) = self.process(stream);
        self.transition(ConnectionState::Closed);
        info!("Connection closed ({}); {}", reason, stats);

        Ok(ConnectionReport {
            peer,
            reason,
            stats,
        })
    }

    fn accept(&mut self) -> Result<(TcpStream, SocketAddr), ServerError> {
        loop {
            // 先尝试一次：边沿触发下，回到监听时积压的连接不会产生新事件
            match self.listener.accept() {
                Ok(accepted) => return Ok(accepted),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {},
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::Interrupted | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    debug!("Transient accept error: {}", e);
                    continue;
                },
                Err(e) => return Err(ServerError::Accept(e)),
            }

            let timeout = self.config.accept_timeout();
            if !wait_for(&mut self.poll, &mut self.events, LISTENER, timeout)? {
                info!(
                    "No connection in {:.0}s. Still waiting...",
                    timeout.as_secs_f64()
                );
            }
        }
    }

    /// Connected → Processing → (返回关闭原因)
    fn process(&mut self, mut stream: TcpStream) -> (CloseReason, SessionStats) {
        if let Err(e) = self
            .poll
            .registry()
            .register(&mut stream, PEER, Interest::READABLE)
        {
            return (CloseReason::SocketError(e.to_string()), SessionStats::default());
        }
        self.transition(ConnectionState::Processing);

        let Self {
            config,
            motion,
            controller,
            poll,
            events,
            ..
        } = self;

        let framer = TokenFramer::new(config.framing.into(), config.max_buffer_bytes);
        let mut session = Session::new(
            framer,
            MotionSequencer::new(motion),
            &mut *controller,
            config.close_on_motion_failure,
        );
        debug!("Session framing mode: {:?}", session.framing_mode());

        let recv_timeout = config.recv_timeout();
        let mut chunk = vec![0u8; config.recv_chunk_bytes];

        let reason = loop {
            match stream.read(&mut chunk) {
                Ok(0) => match config.eof_policy {
                    EofPolicy::Ignore => {
                        // 与空闲无法区分：继续等待
                        debug!("Empty read, treating as no data yet");
                    },
                    EofPolicy::Close => {
                        if let SessionFlow::Close(reason) = session.finish() {
                            break reason;
                        }
                        break CloseReason::PeerClosed;
                    },
                },
                Ok(n) => {
                    if let SessionFlow::Close(reason) = session.handle_chunk(&chunk[..n]) {
                        break reason;
                    }
                    continue;
                },
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {},
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Receive failed: {}", e);
                    break CloseReason::SocketError(e.to_string());
                },
            }

            match wait_for(poll, events, PEER, recv_timeout) {
                Ok(true) => {},
                Ok(false) => info!(
                    "No data in {:.0}s. Waiting...",
                    recv_timeout.as_secs_f64()
                ),
                Err(e) => break CloseReason::SocketError(e.to_string()),
            }
        };

        let stats = session.stats();
        drop(session);

        if let Err(e) = poll.registry().deregister(&mut stream) {
            debug!("Failed to deregister peer: {}", e);
        }
        (reason, stats)
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("Connection state: {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

/// 等待 `token` 可读，返回 `false` 表示超时
///
/// 其他 token 的事件（如处理期间有新客户端连接）不会提前结束等待。
fn wait_for(
    poll: &mut Poll,
    events: &mut Events,
    token: Token,
    timeout: Duration,
) -> Result<bool, ServerError> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let remaining =
            deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()));
        if remaining == Some(Duration::ZERO) {
            return Ok(false);
        }

        match poll.poll(events, remaining) {
            Ok(()) => {
                if events.iter().any(|event| event.token() == token) {
                    return Ok(true);
                }
            },
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(ServerError::Poll(e)),
        }
    }
}
