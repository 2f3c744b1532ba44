//! # Poke Server
//!
//! 单客户端 TCP 命令服务：接收 `primary,secondary` 文本命令，
//! 驱动机械臂在平面坐标系下完成 接近 → 下压 → 停留 → 回退。
//!
//! ## 模块
//!
//! - `config`: TOML 配置文件与各项策略
//! - `session`: 与 socket 无关的 分帧 → 解析 → 分发 流水线
//! - `server`: 连接管理器（监听 / 接受 / 接收循环）

pub mod config;
pub mod server;
pub mod session;

pub use config::{AfterClose, AppConfig, EofPolicy, Framing, ServerConfig, SimulationConfig};
pub use server::{ConnectionReport, ConnectionState, Server, ServerError};
pub use session::{CloseReason, Session, SessionFlow, SessionStats};
