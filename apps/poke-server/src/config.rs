//! 服务配置
//!
//! TOML 配置文件，所有段落和字段都可省略（使用默认值）：
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:65432"
//! accept_timeout_secs = 20.0
//! recv_timeout_secs = 20.0
//! framing = "optimistic"     # optimistic | delimited
//! eof_policy = "ignore"      # ignore | close
//! after_close = "exit"       # exit | listen
//!
//! [motion]
//! max_depth = 0.12
//! on_poke_failure = "abort"  # abort | retract
//!
//! [plane]
//! pose = [-0.03852, -0.41755, 0.17547, 1.743, -2.614, 0.0]
//!
//! [simulation]
//! time_scale = 1.0
//! ```

use anyhow::{Context, Result, bail};
use poke_motion::{MotionConfig, MotionParameters, PlaneFrame};
use poke_protocol::{DEFAULT_MAX_BUFFER_BYTES, FramingMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

/// 默认监听端口
pub const DEFAULT_PORT: u16 = 65432;

/// Token 分帧模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// 每次读取后立即提取 token（兼容模式）
    #[default]
    Optimistic,
    /// 仅提取后跟空白的 token
    Delimited,
}

impl From<Framing> for FramingMode {
    fn from(framing: Framing) -> Self {
        match framing {
            Framing::Optimistic => FramingMode::Optimistic,
            Framing::Delimited => FramingMode::Delimited,
        }
    }
}

/// 零长度读取的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EofPolicy {
    /// 视为"暂无数据"，继续等待
    #[default]
    Ignore,
    /// 视为对端关闭：处理残留 token 后关闭连接
    Close,
}

/// 连接关闭后的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AfterClose {
    /// 结束服务
    #[default]
    Exit,
    /// 回到监听状态，等待下一个客户端
    Listen,
}

/// 网络服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// 监听地址
    pub listen: SocketAddr,
    /// 等待客户端连接的超时（秒），超时后继续等待
    pub accept_timeout_secs: f64,
    /// 等待数据的超时（秒），超时后继续等待
    pub recv_timeout_secs: f64,
    /// 单次读取的最大字节数
    pub recv_chunk_bytes: usize,
    /// 接收缓冲区上限
    pub max_buffer_bytes: usize,
    pub framing: Framing,
    pub eof_policy: EofPolicy,
    pub after_close: AfterClose,
    /// 运动失败时是否关闭连接
    pub close_on_motion_failure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            accept_timeout_secs: 20.0,
            recv_timeout_secs: 20.0,
            recv_chunk_bytes: 1024,
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
            framing: Framing::Optimistic,
            eof_policy: EofPolicy::Ignore,
            after_close: AfterClose::Exit,
            close_on_motion_failure: false,
        }
    }
}

impl ServerConfig {
    /// 未通过校验的值视为无限等待
    pub fn accept_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.accept_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// 未通过校验的值视为无限等待
    pub fn recv_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.recv_timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("accept_timeout_secs", self.accept_timeout_secs),
            ("recv_timeout_secs", self.recv_timeout_secs),
        ] {
            if !value.is_finite() || value <= 0.0 {
                bail!("server.{} must be a positive number, got {}", name, value);
            }
            if Duration::try_from_secs_f64(value).is_err() {
                bail!("server.{} is out of range, got {}", name, value);
            }
        }
        if self.recv_chunk_bytes == 0 {
            bail!("server.recv_chunk_bytes must be > 0");
        }
        if self.max_buffer_bytes < self.recv_chunk_bytes {
            bail!(
                "server.max_buffer_bytes ({}) must be >= recv_chunk_bytes ({})",
                self.max_buffer_bytes,
                self.recv_chunk_bytes
            );
        }
        Ok(())
    }
}

/// 仿真机械臂配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// 实际等待时间与计算运动时间之比，0 表示不等待
    pub time_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { time_scale: 1.0 }
    }
}

/// 完整配置文件
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub motion: MotionParameters,
    pub plane: PlaneFrame,
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// 从 TOML 文件加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 校验所有段落
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.motion_config()?;
        if !self.simulation.time_scale.is_finite() || self.simulation.time_scale < 0.0 {
            bail!(
                "simulation.time_scale must be >= 0, got {}",
                self.simulation.time_scale
            );
        }
        Ok(())
    }

    /// 校验后的运动配置
    pub fn motion_config(&self) -> Result<MotionConfig> {
        MotionConfig::new(self.motion.clone(), self.plane).context("Invalid motion configuration")
    }
}
