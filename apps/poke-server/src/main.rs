//! # Poke Server
//!
//! 平面戳动 TCP 命令服务入口。
//!
//! ```bash
//! # 使用默认配置（127.0.0.1:65432，仿真机械臂）
//! poke-server
//!
//! # 指定配置文件，并在连接关闭后继续监听
//! poke-server --config poke.toml --keep-listening
//!
//! # 查看生效配置
//! poke-server --print-config
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use poke_motion::{MotionSequencer, SimulatedArm};
use poke_server::{AfterClose, AppConfig, Framing, Server};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 默认日志级别（可通过 RUST_LOG 覆盖）
const DEFAULT_LOG_FILTER: &str = "poke_server=info,poke_motion=info,poke_protocol=info";

/// 平面戳动命令服务
///
/// 接收 "X,Z"（米）或 "s" 停止，驱动机械臂完成 接近 → 下压 → 停留 → 回退
#[derive(Parser, Debug)]
#[command(name = "poke-server")]
#[command(about = "Single-client TCP server driving plane poke motions", long_about = None)]
#[command(version)]
struct Args {
    /// TOML 配置文件
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听地址（覆盖配置文件）
    ///
    /// 格式: IP:PORT (例如: 127.0.0.1:65432)
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// 等待客户端连接的超时（秒）
    #[arg(long)]
    accept_timeout: Option<f64>,

    /// 等待数据的超时（秒）
    #[arg(long)]
    recv_timeout: Option<f64>,

    /// Token 分帧模式
    #[arg(long, value_enum)]
    framing: Option<Framing>,

    /// 连接关闭后回到监听状态，而不是退出
    #[arg(long)]
    keep_listening: bool,

    /// 仿真运动时间缩放（0 表示不等待）
    #[arg(long)]
    time_scale: Option<f64>,

    /// 打印生效配置后退出
    #[arg(long)]
    print_config: bool,
}

impl Args {
    /// 加载配置文件并应用命令行覆盖
    fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(secs) = self.accept_timeout {
            config.server.accept_timeout_secs = secs;
        }
        if let Some(secs) = self.recv_timeout {
            config.server.recv_timeout_secs = secs;
        }
        if let Some(framing) = self.framing {
            config.server.framing = framing;
        }
        if self.keep_listening {
            config.server.after_close = AfterClose::Listen;
        }
        if let Some(scale) = self.time_scale {
            config.simulation.time_scale = scale;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;

    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    ctrlc::set_handler(|| {
        eprintln!("\nReceived interrupt signal. Shutting down...");
        process::exit(0);
    })
    .context("Failed to set signal handler")?;

    let motion = config.motion_config()?;
    let mut arm = SimulatedArm::new(motion.plane.pose, config.simulation.time_scale);

    // 1. 接受连接前先移动到初始位姿
    MotionSequencer::new(&motion)
        .home(&mut arm)
        .context("Initial move failed")?;

    // 2. 启动 TCP 服务（阻塞直到连接关闭）
    let mut server = Server::bind(config.server, motion, arm)?;
    server.run()?;

    info!("Server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use poke_server::EofPolicy;

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "poke-server",
            "--listen",
            "0.0.0.0:7000",
            "--framing",
            "delimited",
            "--keep-listening",
            "--time-scale",
            "0",
        ]);
        let config = args.resolve_config().unwrap();

        assert_eq!(config.server.listen.port(), 7000);
        assert_eq!(config.server.framing, Framing::Delimited);
        assert_eq!(config.server.after_close, AfterClose::Listen);
        assert_eq!(config.server.eof_policy, EofPolicy::Ignore);
        assert_eq!(config.simulation.time_scale, 0.0);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = Args::parse_from(["poke-server", "--recv-timeout=0"]);
        assert!(args.resolve_config().is_err());
    }
}
