//! # Poke Motion
//!
//! 平面坐标系下的戳动运动规划与执行
//!
//! ## 模块
//!
//! - `pose`: 位姿类型与刚体复合
//! - `config`: 运动参数与平面参考系
//! - `controller`: 外部运动控制协作方接口
//! - `sequencer`: 接近 / 下压 / 停留 / 回退 序列
//! - `sim`: 无硬件时使用的仿真机械臂
//!
//! ## 使用示例
//!
//! ```rust
//! use poke_motion::{MotionConfig, MotionSequencer, Pose, SimulatedArm};
//!
//! let config = MotionConfig::default();
//! let sequencer = MotionSequencer::new(&config);
//! let mut arm = SimulatedArm::new(Pose::IDENTITY, 0.0);
//!
//! let report = sequencer.execute(&mut arm, 0.05, 0.03).unwrap();
//! assert_eq!(report.plan.z, 0.03);
//! assert_eq!(arm.move_count(), 3);
//! ```

pub mod config;
pub mod controller;
pub mod pose;
pub mod sequencer;
pub mod sim;

pub use config::{ConfigError, MotionConfig, MotionParameters, OnPokeFailure, PlaneFrame};
pub use controller::{MotionController, MotionError};
pub use pose::{Pose, Position3D};
pub use sequencer::{MotionSequencer, PokePlan, PokeReport, SequenceError, Step, clamp_depth};
pub use sim::{SimulatedArm, travel_time};
