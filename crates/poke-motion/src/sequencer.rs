//! 戳动序列器
//!
//! 把一条 `(primary, secondary)` 命令映射为平面坐标系下的目标点，
//! 并按 接近 → 下压 → 停留 → 回退 的顺序驱动控制器。
//!
//! # 安全不变量
//!
//! 下压深度始终被限制在 `[0, max_depth]` 内，任何输入都无法绕过。
//!
//! # 失败处理
//!
//! 任一步骤失败时序列立即中止，后续步骤（包括回退）不会执行。
//! 唯一例外是 [`OnPokeFailure::Retract`]：下压失败后尝试一次回退。

use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{MotionConfig, OnPokeFailure};
use crate::controller::{MotionController, MotionError};
use crate::pose::Pose;

/// 序列步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// 启动时的初始定位
    Home,
    /// 在 z=0 处到达目标上方
    Approach,
    /// 下压到限幅后的深度
    Poke,
    /// 回到 z=0
    Retract,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Home => "home",
            Step::Approach => "approach",
            Step::Poke => "poke",
            Step::Retract => "retract",
        };
        f.write_str(name)
    }
}

/// 序列执行错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Sequence aborted at {step}: {source}")]
pub struct SequenceError {
    /// 失败的步骤
    pub step: Step,
    /// 控制器错误
    pub source: MotionError,
    /// 按 [`OnPokeFailure::Retract`] 尝试的回退结果（未尝试时为 `None`）
    pub recovery: Option<Result<(), MotionError>>,
}

/// 单条命令的平面坐标系目标
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PokePlan {
    /// 平面 X（米）
    pub x: f64,
    /// 平面 Y（米）
    pub y: f64,
    /// 限幅后的平面 Z（米）
    pub z: f64,
    /// 输入深度是否被限幅
    pub clamped: bool,
}

impl PokePlan {
    /// z=0 处的平面位姿
    pub fn surface(&self) -> Pose {
        Pose::from_position(self.x, self.y, 0.0)
    }

    /// 下压深度处的平面位姿
    pub fn depth(&self) -> Pose {
        Pose::from_position(self.x, self.y, self.z)
    }
}

/// 执行完成的戳动
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PokeReport {
    pub plan: PokePlan,
    /// 基坐标系下的接近 / 回退位姿
    pub surface: Pose,
    /// 基坐标系下的下压位姿
    pub depth: Pose,
}

/// 深度限幅到 `[0, max_depth]`
///
/// 非有限输入（NaN）按 0 处理。
pub fn clamp_depth(value: f64, max_depth: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.max(0.0).min(max_depth)
}

/// 戳动序列器
///
/// 持有只读配置的引用；控制器在每次调用时传入。
#[derive(Debug, Clone, Copy)]
pub struct MotionSequencer<'a> {
    config: &'a MotionConfig,
}

impl<'a> MotionSequencer<'a> {
    pub fn new(config: &'a MotionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &'a MotionConfig {
        self.config
    }

    /// 计算平面坐标系下的目标（纯函数）
    pub fn plan(&self, primary: f64, secondary: f64) -> PokePlan {
        let params = &self.config.parameters;
        let z = clamp_depth(secondary, params.max_depth);
        PokePlan {
            x: params.start_offset + params.gain * primary,
            y: params.lateral_offset,
            z,
            clamped: z != secondary,
        }
    }

    /// 启动定位：平面 `(start_offset, lateral_offset, 0)`，随后等待稳定
    pub fn home<C: MotionController>(&self, controller: &mut C) -> Result<Pose, SequenceError> {
        let params = &self.config.parameters;
        let local = Pose::from_position(params.start_offset, params.lateral_offset, 0.0);
        info!(
            "Moving to initial plane pose: X={:.3} m, Y={:.3} m, Z=0.000 m",
            params.start_offset, params.lateral_offset
        );

        let target = self.to_base(controller, &local, Step::Home)?;
        self.move_to(controller, &target, Step::Home)?;
        controller.dwell(params.home_settle());
        Ok(target)
    }

    /// 执行一次完整的 接近 → 下压 → 停留 → 回退
    pub fn execute<C: MotionController>(
        &self,
        controller: &mut C,
        primary: f64,
        secondary: f64,
    ) -> Result<PokeReport, SequenceError> {
        let params = &self.config.parameters;
        let plan = self.plan(primary, secondary);

        info!(
            "Poke: est_x={:.1} mm, cmd_z={:.1} mm -> plane X={:.3} m, Y={:.3} m, Z={:.3} m",
            primary * 1000.0,
            secondary * 1000.0,
            plan.x,
            plan.y,
            plan.z
        );
        if plan.clamped {
            warn!(
                "Depth command {:.4} m clamped to {:.4} m (limit {:.4} m)",
                secondary, plan.z, params.max_depth
            );
        }

        let surface = self.to_base(controller, &plan.surface(), Step::Approach)?;
        let depth = self.to_base(controller, &plan.depth(), Step::Poke)?;

        self.move_to(controller, &surface, Step::Approach)?;

        if let Err(mut err) = self.move_to(controller, &depth, Step::Poke) {
            if params.on_poke_failure == OnPokeFailure::Retract {
                warn!("Poke failed, attempting retract to surface");
                err.recovery = Some(controller.move_linear(
                    &surface,
                    params.speed,
                    params.acceleration,
                ));
            }
            return Err(err);
        }

        controller.dwell(params.dwell());
        self.move_to(controller, &surface, Step::Retract)?;

        Ok(PokeReport {
            plan,
            surface,
            depth,
        })
    }

    fn to_base<C: MotionController>(
        &self,
        controller: &C,
        local: &Pose,
        step: Step,
    ) -> Result<Pose, SequenceError> {
        controller
            .transform(&self.config.plane.pose, local)
            .map_err(|source| SequenceError {
                step,
                source,
                recovery: None,
            })
    }

    fn move_to<C: MotionController>(
        &self,
        controller: &mut C,
        target: &Pose,
        step: Step,
    ) -> Result<(), SequenceError> {
        let params = &self.config.parameters;
        debug!("{}: move_linear to {}", step, target);
        controller
            .move_linear(target, params.speed, params.acceleration)
            .map_err(|source| SequenceError {
                step,
                source,
                recovery: None,
            })
    }
}
