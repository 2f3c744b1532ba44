//! 仿真机械臂
//!
//! 无硬件时使用的 [`MotionController`] 实现：记录当前 TCP 位姿，
//! 按梯形速度曲线估算直线运动耗时，并按 `time_scale` 真实等待。

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::{MotionController, MotionError};
use crate::pose::Pose;

/// 梯形速度曲线下走完 `distance` 所需时间
///
/// 距离不足以加速到 `speed` 时退化为三角形曲线。
/// 结果无法用 [`Duration`] 表示（过远或非有限）时返回 `None`。
pub fn travel_time(distance: f64, speed: f64, acceleration: f64) -> Option<Duration> {
    if distance <= 0.0 || speed <= 0.0 || acceleration <= 0.0 {
        return Some(Duration::ZERO);
    }

    let ramp_distance = speed * speed / acceleration;
    let seconds = if distance >= ramp_distance {
        distance / speed + speed / acceleration
    } else {
        2.0 * (distance / acceleration).sqrt()
    };
    Duration::try_from_secs_f64(seconds).ok()
}

/// 仿真机械臂
#[derive(Debug, Clone)]
pub struct SimulatedArm {
    current: Pose,
    time_scale: f64,
    moves: u64,
    elapsed: Duration,
}

impl SimulatedArm {
    /// 创建仿真机械臂
    ///
    /// `time_scale` 为实际等待时间与计算运动时间之比；0 表示不等待。
    pub fn new(initial: Pose, time_scale: f64) -> Self {
        Self {
            current: initial,
            time_scale: if time_scale.is_finite() {
                time_scale.max(0.0)
            } else {
                0.0
            },
            moves: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// 当前 TCP 位姿
    pub fn current(&self) -> Pose {
        self.current
    }

    /// 已执行的运动次数
    pub fn move_count(&self) -> u64 {
        self.moves
    }

    /// 累计（未缩放的）运动时间
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// 按 `time_scale` 缩放后的实际等待时间
    fn scaled(&self, duration: Duration) -> Option<Duration> {
        if self.time_scale == 0.0 {
            return Some(Duration::ZERO);
        }
        Duration::try_from_secs_f64(duration.as_secs_f64() * self.time_scale).ok()
    }
}

impl MotionController for SimulatedArm {
    fn move_linear(
        &mut self,
        target: &Pose,
        speed: f64,
        acceleration: f64,
    ) -> Result<(), MotionError> {
        if !target.is_finite() {
            return Err(MotionError::TargetRejected(format!(
                "non-finite target {}",
                target
            )));
        }
        if !(speed > 0.0 && acceleration > 0.0) {
            return Err(MotionError::TargetRejected(format!(
                "invalid speed {} / acceleration {}",
                speed, acceleration
            )));
        }

        let distance = self.current.position.distance(&target.position);
        let (duration, wait) = travel_time(distance, speed, acceleration)
            .and_then(|duration| Some((duration, self.scaled(duration)?)))
            .ok_or_else(|| {
                MotionError::TargetRejected(format!(
                    "target {} out of reach ({:.3e} m away)",
                    target, distance
                ))
            })?;
        debug!(
            "sim move_linear: {:.1} mm in {:.3} s -> {}",
            distance * 1000.0,
            duration.as_secs_f64(),
            target
        );

        spin_sleep::sleep(wait);
        self.current = *target;
        self.moves += 1;
        self.elapsed = self.elapsed.saturating_add(duration);
        Ok(())
    }

    fn dwell(&mut self, duration: Duration) {
        info!("Holding for {:.2} s", duration.as_secs_f64());
        match self.scaled(duration) {
            Some(wait) => spin_sleep::sleep(wait),
            None => warn!("Dwell {:?} out of range after scaling, skipped", duration),
        }
        self.elapsed = self.elapsed.saturating_add(duration);
    }
}
