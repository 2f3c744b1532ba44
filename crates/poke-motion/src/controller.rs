//! 运动控制协作方接口
//!
//! 实际的运动学 / 轨迹执行由外部控制器负责，本 crate 只通过
//! [`MotionController`] 调用它。

use std::time::Duration;
use thiserror::Error;

use crate::pose::Pose;

/// 运动控制错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// 控制器拒绝了目标位姿
    #[error("Target rejected by controller: {0}")]
    TargetRejected(String),

    /// 运动执行失败
    #[error("Motion failed: {0}")]
    MotionFailed(String),

    /// 位姿变换失败
    #[error("Pose transform failed: {0}")]
    TransformFailed(String),

    /// 控制器连接丢失
    #[error("Controller disconnected")]
    Disconnected,
}

/// 运动控制协作方
///
/// 所有方法都是阻塞的：`move_linear` 在运动完成（或失败）后才返回。
pub trait MotionController {
    /// 把以 `frame` 为参考系表示的 `local` 位姿变换到基坐标系
    ///
    /// 默认实现为刚体位姿复合。
    fn transform(&self, frame: &Pose, local: &Pose) -> Result<Pose, MotionError> {
        let pose = frame.compose(local);
        if !pose.is_finite() {
            return Err(MotionError::TransformFailed(format!(
                "non-finite result for {} in {}",
                local, frame
            )));
        }
        Ok(pose)
    }

    /// 直线运动到目标位姿（阻塞）
    fn move_linear(
        &mut self,
        target: &Pose,
        speed: f64,
        acceleration: f64,
    ) -> Result<(), MotionError>;

    /// 原地停留（阻塞，不可中断）
    fn dwell(&mut self, duration: Duration) {
        spin_sleep::sleep(duration);
    }
}

impl<C: MotionController + ?Sized> MotionController for &mut C {
    fn transform(&self, frame: &Pose, local: &Pose) -> Result<Pose, MotionError> {
        (**self).transform(frame, local)
    }

    fn move_linear(
        &mut self,
        target: &Pose,
        speed: f64,
        acceleration: f64,
    ) -> Result<(), MotionError> {
        (**self).move_linear(target, speed, acceleration)
    }

    fn dwell(&mut self, duration: Duration) {
        (**self).dwell(duration)
    }
}

impl<C: MotionController + ?Sized> MotionController for Box<C> {
    fn transform(&self, frame: &Pose, local: &Pose) -> Result<Pose, MotionError> {
        (**self).transform(frame, local)
    }

    fn move_linear(
        &mut self,
        target: &Pose,
        speed: f64,
        acceleration: f64,
    ) -> Result<(), MotionError> {
        (**self).move_linear(target, speed, acceleration)
    }

    fn dwell(&mut self, duration: Duration) {
        (**self).dwell(duration)
    }
}
