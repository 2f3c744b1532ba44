//! 运动配置
//!
//! 启动时构造一次，之后只读，以引用方式传给 [`MotionSequencer`](crate::MotionSequencer)。

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::pose::Pose;

/// 配置校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 参数必须为有限值
    #[error("Parameter `{name}` must be finite, got {value}")]
    NotFinite { name: &'static str, value: f64 },

    /// 参数必须为正
    #[error("Parameter `{name}` must be > 0, got {value}")]
    NotPositive { name: &'static str, value: f64 },

    /// 参数不能为负
    #[error("Parameter `{name}` must be >= 0, got {value}")]
    Negative { name: &'static str, value: f64 },

    /// 时间参数超出 [`Duration`] 可表示范围
    #[error("Parameter `{name}` is out of range, got {value}")]
    OutOfRange { name: &'static str, value: f64 },
}

/// 下压失败后的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnPokeFailure {
    /// 立即中止，不再发出任何运动
    #[default]
    Abort,
    /// 尝试一次回退到 z=0 后再上报错误
    Retract,
}

/// 运动参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotionParameters {
    /// 直线运动速度（m/s）
    pub speed: f64,
    /// 直线运动加速度（m/s²）
    pub acceleration: f64,
    /// 下压后停留时间（秒）
    pub dwell_seconds: f64,
    /// 平面 Y 方向固定偏移（米）
    pub lateral_offset: f64,
    /// primary 估计值的放大系数
    pub gain: f64,
    /// 平面 X 方向起始偏移（米），叠加到每个目标上
    pub start_offset: f64,
    /// 下压深度上限（米）
    pub max_depth: f64,
    /// 初始位姿到达后的稳定等待时间（秒）
    pub home_settle_seconds: f64,
    /// 下压失败策略
    pub on_poke_failure: OnPokeFailure,
}

impl Default for MotionParameters {
    fn default() -> Self {
        Self {
            speed: 0.1,
            acceleration: 0.1,
            dwell_seconds: 2.0,
            lateral_offset: 0.20,
            gain: 3.0, // 50 mm 估计 → 150 mm 运动
            start_offset: 0.050,
            max_depth: 0.12,
            home_settle_seconds: 0.5,
            on_poke_failure: OnPokeFailure::Abort,
        }
    }
}

impl MotionParameters {
    /// 校验参数
    ///
    /// - 所有数值必须有限
    /// - `speed` / `acceleration` 必须为正
    /// - `max_depth` / `dwell_seconds` / `home_settle_seconds` 不能为负
    /// - 时间参数必须能表示为 [`Duration`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [
            ("speed", self.speed),
            ("acceleration", self.acceleration),
            ("dwell_seconds", self.dwell_seconds),
            ("lateral_offset", self.lateral_offset),
            ("gain", self.gain),
            ("start_offset", self.start_offset),
            ("max_depth", self.max_depth),
            ("home_settle_seconds", self.home_settle_seconds),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { name, value });
            }
        }

        for (name, value) in [("speed", self.speed), ("acceleration", self.acceleration)] {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }

        for (name, value) in [
            ("max_depth", self.max_depth),
            ("dwell_seconds", self.dwell_seconds),
            ("home_settle_seconds", self.home_settle_seconds),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }

        for (name, value) in [
            ("dwell_seconds", self.dwell_seconds),
            ("home_settle_seconds", self.home_settle_seconds),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }

        Ok(())
    }

    /// 停留时间（未通过校验的值视为 0）
    pub fn dwell(&self) -> Duration {
        Duration::try_from_secs_f64(self.dwell_seconds).unwrap_or_default()
    }

    /// 初始位姿稳定时间（未通过校验的值视为 0）
    pub fn home_settle(&self) -> Duration {
        Duration::try_from_secs_f64(self.home_settle_seconds).unwrap_or_default()
    }
}

/// 平面参考系（基坐标系下的位姿）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaneFrame {
    pub pose: Pose,
}

impl Default for PlaneFrame {
    fn default() -> Self {
        // 标定得到的特征平面：[px, py, pz, rx, ry, rz]
        Self {
            pose: Pose::from_array([
                -38.52 * 0.001,
                -417.55 * 0.001,
                0.02707 - 0.0016 + 0.15,
                1.743,
                -2.614,
                0.000,
            ]),
        }
    }
}

impl PlaneFrame {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in ["x", "y", "z", "rx", "ry", "rz"]
            .into_iter()
            .zip(self.pose.to_array())
        {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { name, value });
            }
        }
        Ok(())
    }
}

/// 运动配置（参数 + 平面参考系）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotionConfig {
    pub parameters: MotionParameters,
    pub plane: PlaneFrame,
}

impl MotionConfig {
    /// 校验后构造
    pub fn new(parameters: MotionParameters, plane: PlaneFrame) -> Result<Self, ConfigError> {
        parameters.validate()?;
        plane.validate()?;
        Ok(Self { parameters, plane })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(MotionParameters::default().validate().is_ok());
        assert!(PlaneFrame::default().validate().is_ok());
        assert!(MotionConfig::new(MotionParameters::default(), PlaneFrame::default()).is_ok());
    }

    #[test]
    fn test_default_values() {
        let params = MotionParameters::default();
        assert_eq!(params.max_depth, 0.12);
        assert_eq!(params.gain, 3.0);
        assert_eq!(params.dwell(), Duration::from_secs(2));
        assert_eq!(params.home_settle(), Duration::from_millis(500));
        assert_eq!(params.on_poke_failure, OnPokeFailure::Abort);
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        let params = MotionParameters {
            speed: 0.0,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ConfigError::NotPositive {
                name: "speed",
                value: 0.0
            })
        );
    }

    #[test]
    fn test_rejects_negative_depth() {
        let params = MotionParameters {
            max_depth: -0.01,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::Negative {
                name: "max_depth",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_nan() {
        let params = MotionParameters {
            gain: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::NotFinite { name: "gain", .. })
        ));

        let plane = PlaneFrame {
            pose: Pose::from_array([0.0, 0.0, f64::INFINITY, 0.0, 0.0, 0.0]),
        };
        assert!(matches!(
            plane.validate(),
            Err(ConfigError::NotFinite { name: "z", .. })
        ));
    }

    #[test]
    fn test_rejects_unrepresentable_durations() {
        let params = MotionParameters {
            dwell_seconds: 1e20,
            ..Default::default()
        };
        assert_eq!(
            params.validate(),
            Err(ConfigError::OutOfRange {
                name: "dwell_seconds",
                value: 1e20
            })
        );
        assert_eq!(params.dwell(), Duration::ZERO);

        let params = MotionParameters {
            home_settle_seconds: 1e20,
            ..Default::default()
        };
        assert!(matches!(
            params.validate(),
            Err(ConfigError::OutOfRange {
                name: "home_settle_seconds",
                ..
            })
        ));
        assert!(MotionConfig::new(params, PlaneFrame::default()).is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let params: MotionParameters =
            toml::from_str("max_depth = 0.05\non_poke_failure = \"retract\"").unwrap();
        assert_eq!(params.max_depth, 0.05);
        assert_eq!(params.on_poke_failure, OnPokeFailure::Retract);
        assert_eq!(params.speed, 0.1);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(toml::from_str::<MotionParameters>("max_dpeth = 0.05").is_err());
    }
}
