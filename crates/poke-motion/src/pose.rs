//! 笛卡尔位姿类型
//!
//! 使用工业臂常见的 `[x, y, z, rx, ry, rz]` 编码：位置单位为米，
//! 姿态为旋转向量（转轴 × 转角，弧度）。
//!
//! # 示例
//!
//! ```rust
//! use poke_motion::Pose;
//!
//! let plane = Pose::from_array([0.0, 0.0, 0.2, 0.0, 0.0, std::f64::consts::FRAC_PI_2]);
//! let local = Pose::from_position(0.1, 0.0, 0.0);
//!
//! // 平面坐标系下的 +X 在基坐标系下变为 +Y
//! let base = plane.compose(&local);
//! assert!((base.position.y - 0.1).abs() < 1e-12);
//! ```

use nalgebra::{Isometry3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 三维位置向量（米）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position3D {
    /// X 坐标（米）
    pub x: f64,
    /// Y 坐标（米）
    pub y: f64,
    /// Z 坐标（米）
    pub z: f64,
}

impl Position3D {
    /// 创建新的三维位置
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Position3D { x, y, z }
    }

    /// 零向量
    pub const ZERO: Self = Position3D::new(0.0, 0.0, 0.0);

    /// 计算向量长度（范数）
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// 两点间直线距离
    pub fn distance(&self, other: &Position3D) -> f64 {
        Position3D::new(self.x - other.x, self.y - other.y, self.z - other.z).norm()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    fn from_vector(v: &Vector3<f64>) -> Self {
        Position3D::new(v.x, v.y, v.z)
    }
}

impl fmt::Display for Position3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4}, {:.4})", self.x, self.y, self.z)
    }
}

/// 笛卡尔位姿（位置 + 旋转向量）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct Pose {
    /// 位置（米）
    pub position: Position3D,
    /// 旋转向量（弧度），方向为转轴，模长为转角
    pub rotation: Position3D,
}

impl Pose {
    /// 原点，无旋转
    pub const IDENTITY: Self = Pose {
        position: Position3D::ZERO,
        rotation: Position3D::ZERO,
    };

    pub const fn new(position: Position3D, rotation: Position3D) -> Self {
        Pose { position, rotation }
    }

    /// 仅平移、无旋转的位姿
    pub const fn from_position(x: f64, y: f64, z: f64) -> Self {
        Pose::new(Position3D::new(x, y, z), Position3D::ZERO)
    }

    /// 从 `[x, y, z, rx, ry, rz]` 创建
    pub const fn from_array(v: [f64; 6]) -> Self {
        Pose::new(
            Position3D::new(v[0], v[1], v[2]),
            Position3D::new(v[3], v[4], v[5]),
        )
    }

    /// 转换为 `[x, y, z, rx, ry, rz]`
    pub fn to_array(self) -> [f64; 6] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }

    pub fn to_isometry(self) -> Isometry3<f64> {
        Isometry3::new(self.position.to_vector(), self.rotation.to_vector())
    }

    pub fn from_isometry(iso: &Isometry3<f64>) -> Self {
        Pose::new(
            Position3D::from_vector(&iso.translation.vector),
            Position3D::from_vector(&iso.rotation.scaled_axis()),
        )
    }

    /// 位姿复合：把以 `self` 为参考系表示的 `local` 变换到 `self` 的父坐标系
    pub fn compose(&self, local: &Pose) -> Pose {
        Pose::from_isometry(&(self.to_isometry() * local.to_isometry()))
    }
}

impl From<[f64; 6]> for Pose {
    fn from(v: [f64; 6]) -> Self {
        Pose::from_array(v)
    }
}

impl From<Pose> for [f64; 6] {
    fn from(pose: Pose) -> Self {
        pose.to_array()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pose(pos: {}, rot: {})", self.position, self.rotation)
    }
}
