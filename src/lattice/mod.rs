//! # 晶格几何内核
//!
//! 所有分析模块共享的线性代数基元：
//! - 分数坐标 ↔ 笛卡尔坐标
//! - 倒格子 bᵢ = 2π (aⱼ × aₖ) / V
//! - 周期边界下的最小镜像距离
//! - 基矢约化（见 `reduction`）
//!
//! 约定：`CellGeometry` 内部矩阵以**列**存放晶格向量 a, b, c，
//! 因此 `cart = basis * frac`；`Lattice.matrix` 则以行存放。
//!
//! ## 依赖关系
//! - 被 `symmetry/`, `xrd/`, `voids/`, `slab/`, `kpath/` 使用
//! - 使用 `models/structure.rs` 的 Lattice
//! - 使用 `nalgebra` 做 3x3 矩阵运算

pub mod reduction;

pub use reduction::reduce_basis;

use crate::error::{CrystanError, Result};
use crate::models::Lattice;

use nalgebra::{Matrix3, Vector3};
use std::f64::consts::PI;

/// 最小镜像搜索壳层的单轴上限，防止病态晶格导致无界搜索
const MAX_SHELL: i32 = 8;

/// 经过校验的晶胞几何
#[derive(Debug, Clone)]
pub struct CellGeometry {
    basis: Matrix3<f64>,
    inverse: Matrix3<f64>,
    reciprocal: Matrix3<f64>,
    volume: f64,
    /// 3×3×3 壳层的笛卡尔平移
    near_shell: Vec<Vector3<f64>>,
}

impl CellGeometry {
    /// 从 `Lattice`（行向量）构建
    pub fn new(lattice: &Lattice) -> Result<Self> {
        Self::from_basis(basis_matrix(lattice))
    }

    /// 从列向量基矩阵构建
    pub fn from_basis(basis: Matrix3<f64>) -> Result<Self> {
        let volume = basis.determinant();
        let scale = basis.column(0).norm() * basis.column(1).norm() * basis.column(2).norm();
        if !volume.is_finite() || volume.abs() < 1e-8 || volume.abs() < 1e-10 * scale {
            return Err(CrystanError::DegenerateLattice { volume });
        }
        let inverse = basis
            .try_inverse()
            .ok_or(CrystanError::DegenerateLattice { volume })?;

        // (A⁻¹)ᵀ 的列满足 rᵢ · aⱼ = δᵢⱼ
        let reciprocal = inverse.transpose() * (2.0 * PI);

        let mut near_shell = Vec::with_capacity(27);
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1 {
                    near_shell.push(basis * Vector3::new(i as f64, j as f64, k as f64));
                }
            }
        }

        Ok(Self {
            basis,
            inverse,
            reciprocal,
            volume: volume.abs(),
            near_shell,
        })
    }

    /// 晶格基矩阵（列 = a, b, c）
    pub fn basis(&self) -> &Matrix3<f64> {
        &self.basis
    }

    /// 倒格子矩阵（列 = b1, b2, b3，含 2π）
    pub fn reciprocal(&self) -> &Matrix3<f64> {
        &self.reciprocal
    }

    /// 倒格子，以行向量给出
    pub fn reciprocal_rows(&self) -> [[f64; 3]; 3] {
        let r = &self.reciprocal;
        [
            [r[(0, 0)], r[(1, 0)], r[(2, 0)]],
            [r[(0, 1)], r[(1, 1)], r[(2, 1)]],
            [r[(0, 2)], r[(1, 2)], r[(2, 2)]],
        ]
    }

    /// 晶胞体积（Å³，取绝对值）
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// 度规张量 G = Aᵀ A
    pub fn metric(&self) -> Matrix3<f64> {
        self.basis.transpose() * self.basis
    }

    /// 晶格向量长度
    pub fn lengths(&self) -> [f64; 3] {
        [
            self.basis.column(0).norm(),
            self.basis.column(1).norm(),
            self.basis.column(2).norm(),
        ]
    }

    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.basis * frac
    }

    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * cart
    }

    /// 覆盖半径 `radius` 内所有镜像所需的单轴平移范围
    ///
    /// 若 |A(d+n)| ≤ R 且 |dᵢ| ≤ ½，则 |nᵢ| ≤ R·|bᵢ|/2π + ½。
    pub fn shell_range(&self, radius: f64) -> [i32; 3] {
        let mut range = [1; 3];
        for (i, r) in range.iter_mut().enumerate() {
            let reach = radius * self.reciprocal.column(i).norm() / (2.0 * PI) + 0.5;
            *r = ((reach + 1e-9).floor() as i32).clamp(1, MAX_SHELL);
        }
        range
    }

    /// 分数坐标差 `d` 的最短周期镜像（笛卡尔向量）
    pub fn minimum_image_of(&self, d: &Vector3<f64>) -> Vector3<f64> {
        let wrapped = d.map(|x| x - x.round());
        let base = self.basis * wrapped;
        let range = self.shell_range(base.norm());

        let mut best = base;
        let mut best_sq = base.norm_squared();

        if range == [1, 1, 1] {
            for offset in &self.near_shell {
                let v = base + offset;
                let sq = v.norm_squared();
                if sq < best_sq {
                    best_sq = sq;
                    best = v;
                }
            }
            return best;
        }

        for i in -range[0]..=range[0] {
            for j in -range[1]..=range[1] {
                for k in -range[2]..=range[2] {
                    let v = base + self.basis * Vector3::new(i as f64, j as f64, k as f64);
                    let sq = v.norm_squared();
                    if sq < best_sq {
                        best_sq = sq;
                        best = v;
                    }
                }
            }
        }
        best
    }

    /// 从 p 指向 q 的最近周期镜像的笛卡尔位移（分数坐标输入）
    pub fn minimum_image_vector(&self, p: &Vector3<f64>, q: &Vector3<f64>) -> Vector3<f64> {
        self.minimum_image_of(&(q - p))
    }

    /// p 与 q 任意周期镜像之间的最短距离（分数坐标输入）
    pub fn minimum_image_distance(&self, p: &Vector3<f64>, q: &Vector3<f64>) -> f64 {
        self.minimum_image_vector(p, q).norm()
    }
}

/// `Lattice` 行向量 → 列向量基矩阵
pub fn basis_matrix(lattice: &Lattice) -> Matrix3<f64> {
    let m = lattice.matrix;
    Matrix3::new(
        m[0][0], m[1][0], m[2][0], //
        m[0][1], m[1][1], m[2][1], //
        m[0][2], m[1][2], m[2][2],
    )
}

/// 列向量基矩阵 → `Lattice`
pub fn lattice_from_basis(basis: &Matrix3<f64>) -> Lattice {
    let col = |i: usize| [basis[(0, i)], basis[(1, i)], basis[(2, i)]];
    Lattice::from_vectors([col(0), col(1), col(2)])
}

/// 分数坐标折回 [0, 1)
///
/// 与 1 相差不到 1e-10 的分量归零，避免 0.9999999999 与 0 被当作不同位置。
pub fn wrap_fractional(frac: &Vector3<f64>) -> Vector3<f64> {
    frac.map(|x| {
        let w = x - x.floor();
        if w > 1.0 - 1e-10 {
            0.0
        } else {
            w
        }
    })
}

pub fn fractional_to_cartesian(lattice: &Lattice, frac: [f64; 3]) -> Result<[f64; 3]> {
    let cell = CellGeometry::new(lattice)?;
    let cart = cell.to_cartesian(&Vector3::from(frac));
    Ok([cart.x, cart.y, cart.z])
}

pub fn cartesian_to_fractional(lattice: &Lattice, cart: [f64; 3]) -> Result<[f64; 3]> {
    let cell = CellGeometry::new(lattice)?;
    let frac = cell.to_fractional(&Vector3::from(cart));
    Ok([frac.x, frac.y, frac.z])
}

/// 倒格子行向量 b1, b2, b3（含 2π）
pub fn reciprocal_lattice(lattice: &Lattice) -> Result<[[f64; 3]; 3]> {
    Ok(CellGeometry::new(lattice)?.reciprocal_rows())
}

pub fn minimum_image_distance(lattice: &Lattice, p: [f64; 3], q: [f64; 3]) -> Result<f64> {
    let cell = CellGeometry::new(lattice)?;
    Ok(cell.minimum_image_distance(&Vector3::from(p), &Vector3::from(q)))
}
