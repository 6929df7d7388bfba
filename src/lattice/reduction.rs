//! # 晶格基矢约化
//!
//! 反复做两两 Gauss 约化，并检查 c ± a ± b 组合，直到三条基矢都无法再缩短。
//! 对三维晶格，这一条件与 Minkowski 约化等价。
//!
//! ## 依赖关系
//! - 被 `symmetry/` 用于在约化基中枚举晶格自同构
//! - 被 `slab/` 用于输出更规整的面内基

use nalgebra::{Matrix3, Vector3};

const MAX_PASSES: usize = 200;

/// 约化基矢
///
/// 返回 `(reduced, transform)`，满足 `reduced = basis * transform`；
/// `transform` 为整数幺模矩阵且行列式为 +1。输入、输出均以列存放基矢。
pub fn reduce_basis(basis: &Matrix3<f64>) -> (Matrix3<f64>, Matrix3<f64>) {
    let mut cols: [Vector3<f64>; 3] = [
        basis.column(0).into_owned(),
        basis.column(1).into_owned(),
        basis.column(2).into_owned(),
    ];
    let mut trans: [Vector3<f64>; 3] = [Vector3::x(), Vector3::y(), Vector3::z()];
    let scale = cols.iter().map(|c| c.norm_squared()).fold(0.0, f64::max);
    let eps = 1e-10 * scale;

    for _ in 0..MAX_PASSES {
        let mut changed = false;

        // 按长度排序（稳定排序保证确定性）
        let mut order = [0usize, 1, 2];
        order.sort_by(|&i, &j| {
            cols[i]
                .norm_squared()
                .partial_cmp(&cols[j].norm_squared())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        cols = [cols[order[0]], cols[order[1]], cols[order[2]]];
        trans = [trans[order[0]], trans[order[1]], trans[order[2]]];

        for i in 0..3 {
            for j in 0..3 {
                if i == j {
                    continue;
                }
                let mu = (cols[i].dot(&cols[j]) / cols[j].norm_squared()).round();
                if mu == 0.0 {
                    continue;
                }
                let candidate = cols[i] - cols[j] * mu;
                if candidate.norm_squared() < cols[i].norm_squared() - eps {
                    cols[i] = candidate;
                    trans[i] = trans[i] - trans[j] * mu;
                    changed = true;
                }
            }
        }

        for s1 in [-1.0, 1.0] {
            for s2 in [-1.0, 1.0] {
                let candidate = cols[2] + cols[0] * s1 + cols[1] * s2;
                if candidate.norm_squared() < cols[2].norm_squared() - eps {
                    cols[2] = candidate;
                    trans[2] = trans[2] + trans[0] * s1 + trans[1] * s2;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let mut transform = Matrix3::from_columns(&trans);
    if transform.determinant() < 0.0 {
        cols[2] = -cols[2];
        transform.set_column(2, &(-trans[2]));
    }

    (Matrix3::from_columns(&cols), transform.map(|x| x.round()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduce_skewed_cubic() {
        // 简单立方的一个倾斜基：a, a+b, a+b+c
        let basis = Matrix3::new(
            4.0, 4.0, 4.0, //
            0.0, 4.0, 4.0, //
            0.0, 0.0, 4.0,
        );
        let (reduced, transform) = reduce_basis(&basis);

        for i in 0..3 {
            assert!((reduced.column(i).norm() - 4.0).abs() < 1e-9);
        }
        assert!((transform.determinant() - 1.0).abs() < 1e-9);
        assert!(((basis * transform) - reduced).norm() < 1e-9);
    }

    #[test]
    fn test_reduce_keeps_reduced_basis() {
        let basis = Matrix3::new(
            3.0, 0.0, 0.0, //
            0.0, 4.0, 0.0, //
            0.0, 0.0, 5.0,
        );
        let (reduced, _) = reduce_basis(&basis);
        let lengths: Vec<f64> = (0..3).map(|i| reduced.column(i).norm()).collect();
        assert!((lengths[0] - 3.0).abs() < 1e-12);
        assert!((lengths[1] - 4.0).abs() < 1e-12);
        assert!((lengths[2] - 5.0).abs() < 1e-12);
    }
}
