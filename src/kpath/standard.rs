//! # 标准晶胞
//!
//! 把对称分析给出的惯用晶胞整理为 Setyawan–Curtarolo 约定的轴序与取向，
//! 选出晶格变体并构造对应的标准原胞。
//!
//! - 正交：a < b < c（底心只要求 a < b，带心面为 ab 面）
//! - 单斜：唯一轴为 a，b 与 c 的夹角 α < 90°；简单单斜另要求 b ≤ c
//! - 菱方：由六方正向设置取原胞，按原胞夹角区分 RHL1/RHL2
//! - 三斜：在约化原胞的 24 种保手性轴序与符号中寻找倒格角全钝或全锐的取法

use super::catalogue::{CellParams, LatticeVariant};
use crate::error::{CrystanError, Result};
use crate::symmetry::{BravaisLattice, Centering, SymmetryInfo};

use nalgebra::{Matrix3, Vector3};
use std::f64::consts::FRAC_PI_2;

/// 角度判等容差（弧度）
const ANGLE_TOL: f64 = 1e-4;
/// 相对长度判等容差
const LENGTH_TOL: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct StandardCell {
    pub variant: LatticeVariant,
    /// 标准惯用胞（列向量）
    pub conventional: Matrix3<f64>,
    /// 标准原胞（列向量）
    pub primitive: Matrix3<f64>,
    pub params: CellParams,
}

// 惯用胞 → 原胞的系数矩阵（列为原胞矢量在惯用基下的坐标）
fn face_centred() -> Matrix3<f64> {
    Matrix3::new(0.0, 0.5, 0.5, 0.5, 0.0, 0.5, 0.5, 0.5, 0.0)
}

fn body_centred() -> Matrix3<f64> {
    Matrix3::new(-0.5, 0.5, 0.5, 0.5, -0.5, 0.5, 0.5, 0.5, -0.5)
}

fn base_centred_orthorhombic() -> Matrix3<f64> {
    Matrix3::new(0.5, 0.5, 0.0, -0.5, 0.5, 0.0, 0.0, 0.0, 1.0)
}

fn base_centred_monoclinic() -> Matrix3<f64> {
    Matrix3::new(0.5, -0.5, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 1.0)
}

fn rhombohedral_obverse() -> Matrix3<f64> {
    let (t, s) = (1.0 / 3.0, 2.0 / 3.0);
    Matrix3::new(s, -t, -t, t, t, -s, t, t, t)
}

fn columns(m: &Matrix3<f64>) -> [Vector3<f64>; 3] {
    [
        m.column(0).into_owned(),
        m.column(1).into_owned(),
        m.column(2).into_owned(),
    ]
}

fn angle(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    (u.dot(v) / (u.norm() * v.norm())).clamp(-1.0, 1.0).acos()
}

fn params_of(m: &Matrix3<f64>) -> CellParams {
    let [a, b, c] = columns(m);
    CellParams {
        a: a.norm(),
        b: b.norm(),
        c: c.norm(),
        alpha: angle(&b, &c),
    }
}

/// 倒格角 (kα, kβ, kγ)
fn reciprocal_angles(m: &Matrix3<f64>) -> Option<[f64; 3]> {
    let inverse = m.try_inverse()?;
    let [b1, b2, b3] = columns(&inverse.transpose());
    Some([angle(&b2, &b3), angle(&b1, &b3), angle(&b1, &b2)])
}

/// 按长度升序排列三个正交轴并保持右手系
fn sorted_axes(m: &Matrix3<f64>) -> Matrix3<f64> {
    let mut axes = columns(m).to_vec();
    axes.sort_by(|u, v| u.norm().total_cmp(&v.norm()));
    right_handed(axes[0], axes[1], axes[2])
}

fn right_handed(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Matrix3<f64> {
    let m = Matrix3::from_columns(&[a, b, c]);
    if m.determinant() < 0.0 {
        Matrix3::from_columns(&[a, b, -c])
    } else {
        m
    }
}

/// 二维 Gauss 约化
fn gauss_reduce(mut u: Vector3<f64>, mut v: Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    for _ in 0..100 {
        if v.norm_squared() < u.norm_squared() {
            std::mem::swap(&mut u, &mut v);
        }
        let m = (u.dot(&v) / u.norm_squared()).round();
        if m == 0.0 {
            break;
        }
        v -= u * m;
    }
    (u, v)
}

fn cell(variant: LatticeVariant, conventional: Matrix3<f64>, transform: Matrix3<f64>) -> StandardCell {
    let primitive = conventional * transform;
    let params = if matches!(variant, LatticeVariant::Rhl1 | LatticeVariant::Rhl2) {
        params_of(&primitive)
    } else {
        params_of(&conventional)
    };
    StandardCell {
        variant,
        conventional,
        primitive,
        params,
    }
}

/// 由对称分析结果构造标准晶胞
pub fn standardize(info: &SymmetryInfo) -> Result<StandardCell> {
    use BravaisLattice::*;
    use LatticeVariant::*;

    let conv = info.conventional_basis();
    let [a, b, c] = columns(&conv);
    let identity = Matrix3::identity();

    let standard = match info.bravais {
        CubicP => cell(Cub, conv, identity),
        CubicF => cell(Fcc, conv, face_centred()),
        CubicI => cell(Bcc, conv, body_centred()),
        TetragonalP => cell(Tet, conv, identity),
        TetragonalI => {
            let variant = if c.norm() < a.norm() { Bct1 } else { Bct2 };
            cell(variant, conv, body_centred())
        }
        OrthorhombicP => cell(Orc, sorted_axes(&conv), identity),
        OrthorhombicF => {
            let m = sorted_axes(&conv);
            let p = params_of(&m);
            let inv_a2 = 1.0 / (p.a * p.a);
            let diff = inv_a2 - (1.0 / (p.b * p.b) + 1.0 / (p.c * p.c));
            let variant = if diff.abs() < LENGTH_TOL * inv_a2 {
                Orcf3
            } else if diff > 0.0 {
                Orcf1
            } else {
                Orcf2
            };
            cell(variant, m, face_centred())
        }
        OrthorhombicI => cell(Orci, sorted_axes(&conv), body_centred()),
        OrthorhombicC => {
            // A 心轮换为 C 心
            let (a, b, c) = if info.centering == Centering::A {
                (b, c, a)
            } else {
                (a, b, c)
            };
            let m = if a.norm() > b.norm() {
                Matrix3::from_columns(&[b, a, -c])
            } else {
                Matrix3::from_columns(&[a, b, c])
            };
            cell(Orcc, m, base_centred_orthorhombic())
        }
        HexagonalP => cell(Hex, conv, identity),
        Rhombohedral => {
            let primitive = conv * rhombohedral_obverse();
            let [p1, p2, _] = columns(&primitive);
            let variant = if angle(&p1, &p2) < FRAC_PI_2 { Rhl1 } else { Rhl2 };
            cell(variant, conv, rhombohedral_obverse())
        }
        MonoclinicP => {
            let (p, q) = gauss_reduce(a, c);
            let (bs, cs) = if p.norm() <= q.norm() { (p, q) } else { (q, p) };
            let cs = if bs.dot(&cs) < 0.0 { -cs } else { cs };
            cell(Mcl, unique_axis_first(b, bs, cs), identity)
        }
        MonoclinicC => {
            // 带心矢量 (A+B)/2：A 保持不动，只用 A 约化 C
            let m = (c.dot(&a) / a.norm_squared()).round();
            let cs = c - a * m;
            let cs = if a.dot(&cs) < 0.0 { -cs } else { cs };
            let m = unique_axis_first(b, a, cs);
            let primitive = m * base_centred_monoclinic();
            let variant = monoclinic_c_variant(&m, &primitive)?;
            cell(variant, m, base_centred_monoclinic())
        }
        TriclinicP => {
            let reduced = crate::lattice::basis_matrix(&crate::models::Lattice::from_vectors(
                info.primitive_lattice,
            ));
            let (variant, m) = triclinic(&reduced)?;
            cell(variant, m, identity)
        }
    };

    log::debug!(
        "k-path lattice variant {} (a={:.4}, b={:.4}, c={:.4}, α={:.2}°)",
        standard.variant,
        standard.params.a,
        standard.params.b,
        standard.params.c,
        standard.params.alpha.to_degrees()
    );
    Ok(standard)
}

/// 唯一轴放在第一列；必要时翻转唯一轴保证右手系
fn unique_axis_first(unique: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Matrix3<f64> {
    let m = Matrix3::from_columns(&[unique, b, c]);
    if m.determinant() < 0.0 {
        Matrix3::from_columns(&[-unique, b, c])
    } else {
        m
    }
}

fn monoclinic_c_variant(conventional: &Matrix3<f64>, primitive: &Matrix3<f64>) -> Result<LatticeVariant> {
    use LatticeVariant::*;
    let [_, _, k_gamma] = reciprocal_angles(primitive).ok_or_else(|| CrystanError::InvalidStructure {
        reason: "singular primitive cell".to_string(),
    })?;
    if (k_gamma - FRAC_PI_2).abs() < ANGLE_TOL {
        return Ok(Mclc2);
    }
    if k_gamma > FRAC_PI_2 {
        return Ok(Mclc1);
    }
    let p = params_of(conventional);
    let (sin_a, cos_a) = (p.alpha.sin(), p.alpha.cos());
    let test = p.b * cos_a / p.c + p.b * p.b * sin_a * sin_a / (p.a * p.a);
    Ok(if (test - 1.0).abs() < LENGTH_TOL {
        Mclc4
    } else if test < 1.0 {
        Mclc3
    } else {
        Mclc5
    })
}

/// 24 种保手性的轴置换与符号组合
fn proper_settings(m: &Matrix3<f64>) -> Vec<Matrix3<f64>> {
    const PERMUTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [1, 2, 0], [2, 0, 1], [1, 0, 2], [0, 2, 1], [2, 1, 0]];
    let cols = columns(m);
    let mut out = Vec::with_capacity(24);
    for perm in PERMUTATIONS {
        for signs in 0..8u8 {
            let sign = |i: usize| if signs & (1 << i) != 0 { -1.0 } else { 1.0 };
            let candidate = Matrix3::from_columns(&[
                cols[perm[0]] * sign(0),
                cols[perm[1]] * sign(1),
                cols[perm[2]] * sign(2),
            ]);
            if candidate.determinant() > 0.0 {
                out.push(candidate);
            }
        }
    }
    out
}

fn triclinic(reduced: &Matrix3<f64>) -> Result<(LatticeVariant, Matrix3<f64>)> {
    use LatticeVariant::*;
    let right = |x: f64| (x - FRAC_PI_2).abs() < ANGLE_TOL;
    let obtuse = |x: f64| x > FRAC_PI_2 + ANGLE_TOL;
    let acute = |x: f64| x < FRAC_PI_2 - ANGLE_TOL;

    let candidates = proper_settings(reduced);
    let mut found: Option<(LatticeVariant, Matrix3<f64>)> = None;
    for m in &candidates {
        let Some([ka, kb, kg]) = reciprocal_angles(m) else {
            continue;
        };
        let variant = if obtuse(ka) && obtuse(kb) && right(kg) {
            Some(Tri2a)
        } else if acute(ka) && acute(kb) && right(kg) {
            Some(Tri2b)
        } else if obtuse(ka) && obtuse(kb) && obtuse(kg) && kg <= ka.min(kb) {
            Some(Tri1a)
        } else if acute(ka) && acute(kb) && acute(kg) && kg >= ka.max(kb) {
            Some(Tri1b)
        } else {
            None
        };
        if let Some(variant) = variant {
            found = Some((variant, *m));
            break;
        }
    }

    if let Some(found) = found {
        return Ok(found);
    }

    // 两个以上倒格角为直角时没有严格匹配，按钝角个数取多数
    let angles = reciprocal_angles(reduced).ok_or_else(|| CrystanError::InvalidStructure {
        reason: "singular reduced cell".to_string(),
    })?;
    let obtuse_count = angles.iter().filter(|&&x| x > FRAC_PI_2).count();
    let variant = if obtuse_count >= 2 { Tri1a } else { Tri1b };
    log::warn!(
        "triclinic cell has no all-obtuse or all-acute reciprocal setting, using {}",
        variant
    );
    Ok((variant, *reduced))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_transforms_have_expected_volume_ratio() {
        assert!((face_centred().determinant() - 0.25).abs() < 1e-12);
        assert!((body_centred().determinant() - 0.5).abs() < 1e-12);
        assert!((base_centred_orthorhombic().determinant() - 0.5).abs() < 1e-12);
        assert!((base_centred_monoclinic().determinant() - 0.5).abs() < 1e-12);
        assert!((rhombohedral_obverse().determinant() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_sorted_axes_right_handed() {
        let m = Matrix3::from_diagonal(&Vector3::new(5.0, 3.0, 4.0));
        let sorted = sorted_axes(&m);
        let p = params_of(&sorted);
        assert!((p.a - 3.0).abs() < 1e-12);
        assert!((p.b - 4.0).abs() < 1e-12);
        assert!((p.c - 5.0).abs() < 1e-12);
        assert!(sorted.determinant() > 0.0);
    }

    #[test]
    fn test_gauss_reduce() {
        let (u, v) = gauss_reduce(Vector3::new(1.0, 0.0, 0.0), Vector3::new(3.2, 1.0, 0.0));
        assert!((u.norm() - 1.0).abs() < 1e-12);
        assert!((v - Vector3::new(0.2, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_triclinic_obtuse_setting() {
        let reduced = crate::lattice::basis_matrix(&crate::models::Lattice::from_parameters(
            3.1, 4.7, 5.3, 71.0, 83.0, 97.0,
        ));
        let (variant, m) = triclinic(&reduced).unwrap();
        let [ka, kb, kg] = reciprocal_angles(&m).unwrap();
        assert!(m.determinant() > 0.0);
        match variant {
            LatticeVariant::Tri1a => {
                assert!(ka > PI / 2.0 && kb > PI / 2.0 && kg > PI / 2.0);
                assert!(kg <= ka && kg <= kb);
            }
            LatticeVariant::Tri1b => {
                assert!(ka < PI / 2.0 && kb < PI / 2.0 && kg < PI / 2.0);
                assert!(kg >= ka && kg >= kb);
            }
            other => panic!("unexpected variant {}", other),
        }
    }
}
