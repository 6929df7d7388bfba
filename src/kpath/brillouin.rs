//! # 布里渊区线框
//!
//! 第一布里渊区即倒格子的 Wigner–Seitz 胞：对每个相关倒格点 G 取半空间
//! G·k ≤ |G|²/2，三平面交点中满足全部约束的为顶点，同属两个以上面的顶点对为棱。
//! 立方晶系使用精确构造；其他晶系只给出坐标轴对齐的占位盒子。

use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

/// 倒格点枚举范围（每个方向 ±2）
const NEIGHBOUR_RANGE: i32 = 2;
const REL_TOL: f64 = 1e-8;

/// 笛卡尔线框
#[derive(Debug, Clone, Serialize)]
pub struct Wireframe {
    pub vertices: Vec<[f64; 3]>,
    pub edges: Vec<[[f64; 3]; 2]>,
    /// 是否为精确的 Wigner–Seitz 胞
    pub exact: bool,
}

impl Wireframe {
    fn from_vertices(vertices: Vec<Vector3<f64>>, edges: Vec<(usize, usize)>, exact: bool) -> Self {
        let point = |v: &Vector3<f64>| [v.x, v.y, v.z];
        Self {
            edges: edges
                .iter()
                .map(|&(i, j)| [point(&vertices[i]), point(&vertices[j])])
                .collect(),
            vertices: vertices.iter().map(point).collect(),
            exact,
        }
    }
}

/// 决定 Wigner–Seitz 胞的倒格点：中点不被其他任何倒格点的平面截掉
fn relevant_vectors(reciprocal: &Matrix3<f64>) -> Vec<Vector3<f64>> {
    let r = NEIGHBOUR_RANGE;
    let mut points = Vec::new();
    for i in -r..=r {
        for j in -r..=r {
            for k in -r..=r {
                if (i, j, k) != (0, 0, 0) {
                    points.push(reciprocal * Vector3::new(i as f64, j as f64, k as f64));
                }
            }
        }
    }

    points
        .iter()
        .enumerate()
        .filter(|(idx, g)| {
            let mid = *g * 0.5;
            points.iter().enumerate().all(|(other, h)| {
                other == *idx || h.dot(&mid) < 0.5 * h.norm_squared() * (1.0 - REL_TOL)
            })
        })
        .map(|(_, g)| *g)
        .collect()
}

/// 倒格基（列向量）的精确 Wigner–Seitz 胞
pub fn wigner_seitz(reciprocal: &Matrix3<f64>) -> Wireframe {
    let planes = relevant_vectors(reciprocal);
    let scale = planes.iter().map(|g| g.norm_squared()).fold(0.0, f64::max);
    let tol = REL_TOL * scale;
    let on_plane = |g: &Vector3<f64>, v: &Vector3<f64>| (g.dot(v) - 0.5 * g.norm_squared()).abs() < tol;
    let inside = |v: &Vector3<f64>| planes.iter().all(|g| g.dot(v) <= 0.5 * g.norm_squared() + tol);

    let mut vertices: Vec<Vector3<f64>> = Vec::new();
    let n = planes.len();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let m = Matrix3::from_rows(&[
                    planes[i].transpose(),
                    planes[j].transpose(),
                    planes[k].transpose(),
                ]);
                if m.determinant().abs() < REL_TOL * scale.powf(1.5) {
                    continue;
                }
                let Some(inverse) = m.try_inverse() else {
                    continue;
                };
                let rhs = Vector3::new(
                    0.5 * planes[i].norm_squared(),
                    0.5 * planes[j].norm_squared(),
                    0.5 * planes[k].norm_squared(),
                );
                let v = inverse * rhs;
                if inside(&v) && !vertices.iter().any(|u| (u - v).norm() < 1e-6 * scale.sqrt()) {
                    vertices.push(v);
                }
            }
        }
    }

    let mut edges = Vec::new();
    for p in 0..vertices.len() {
        for q in (p + 1)..vertices.len() {
            let shared = planes
                .iter()
                .filter(|g| on_plane(g, &vertices[p]) && on_plane(g, &vertices[q]))
                .count();
            if shared >= 2 {
                edges.push((p, q));
            }
        }
    }

    log::debug!(
        "Wigner-Seitz cell: {} faces, {} vertices, {} edges",
        n,
        vertices.len(),
        edges.len()
    );
    Wireframe::from_vertices(vertices, edges, true)
}

/// 坐标轴对齐的占位盒子，半边长取倒格矢在该轴上最大分量的一半
pub fn placeholder_box(reciprocal: &Matrix3<f64>) -> Wireframe {
    let half: Vector3<f64> =
        Vector3::from_fn(|axis, _| 0.5 * (0..3).map(|j| reciprocal[(axis, j)].abs()).fold(0.0, f64::max));

    let corner = |bits: usize| {
        Vector3::from_fn(|axis, _| if bits & (1 << axis) != 0 { half[axis] } else { -half[axis] })
    };
    let vertices: Vec<Vector3<f64>> = (0..8).map(corner).collect();
    let mut edges = Vec::new();
    for p in 0..8usize {
        for axis in 0..3 {
            let q = p | (1 << axis);
            if q != p {
                edges.push((p, q));
            }
        }
    }
    Wireframe::from_vertices(vertices, edges, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn reciprocal_of(real: Matrix3<f64>) -> Matrix3<f64> {
        real.try_inverse().unwrap().transpose() * (2.0 * PI)
    }

    #[test]
    fn test_simple_cubic_zone_is_cube() {
        let a = 4.0;
        let wf = wigner_seitz(&reciprocal_of(Matrix3::identity() * a));
        assert!(wf.exact);
        assert_eq!(wf.vertices.len(), 8);
        assert_eq!(wf.edges.len(), 12);
        for v in &wf.vertices {
            for x in v {
                assert!((x.abs() - PI / a).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_fcc_zone_is_truncated_octahedron() {
        let a = 3.6;
        let primitive = Matrix3::new(0.0, 0.5, 0.5, 0.5, 0.0, 0.5, 0.5, 0.5, 0.0) * a;
        let wf = wigner_seitz(&reciprocal_of(primitive));
        assert_eq!(wf.vertices.len(), 24);
        assert_eq!(wf.edges.len(), 36);
    }

    #[test]
    fn test_bcc_zone_is_rhombic_dodecahedron() {
        let a = 2.87;
        let primitive = Matrix3::new(-0.5, 0.5, 0.5, 0.5, -0.5, 0.5, 0.5, 0.5, -0.5) * a;
        let wf = wigner_seitz(&reciprocal_of(primitive));
        assert_eq!(wf.vertices.len(), 14);
        assert_eq!(wf.edges.len(), 24);
    }

    #[test]
    fn test_placeholder_box() {
        let wf = placeholder_box(&reciprocal_of(Matrix3::identity() * 2.0));
        assert!(!wf.exact);
        assert_eq!(wf.vertices.len(), 8);
        assert_eq!(wf.edges.len(), 12);
        for edge in &wf.edges {
            let d: f64 = (0..3).map(|i| (edge[0][i] - edge[1][i]).powi(2)).sum::<f64>().sqrt();
            assert!((d - PI).abs() < 1e-9);
        }
    }
}
