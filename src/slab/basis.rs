//! # 表面晶胞搜索
//!
//! 对约化后的 (h k l)，面内格矢 x 满足 h·x = 0（分数系数）。在 [-r, r]³ 内枚举候选，
//! 取张成面积最小的一对；面积应等于 V / d_hkl，否则说明范围太小，加倍 r 后重试
//! （2, 4, 8, 16）。第三个矢量优先取满足 h·w = 1 的最短者，使新晶胞与原晶胞体积相同。

use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::CellGeometry;

use nalgebra::Vector3;
use serde::Serialize;
use std::f64::consts::PI;

const AREA_REL_TOL: f64 = 1e-6;

/// 面内两矢量与面外矢量（原晶格的整数系数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SurfaceBasis {
    pub u: [i32; 3],
    pub v: [i32; 3],
    pub w: [i32; 3],
    /// 找到面内对时的搜索范围
    pub search_range: i32,
}

impl SurfaceBasis {
    /// 行为 u, v, w 的整数矩阵
    pub fn rows(&self) -> [[i32; 3]; 3] {
        [self.u, self.v, self.w]
    }

    pub fn determinant(&self) -> i64 {
        let [a, b, c] = self.rows().map(|r| r.map(i64::from));
        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }
}

fn gcd(a: i32, b: i32) -> i32 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// 除以公约数；全零时报错
pub fn reduce_miller(hkl: [i32; 3]) -> Result<[i32; 3]> {
    let g = gcd(gcd(hkl[0], hkl[1]), hkl[2]);
    if g == 0 {
        return Err(CrystanError::InvalidArgument(
            "Miller indices must not all be zero".to_string(),
        ));
    }
    Ok(hkl.map(|x| x / g))
}

fn dot(a: [i32; 3], b: [i32; 3]) -> i64 {
    a.iter().zip(b.iter()).map(|(&x, &y)| x as i64 * y as i64).sum()
}

/// 第一个非零分量为正
fn is_sign_canonical(x: [i32; 3]) -> bool {
    x.iter().find(|&&c| c != 0).is_some_and(|&c| c > 0)
}

fn cartesian(cell: &CellGeometry, x: [i32; 3]) -> Vector3<f64> {
    cell.to_cartesian(&Vector3::new(x[0] as f64, x[1] as f64, x[2] as f64))
}

/// 搜索范围序列：2, 4, 8, ... 直到 `max_range`
fn ranges(max_range: i32) -> Vec<i32> {
    let mut out = Vec::new();
    let mut r = 2;
    while r < max_range {
        out.push(r);
        r *= 2;
    }
    out.push(max_range);
    out
}

fn box_vectors(r: i32) -> impl Iterator<Item = [i32; 3]> {
    (-r..=r).flat_map(move |i| (-r..=r).flat_map(move |j| (-r..=r).map(move |k| [i, j, k])))
}

struct Candidate {
    x: [i32; 3],
    cart: Vector3<f64>,
    length: f64,
}

/// 在范围 `r` 内找面积最小的面内对
fn best_in_plane_pair(cell: &CellGeometry, hkl: [i32; 3], r: i32) -> Option<(Candidate, Candidate, f64)> {
    let mut candidates: Vec<Candidate> = box_vectors(r)
        .filter(|&x| x != [0, 0, 0] && dot(hkl, x) == 0 && is_sign_canonical(x))
        .map(|x| {
            let cart = cartesian(cell, x);
            Candidate {
                x,
                length: cart.norm(),
                cart,
            }
        })
        .collect();
    candidates.sort_by(|a, b| a.length.total_cmp(&b.length).then(a.x.cmp(&b.x)));

    // (面积, 总长, u, v)
    let mut best: Option<(f64, f64, usize, usize)> = None;
    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            let area = candidates[i].cart.cross(&candidates[j].cart).norm();
            if area < 1e-8 {
                continue;
            }
            let total = candidates[i].length + candidates[j].length;
            let better = match best {
                None => true,
                Some((best_area, best_total, bi, bj)) => {
                    if area < best_area * (1.0 - AREA_REL_TOL) {
                        true
                    } else if area <= best_area * (1.0 + AREA_REL_TOL) {
                        total < best_total - 1e-12
                            || ((total - best_total).abs() <= 1e-12
                                && (candidates[i].x, candidates[j].x)
                                    < (candidates[bi].x, candidates[bj].x))
                    } else {
                        false
                    }
                }
            };
            if better {
                best = Some((area, total, i, j));
            }
        }
    }

    let (area, _, i, j) = best?;
    let mut candidates: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    Some((candidates[i].take()?, candidates[j].take()?, area))
}

/// 面外矢量：h·w = 1 的最短格矢，找不到时退回最短的非共面格矢
fn out_of_plane(cell: &CellGeometry, hkl: [i32; 3], u: [i32; 3], v: [i32; 3], r: i32) -> Option<[i32; 3]> {
    let shortest = |pred: &dyn Fn([i32; 3]) -> bool| {
        box_vectors(r)
            .filter(|&x| x != [0, 0, 0] && pred(x))
            .map(|x| (cartesian(cell, x).norm(), x))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
            .map(|(_, x)| x)
    };

    shortest(&|x| dot(hkl, x) == 1).or_else(|| {
        log::warn!(
            "no lattice vector with one interplanar step for ({} {} {}), using the shortest non-coplanar vector",
            hkl[0],
            hkl[1],
            hkl[2]
        );
        shortest(&|x| {
            let det = SurfaceBasis {
                u,
                v,
                w: x,
                search_range: r,
            }
            .determinant();
            det != 0
        })
    })
}

/// 为约化的 `hkl` 寻找表面晶胞，保证行列式为正
pub fn find_surface_basis(
    cell: &CellGeometry,
    hkl: [i32; 3],
    max_range: i32,
    cancel: &CancelToken,
) -> Result<SurfaceBasis> {
    let g = cell.reciprocal() * Vector3::new(hkl[0] as f64, hkl[1] as f64, hkl[2] as f64);
    let d_spacing = 2.0 * PI / g.norm();
    let primitive_area = cell.volume() / d_spacing;

    for r in ranges(max_range) {
        cancel.check()?;
        let Some((u, v, area)) = best_in_plane_pair(cell, hkl, r) else {
            log::debug!("slab basis: no in-plane pair within ±{}", r);
            continue;
        };
        if (area - primitive_area).abs() > AREA_REL_TOL * primitive_area {
            log::debug!(
                "slab basis: best area {:.6} at ±{} is not primitive ({:.6})",
                area,
                r,
                primitive_area
            );
            continue;
        }

        let Some(w) = out_of_plane(cell, hkl, u.x, v.x, r) else {
            continue;
        };
        let mut basis = SurfaceBasis {
            u: u.x,
            v: v.x,
            w,
            search_range: r,
        };
        if basis.determinant() < 0 {
            std::mem::swap(&mut basis.u, &mut basis.v);
        }
        log::debug!("slab basis for {:?}: {:?}", hkl, basis);
        return Ok(basis);
    }

    Err(CrystanError::NoValidBasis {
        h: hkl[0],
        k: hkl[1],
        l: hkl[2],
        bound: max_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    fn cubic(a: f64) -> CellGeometry {
        CellGeometry::new(&Lattice::cubic(a)).unwrap()
    }

    #[test]
    fn test_reduce_miller() {
        assert_eq!(reduce_miller([2, 2, 0]).unwrap(), [1, 1, 0]);
        assert_eq!(reduce_miller([0, 0, -3]).unwrap(), [0, 0, -1]);
        assert!(reduce_miller([0, 0, 0]).is_err());
    }

    #[test]
    fn test_cubic_001() {
        let basis = find_surface_basis(&cubic(4.0), [0, 0, 1], 16, &CancelToken::new()).unwrap();
        assert_eq!(basis.u, [1, 0, 0]);
        assert_eq!(basis.v, [0, 1, 0]);
        assert_eq!(basis.w, [0, 0, 1]);
        assert_eq!(basis.determinant(), 1);
    }

    #[test]
    fn test_cubic_111_primitive() {
        let cell = cubic(3.0);
        let basis = find_surface_basis(&cell, [1, 1, 1], 16, &CancelToken::new()).unwrap();
        assert_eq!(dot([1, 1, 1], basis.u), 0);
        assert_eq!(dot([1, 1, 1], basis.v), 0);
        assert_eq!(dot([1, 1, 1], basis.w), 1);
        assert_eq!(basis.determinant(), 1);

        let area = cartesian(&cell, basis.u)
            .cross(&cartesian(&cell, basis.v))
            .norm();
        assert!((area - 9.0 * 3.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_range_exhausted() {
        let err = find_surface_basis(&cubic(4.0), [17, 0, 1], 2, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, CrystanError::NoValidBasis { bound: 2, .. }));
    }

    #[test]
    fn test_range_sequence() {
        assert_eq!(ranges(16), vec![2, 4, 8, 16]);
        assert_eq!(ranges(2), vec![2]);
        assert_eq!(ranges(5), vec![2, 4, 5]);
    }
}
