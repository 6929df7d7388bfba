//! # 对称操作搜索
//!
//! 1. `lattice_rotations`：在约化基中枚举保持度规 G 的整数矩阵
//! 2. `find_operations`：为每个旋转寻找使全部原子一一对应的平移
//!
//! 所有搜索都是对有限候选集的显式循环，失败即提前拒绝。

use super::{SymmetryOp, ToleranceWarning};
use crate::engine::CancelToken;
use crate::error::Result;
use crate::lattice::{reduce_basis, wrap_fractional, CellGeometry};
use crate::models::Crystal;

use nalgebra::{Matrix3, Vector3};
use std::cmp::Ordering;
use std::collections::HashMap;

/// 约化基中自同构矩阵元素的搜索范围
const ROTATION_RANGE: i32 = 2;

/// 候选平移去重阈值（分数坐标）
const TRANSLATION_DEDUP: f64 = 1e-6;

/// 已折回 [0,1) 的原子位置，按物种分组
pub(crate) struct SiteTable {
    pub positions: Vec<Vector3<f64>>,
    pub species: Vec<usize>,
    pub by_species: Vec<Vec<usize>>,
    /// 用于打破平局的物种名称
    names: Vec<String>,
}

impl SiteTable {
    pub fn new(crystal: &Crystal) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut names = Vec::new();
        let mut by_species: Vec<Vec<usize>> = Vec::new();
        let mut species = Vec::with_capacity(crystal.atoms.len());
        let mut positions = Vec::with_capacity(crystal.atoms.len());

        for (i, atom) in crystal.atoms.iter().enumerate() {
            let id = *index.entry(atom.element.as_str()).or_insert_with(|| {
                names.push(atom.element.clone());
                by_species.push(Vec::new());
                names.len() - 1
            });
            species.push(id);
            by_species[id].push(i);
            positions.push(wrap_fractional(&Vector3::from(atom.position)));
        }

        Self {
            positions,
            species,
            by_species,
            names,
        }
    }

    /// 原子数最少的物种（数目相同取名称字典序最小者），用于生成候选平移
    fn reference_species(&self) -> usize {
        (0..self.by_species.len())
            .min_by(|&a, &b| {
                self.by_species[a]
                    .len()
                    .cmp(&self.by_species[b].len())
                    .then_with(|| self.names[a].cmp(&self.names[b]))
            })
            .unwrap_or(0)
    }

    /// 参考原子：参考物种中位置字典序最小的原子，与输入顺序无关
    fn reference_atom(&self, species: usize) -> usize {
        self.by_species[species]
            .iter()
            .copied()
            .min_by(|&a, &b| compare_vectors(&self.positions[a], &self.positions[b]))
            .unwrap_or(0)
    }
}

/// 枚举晶格自同构（输入基中的整数矩阵）
///
/// 在约化基中，列 j 必须映射为与第 j 条基矢等长的格矢，
/// 且两两内积在 δᵢⱼ = ε(|aᵢ|+|aⱼ|) + ε² 内保持不变。
pub(crate) fn lattice_rotations(cell: &CellGeometry, tolerance: f64) -> Vec<Matrix3<f64>> {
    let (reduced, transform) = reduce_basis(cell.basis());
    let metric = reduced.transpose() * reduced;
    let lengths: Vec<f64> = (0..3).map(|i| metric[(i, i)].sqrt()).collect();
    let delta = |i: usize, j: usize| tolerance * (lengths[i] + lengths[j]) + tolerance * tolerance;

    let mut vectors = Vec::new();
    for i in -ROTATION_RANGE..=ROTATION_RANGE {
        for j in -ROTATION_RANGE..=ROTATION_RANGE {
            for k in -ROTATION_RANGE..=ROTATION_RANGE {
                if i != 0 || j != 0 || k != 0 {
                    vectors.push(Vector3::new(i as f64, j as f64, k as f64));
                }
            }
        }
    }

    let column_candidates: Vec<Vec<Vector3<f64>>> = (0..3)
        .map(|j| {
            vectors
                .iter()
                .filter(|v| ((v.transpose() * metric * *v)[0] - metric[(j, j)]).abs() <= delta(j, j))
                .copied()
                .collect()
        })
        .collect();

    let inner = |u: &Vector3<f64>, v: &Vector3<f64>| (u.transpose() * metric * v)[0];

    let Some(transform_inv) = transform.try_inverse() else {
        return vec![Matrix3::identity()];
    };
    let transform_inv = transform_inv.map(|x| x.round());

    let mut rotations = Vec::new();
    for c0 in &column_candidates[0] {
        for c1 in &column_candidates[1] {
            if (inner(c0, c1) - metric[(0, 1)]).abs() > delta(0, 1) {
                continue;
            }
            for c2 in &column_candidates[2] {
                if (inner(c0, c2) - metric[(0, 2)]).abs() > delta(0, 2)
                    || (inner(c1, c2) - metric[(1, 2)]).abs() > delta(1, 2)
                {
                    continue;
                }
                let w = Matrix3::from_columns(&[*c0, *c1, *c2]);
                let det = w.determinant().round();
                if det.abs() != 1.0 {
                    continue;
                }
                rotations.push((transform * w * transform_inv).map(|x| x.round()));
            }
        }
    }

    if rotations.is_empty() {
        rotations.push(Matrix3::identity());
    }
    rotations
}

/// 对每个晶格旋转寻找有效平移，返回规范排序的操作与容差提示
pub(crate) fn find_operations(
    sites: &SiteTable,
    cell: &CellGeometry,
    rotations: &[Matrix3<f64>],
    tolerance: f64,
    cancel: &CancelToken,
) -> Result<(Vec<SymmetryOp>, Vec<ToleranceWarning>)> {
    let ref_species = sites.reference_species();
    let ref_atom = sites.reference_atom(ref_species);
    let ref_pos = sites.positions[ref_atom];

    let mut accepted: Vec<(Matrix3<f64>, Vector3<f64>)> = Vec::new();
    let mut warnings = Vec::new();

    for w in rotations {
        cancel.check()?;
        let rotated_ref = w * ref_pos;
        let mut found_for_rotation: Vec<Vector3<f64>> = Vec::new();

        for &target in &sites.by_species[ref_species] {
            let t = wrap_fractional(&(sites.positions[target] - rotated_ref));
            let Some(outcome) = match_all(sites, cell, w, &t, tolerance) else {
                continue;
            };

            let refined = wrap_fractional(&(t + outcome.mean_residual));
            let duplicate = found_for_rotation.iter().any(|prev| same_translation(&refined, prev));
            if duplicate {
                continue;
            }
            found_for_rotation.push(refined);

            if outcome.ambiguous || outcome.max_deviation > tolerance / 2.0 {
                warnings.push(ToleranceWarning {
                    operation: SymmetryOp::from_parts(w, &refined).to_xyz(),
                    max_deviation: outcome.max_deviation,
                    ambiguous: outcome.ambiguous,
                });
            }
        }

        for t in found_for_rotation {
            accepted.push((*w, t));
        }
    }

    accepted.sort_by(|a, b| canonical_order(a, b));
    let ops = accepted
        .iter()
        .map(|(w, t)| SymmetryOp::from_parts(w, t))
        .collect();
    Ok((ops, warnings))
}

struct MatchOutcome {
    mean_residual: Vector3<f64>,
    max_deviation: f64,
    ambiguous: bool,
}

/// 检查 (W, t) 是否把每个原子映射到同种原子（双射），偏差不超过容差
fn match_all(
    sites: &SiteTable,
    cell: &CellGeometry,
    w: &Matrix3<f64>,
    t: &Vector3<f64>,
    tolerance: f64,
) -> Option<MatchOutcome> {
    let n = sites.positions.len();
    let mut candidates: Vec<Vec<(usize, Vector3<f64>, f64)>> = Vec::with_capacity(n);

    for i in 0..n {
        let image = w * sites.positions[i] + t;
        let mut list = Vec::new();
        for &k in &sites.by_species[sites.species[i]] {
            let d = sites.positions[k] - image;
            let residual = d.map(|x| x - x.round());
            let dist = (cell.basis() * residual).norm();
            if dist <= tolerance {
                list.push((k, residual, dist));
            }
        }
        if list.is_empty() {
            return None;
        }
        list.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        candidates.push(list);
    }

    let ambiguous = candidates.iter().any(|c| c.len() > 1);
    let assignment = if ambiguous {
        let graph: Vec<Vec<usize>> = candidates
            .iter()
            .map(|c| c.iter().map(|(k, _, _)| *k).collect())
            .collect();
        bipartite_match(&graph, n)?
    } else {
        let assignment: Vec<usize> = candidates.iter().map(|c| c[0].0).collect();
        let mut used = vec![false; n];
        for &k in &assignment {
            if used[k] {
                return None;
            }
            used[k] = true;
        }
        assignment
    };

    let mut sum = Vector3::zeros();
    let mut max_deviation: f64 = 0.0;
    for (i, &k) in assignment.iter().enumerate() {
        if let Some((_, residual, dist)) = candidates[i].iter().find(|(idx, _, _)| *idx == k) {
            sum += residual;
            max_deviation = max_deviation.max(*dist);
        }
    }

    Some(MatchOutcome {
        mean_residual: sum / n as f64,
        max_deviation,
        ambiguous,
    })
}

/// 增广路二分匹配；`graph[i]` 为原子 i 的候选（按距离排序）
fn bipartite_match(graph: &[Vec<usize>], n: usize) -> Option<Vec<usize>> {
    let mut owner: Vec<Option<usize>> = vec![None; n];
    for i in 0..graph.len() {
        let mut visited = vec![false; n];
        if !augment(i, graph, &mut owner, &mut visited) {
            return None;
        }
    }

    let mut assignment = vec![0; graph.len()];
    for (k, o) in owner.iter().enumerate() {
        if let Some(i) = o {
            assignment[*i] = k;
        }
    }
    Some(assignment)
}

fn augment(i: usize, graph: &[Vec<usize>], owner: &mut [Option<usize>], visited: &mut [bool]) -> bool {
    for &k in &graph[i] {
        if visited[k] {
            continue;
        }
        visited[k] = true;
        let free = match owner[k] {
            None => true,
            Some(j) => augment(j, graph, owner, visited),
        };
        if free {
            owner[k] = Some(i);
            return true;
        }
    }
    false
}

/// 两个平移模整数格矢是否相同
///
/// 阈值与 ε 无关：大容差下相距不足 ε 的两个平移仍是不同的操作。
fn same_translation(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    (a - b).iter().all(|d| (d - d.round()).abs() < TRANSLATION_DEDUP)
}

fn compare_vectors(a: &Vector3<f64>, b: &Vector3<f64>) -> Ordering {
    for i in 0..3 {
        match a[i].partial_cmp(&b[i]).unwrap_or(Ordering::Equal) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// 规范顺序：恒等旋转在前，其次按矩阵元素、再按平移（1e-6 网格）
fn canonical_order(a: &(Matrix3<f64>, Vector3<f64>), b: &(Matrix3<f64>, Vector3<f64>)) -> Ordering {
    let identity = Matrix3::identity();
    let key = |m: &Matrix3<f64>| -> Vec<i64> { m.transpose().iter().map(|x| x.round() as i64).collect() };
    let grid = |t: &Vector3<f64>| -> Vec<i64> {
        t.iter()
            .map(|x| ((x * 1e6).round() as i64).rem_euclid(1_000_000))
            .collect()
    };

    (a.0 != identity)
        .cmp(&(b.0 != identity))
        .then_with(|| key(&a.0).cmp(&key(&b.0)))
        .then_with(|| grid(&a.1).cmp(&grid(&b.1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Lattice;

    #[test]
    fn test_cubic_lattice_has_48_automorphisms() {
        let cell = CellGeometry::new(&Lattice::cubic(4.0)).unwrap();
        assert_eq!(lattice_rotations(&cell, 1e-3).len(), 48);
    }

    #[test]
    fn test_hexagonal_lattice_has_24_automorphisms() {
        let lattice = Lattice::from_parameters(3.0, 3.0, 5.0, 90.0, 90.0, 120.0);
        let cell = CellGeometry::new(&lattice).unwrap();
        assert_eq!(lattice_rotations(&cell, 1e-3).len(), 24);
    }

    #[test]
    fn test_skewed_setting_keeps_automorphisms() {
        // 简单立方的倾斜基 a, a+b, a+b+c
        let lattice = Lattice::from_vectors([[4.0, 0.0, 0.0], [4.0, 4.0, 0.0], [4.0, 4.0, 4.0]]);
        let cell = CellGeometry::new(&lattice).unwrap();
        let rotations = lattice_rotations(&cell, 1e-3);
        assert_eq!(rotations.len(), 48);
        // 每个矩阵在输入基中都保持度规
        let g = cell.metric();
        for w in rotations {
            assert!((w.transpose() * g * w - g).norm() < 1e-8);
        }
    }

    #[test]
    fn test_triclinic_lattice_has_inversion_only() {
        let lattice = Lattice::from_parameters(3.1, 4.7, 5.3, 71.0, 83.0, 97.0);
        let cell = CellGeometry::new(&lattice).unwrap();
        assert_eq!(lattice_rotations(&cell, 1e-3).len(), 2);
    }

    #[test]
    fn test_translation_dedup_ignores_tolerance() {
        let zero = Vector3::zeros();
        // 4 Å 晶胞中相距 0.04 Å，仍是两个平移
        assert!(!same_translation(&zero, &Vector3::new(0.01, 0.0, 0.0)));
        assert!(same_translation(&zero, &Vector3::new(1.0 - 1e-9, 0.0, 1.0)));
        assert!(same_translation(&Vector3::new(0.5, 0.25, 0.0), &Vector3::new(0.5, 0.25 + 1e-8, 0.0)));
    }

    #[test]
    fn test_bipartite_match_resolves_conflict() {
        // 原子 0 可映射到 0 或 1，原子 1 只能映射到 0
        let graph = vec![vec![0, 1], vec![0]];
        let assignment = bipartite_match(&graph, 2).unwrap();
        assert_eq!(assignment, vec![1, 0]);
    }

    #[test]
    fn test_bipartite_match_fails_without_bijection() {
        let graph = vec![vec![0], vec![0]];
        assert!(bipartite_match(&graph, 2).is_none());
    }
}
