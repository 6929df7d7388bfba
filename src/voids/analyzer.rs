//! # 网格空隙分析
//!
//! ## 算法
//! 1. 在分数坐标 [0,1)³ 上取 nᵢ = max(1, ⌈|aᵢ| / spacing⌉) 个点
//! 2. 每点的表面间隙 D_surf = min_j (|r - r_j|_mic - R_j)
//! 3. D_surf > 探针半径的点为空隙点
//! 4. 空隙点按 6 / 26 邻接（周期边界）聚类
//! 5. 每个簇以 D_surf 最大的点为中心（并列取扁平下标最小者）
//!
//! z 切片之间并行（rayon），每个切片开始前检查取消信号。

use super::cluster::{label_components, Connectivity};
use super::probes::{ions_fitting, Probe, RadiusSet};
use crate::engine::CancelToken;
use crate::error::{CrystanError, Result};
use crate::lattice::{wrap_fractional, CellGeometry};
use crate::models::{elements, Crystal};

use nalgebra::Vector3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ─────────────────────────────────────────────────────────────
// 参数
// ─────────────────────────────────────────────────────────────

/// 空隙分析参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidSettings {
    /// 探针半径（Å），0 为纯几何空隙
    pub probe_radius: f64,
    /// 网格间距（Å）
    pub grid_spacing: f64,
    pub radius_set: RadiusSet,
    /// 表中半径的缩放系数（不作用于显式覆盖值）
    pub radii_scale: f64,
    /// 按物种标签覆盖半径
    pub radius_overrides: BTreeMap<String, f64>,
    pub connectivity: Connectivity,
    /// 网格点数上限，超过即放弃
    pub max_grid_points: usize,
}

impl Default for VoidSettings {
    fn default() -> Self {
        Self {
            probe_radius: 1.20,
            grid_spacing: 0.2,
            radius_set: RadiusSet::VanDerWaals,
            radii_scale: 1.0,
            radius_overrides: BTreeMap::new(),
            connectivity: Connectivity::Six,
            max_grid_points: 10_000_000,
        }
    }
}

impl VoidSettings {
    pub fn with_probe(mut self, radius: f64) -> Self {
        self.probe_radius = radius;
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.grid_spacing = spacing;
        self
    }

    pub fn with_radius(mut self, species: impl Into<String>, radius: f64) -> Self {
        self.radius_overrides.insert(species.into(), radius);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe_radius.is_nan() || self.probe_radius < 0.0 {
            return Err(CrystanError::InvalidArgument(format!(
                "probe radius must not be negative, got {}",
                self.probe_radius
            )));
        }
        if self.grid_spacing.is_nan() || self.grid_spacing <= 0.0 {
            return Err(CrystanError::InvalidArgument(format!(
                "grid spacing must be positive, got {}",
                self.grid_spacing
            )));
        }
        if self.radii_scale.is_nan() || self.radii_scale <= 0.0 {
            return Err(CrystanError::InvalidArgument(format!(
                "radii scale must be positive, got {}",
                self.radii_scale
            )));
        }
        if let Some((species, r)) = self.radius_overrides.iter().find(|(_, r)| r.is_nan() || **r < 0.0) {
            return Err(CrystanError::InvalidArgument(format!(
                "radius for '{}' must not be negative, got {}",
                species, r
            )));
        }
        Ok(())
    }

    /// 物种半径；未知物种返回默认半径并记入 `unknown`
    fn radius_of(&self, species: &str, unknown: &mut BTreeSet<String>) -> f64 {
        if let Some(&r) = self.radius_overrides.get(species) {
            return r;
        }
        if let Some(symbol) = elements::normalize_symbol(species) {
            if let Some(&r) = self.radius_overrides.get(&symbol) {
                return r;
            }
        }
        match elements::lookup(species) {
            Some(data) => {
                let r = match self.radius_set {
                    RadiusSet::VanDerWaals => data.vdw_radius,
                    RadiusSet::Ionic => data.ionic_radius,
                    RadiusSet::Covalent => data.covalent_radius,
                };
                r * self.radii_scale
            }
            None => {
                if unknown.insert(species.to_string()) {
                    log::warn!(
                        "no tabulated radius for '{}', using {:.2} Å",
                        species,
                        elements::DEFAULT_RADIUS
                    );
                }
                elements::DEFAULT_RADIUS * self.radii_scale
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 结果
// ─────────────────────────────────────────────────────────────

const NO_CLUSTER: u32 = u32::MAX;

/// 一个连通空隙
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoidCluster {
    /// 中心网格下标 (u, v, w)
    pub center_index: [usize; 3],
    pub center_fractional: [f64; 3],
    pub center_cartesian: [f64; 3],
    /// 中心处的 D_surf（Å）
    pub radius: f64,
    pub point_count: usize,
    /// 体积（Å³）= 点数 × 单点体积
    pub volume: f64,
}

/// 全网格上的最大内切球
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LargestSphere {
    pub radius: f64,
    pub center_fractional: [f64; 3],
    pub center_cartesian: [f64; 3],
}

/// 空隙场
#[derive(Debug, Clone, Serialize)]
pub struct VoidField {
    /// (nx, ny, nz)
    pub dims: [usize; 3],
    /// 各点 D_surf，扁平下标 u + nx·(v + ny·w)
    #[serde(skip)]
    pub clearance: Vec<f64>,
    /// 各点所属簇在 `clusters` 中的位置
    #[serde(skip)]
    labels: Vec<u32>,
    pub probe_radius: f64,
    pub void_points: usize,
    /// 空隙率（%）
    pub void_fraction: f64,
    /// 簇按半径降序，并列按中心下标
    pub clusters: Vec<VoidCluster>,
    pub largest_sphere: LargestSphere,
    /// 能放入最大空隙的候选离子
    pub fitting_ions: Vec<Probe>,
    pub cell_volume: f64,
    /// 无半径数据、使用默认半径的物种
    pub unknown_species: Vec<String>,
}

impl VoidField {
    pub fn total_points(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn flat_index(&self, u: usize, v: usize, w: usize) -> usize {
        u + self.dims[0] * (v + self.dims[1] * w)
    }

    pub fn clearance_at(&self, u: usize, v: usize, w: usize) -> f64 {
        self.clearance[self.flat_index(u, v, w)]
    }

    /// 网格点所属簇（在 `clusters` 中的位置），非空隙点为 `None`
    pub fn cluster_of(&self, flat_index: usize) -> Option<usize> {
        match self.labels.get(flat_index) {
            Some(&label) if label != NO_CLUSTER => Some(label as usize),
            _ => None,
        }
    }

    /// 所有空隙簇的总体积（Å³）
    pub fn void_volume(&self) -> f64 {
        self.clusters.iter().map(|c| c.volume).sum()
    }
}

// ─────────────────────────────────────────────────────────────
// 分析器
// ─────────────────────────────────────────────────────────────

struct Sphere {
    frac: Vector3<f64>,
    radius: f64,
}

#[derive(Debug, Clone, Default)]
pub struct VoidAnalyzer {
    settings: VoidSettings,
    cancel: CancelToken,
}

impl VoidAnalyzer {
    pub fn new(settings: VoidSettings) -> Self {
        Self {
            settings,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &VoidSettings {
        &self.settings
    }

    /// 网格尺寸
    pub fn grid_dims(&self, cell: &CellGeometry) -> [usize; 3] {
        let lengths = cell.lengths();
        let mut dims = [1; 3];
        for (n, len) in dims.iter_mut().zip(lengths) {
            *n = ((len / self.settings.grid_spacing).ceil() as usize).max(1);
        }
        dims
    }

    pub fn analyze(&self, crystal: &Crystal) -> Result<VoidField> {
        let s = &self.settings;
        s.validate()?;
        crystal.validate()?;
        let cell = CellGeometry::new(&crystal.lattice)?;

        let dims = self.grid_dims(&cell);
        let total = dims
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .filter(|&t| t <= s.max_grid_points && t <= u32::MAX as usize)
            .ok_or_else(|| CrystanError::ComputeTimeout {
                reason: format!(
                    "void grid {}×{}×{} exceeds the limit of {} points",
                    dims[0], dims[1], dims[2], s.max_grid_points
                ),
            })?;

        let mut unknown = BTreeSet::new();
        let spheres: Vec<Sphere> = crystal
            .atoms
            .iter()
            .map(|atom| Sphere {
                frac: wrap_fractional(&Vector3::from(atom.position)),
                radius: s.radius_of(&atom.element, &mut unknown),
            })
            .collect();

        log::debug!(
            "voids: grid {:?} ({} points), {} atoms, probe {:.2} Å",
            dims,
            total,
            spheres.len(),
            s.probe_radius
        );

        let [nx, ny, nz] = dims;
        let slices: Vec<Vec<f64>> = (0..nz)
            .into_par_iter()
            .map(|w| {
                self.cancel.check()?;
                let mut slice = Vec::with_capacity(nx * ny);
                for v in 0..ny {
                    for u in 0..nx {
                        let p = grid_fractional([u, v, w], dims);
                        slice.push(surface_distance(&cell, &spheres, &p));
                    }
                }
                Ok(slice)
            })
            .collect::<Result<_>>()?;
        let clearance: Vec<f64> = slices.into_iter().flatten().collect();

        let mask: Vec<bool> = clearance.iter().map(|&d| d > s.probe_radius).collect();
        let void_points = mask.iter().filter(|&&m| m).count();
        let (components, n_components) = label_components(&mask, dims, s.connectivity);

        let point_volume = cell.volume() / total as f64;
        let clusters = build_clusters(
            &clearance,
            &components,
            n_components,
            dims,
            &cell,
            point_volume,
        );

        // 按半径降序、中心下标升序排列，并把每点标签改写成排序后的位置
        let mut order: Vec<usize> = (0..clusters.len()).collect();
        order.sort_by(|&a, &b| {
            let (ca, cb) = (&clusters[a], &clusters[b]);
            cb.0.radius
                .total_cmp(&ca.0.radius)
                .then(ca.1.cmp(&cb.1))
        });
        let mut rank = vec![0u32; clusters.len()];
        for (pos, &old) in order.iter().enumerate() {
            rank[old] = pos as u32;
        }
        let labels: Vec<u32> = components
            .iter()
            .map(|c| c.map_or(NO_CLUSTER, |id| rank[id as usize]))
            .collect();
        let mut slots: Vec<Option<VoidCluster>> = clusters.into_iter().map(|(c, _)| Some(c)).collect();
        let clusters: Vec<VoidCluster> = order.iter().filter_map(|&i| slots[i].take()).collect();

        let largest_sphere = largest_sphere(&clearance, dims, &cell);
        let fitting_ions = ions_fitting(largest_sphere.radius);
        let void_fraction = 100.0 * void_points as f64 / total as f64;

        log::info!(
            "voids: {:.2}% void, {} clusters, largest sphere {:.3} Å in {}",
            void_fraction,
            clusters.len(),
            largest_sphere.radius,
            crystal.name
        );

        Ok(VoidField {
            dims,
            clearance,
            labels,
            probe_radius: s.probe_radius,
            void_points,
            void_fraction,
            clusters,
            largest_sphere,
            fitting_ions,
            cell_volume: cell.volume(),
            unknown_species: unknown.into_iter().collect(),
        })
    }
}

fn grid_fractional(idx: [usize; 3], dims: [usize; 3]) -> Vector3<f64> {
    Vector3::new(
        idx[0] as f64 / dims[0] as f64,
        idx[1] as f64 / dims[1] as f64,
        idx[2] as f64 / dims[2] as f64,
    )
}

fn unflatten(flat: usize, dims: [usize; 3]) -> [usize; 3] {
    let u = flat % dims[0];
    let v = (flat / dims[0]) % dims[1];
    let w = flat / (dims[0] * dims[1]);
    [u, v, w]
}

/// 无原子时为 +∞
fn surface_distance(cell: &CellGeometry, spheres: &[Sphere], p: &Vector3<f64>) -> f64 {
    spheres
        .iter()
        .map(|s| cell.minimum_image_of(&(s.frac - p)).norm() - s.radius)
        .fold(f64::INFINITY, f64::min)
}

/// 每个分量的中心（D_surf 最大，并列取最小下标）、点数与体积；附带中心扁平下标
fn build_clusters(
    clearance: &[f64],
    components: &[Option<u32>],
    n_components: usize,
    dims: [usize; 3],
    cell: &CellGeometry,
    point_volume: f64,
) -> Vec<(VoidCluster, usize)> {
    let mut best: Vec<Option<usize>> = vec![None; n_components];
    let mut counts = vec![0usize; n_components];

    for (idx, comp) in components.iter().enumerate() {
        let Some(id) = comp else { continue };
        let id = *id as usize;
        counts[id] += 1;
        match best[id] {
            Some(b) if clearance[b] >= clearance[idx] => {}
            _ => best[id] = Some(idx),
        }
    }

    best.into_iter()
        .zip(counts)
        .filter_map(|(center, count)| {
            let center = center?;
            let index = unflatten(center, dims);
            let frac = grid_fractional(index, dims);
            let cart = cell.to_cartesian(&frac);
            Some((
                VoidCluster {
                    center_index: index,
                    center_fractional: frac.into(),
                    center_cartesian: cart.into(),
                    radius: clearance[center],
                    point_count: count,
                    volume: count as f64 * point_volume,
                },
                center,
            ))
        })
        .collect()
}

fn largest_sphere(clearance: &[f64], dims: [usize; 3], cell: &CellGeometry) -> LargestSphere {
    let mut best = 0;
    for (idx, &d) in clearance.iter().enumerate() {
        if d > clearance[best] {
            best = idx;
        }
    }
    let frac = grid_fractional(unflatten(best, dims), dims);
    LargestSphere {
        radius: clearance.get(best).copied().unwrap_or(f64::NEG_INFINITY),
        center_fractional: frac.into(),
        center_cartesian: cell.to_cartesian(&frac).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn lone_atom(a: f64) -> Crystal {
        Crystal::new("X", Lattice::cubic(a), vec![Atom::new("X", [0.0; 3])])
    }

    fn settings() -> VoidSettings {
        VoidSettings::default().with_spacing(0.5).with_radius("X", 1.0)
    }

    #[test]
    fn test_empty_cell_is_all_void() {
        let crystal = Crystal::new("empty", Lattice::cubic(3.0), vec![]);
        let field = VoidAnalyzer::new(settings()).analyze(&crystal).unwrap();

        assert_eq!(field.void_points, field.total_points());
        assert!((field.void_fraction - 100.0).abs() < 1e-12);
        assert_eq!(field.clusters.len(), 1);
        assert!(field.clusters[0].radius.is_infinite());
        assert!((field.void_volume() - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_lone_atom_cluster_center() {
        let field = VoidAnalyzer::new(settings()).analyze(&lone_atom(10.0)).unwrap();
        assert_eq!(field.dims, [20, 20, 20]);
        assert_eq!(field.clusters.len(), 1);

        let cluster = &field.clusters[0];
        assert_eq!(cluster.center_index, [10, 10, 10]);
        let expected = 5.0 * 3.0_f64.sqrt() - 1.0;
        assert!((cluster.radius - expected).abs() < 1e-9);
        assert!((field.largest_sphere.radius - expected).abs() < 1e-9);
        assert_eq!(field.fitting_ions.len(), super::super::probes::CANDIDATE_IONS.len());
    }

    #[test]
    fn test_cluster_center_is_maximum() {
        let crystal = Crystal::new(
            "pair",
            Lattice::from_parameters(6.0, 7.0, 8.0, 90.0, 100.0, 90.0),
            vec![
                Atom::new("Si", [0.0, 0.0, 0.0]),
                Atom::new("O", [0.3, 0.5, 0.25]),
            ],
        );
        let s = VoidSettings::default().with_spacing(0.4).with_probe(0.5);
        let field = VoidAnalyzer::new(s).analyze(&crystal).unwrap();

        for (idx, &d) in field.clearance.iter().enumerate() {
            match field.cluster_of(idx) {
                Some(c) => {
                    assert!(d > 0.5);
                    assert!(d <= field.clusters[c].radius);
                }
                None => assert!(d <= 0.5),
            }
        }
        for pair in field.clusters.windows(2) {
            assert!(pair[0].radius >= pair[1].radius);
        }
        let counted: usize = field.clusters.iter().map(|c| c.point_count).sum();
        assert_eq!(counted, field.void_points);
    }

    #[test]
    fn test_atom_order_does_not_matter() {
        let atoms = vec![
            Atom::new("Na", [0.0, 0.0, 0.0]),
            Atom::new("Cl", [0.5, 0.5, 0.5]),
            Atom::new("Na", [0.5, 0.0, 0.25]),
        ];
        let mut reversed = atoms.clone();
        reversed.reverse();
        let lattice = Lattice::cubic(7.0);

        let s = VoidSettings::default().with_spacing(0.35).with_probe(0.3);
        let a = VoidAnalyzer::new(s.clone())
            .analyze(&Crystal::new("a", lattice.clone(), atoms))
            .unwrap();
        let b = VoidAnalyzer::new(s)
            .analyze(&Crystal::new("b", lattice, reversed))
            .unwrap();
        assert_eq!(a.clusters, b.clusters);
        assert_eq!(a.void_points, b.void_points);
    }

    #[test]
    fn test_probe_larger_than_any_gap() {
        let s = settings().with_probe(50.0);
        let field = VoidAnalyzer::new(s).analyze(&lone_atom(10.0)).unwrap();
        assert_eq!(field.void_points, 0);
        assert!(field.clusters.is_empty());
        assert_eq!(field.void_fraction, 0.0);
    }

    #[test]
    fn test_grid_limit() {
        let s = VoidSettings {
            grid_spacing: 0.01,
            max_grid_points: 1000,
            ..settings()
        };
        let result = VoidAnalyzer::new(s).analyze(&lone_atom(10.0));
        assert!(matches!(result, Err(CrystanError::ComputeTimeout { .. })));
    }

    #[test]
    fn test_invalid_settings() {
        let crystal = lone_atom(5.0);
        for s in [
            settings().with_probe(-0.1),
            settings().with_spacing(0.0),
            settings().with_radius("X", -1.0),
        ] {
            assert!(matches!(
                VoidAnalyzer::new(s).analyze(&crystal),
                Err(CrystanError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn test_unknown_species_uses_default_radius() {
        let crystal = lone_atom(8.0);
        let field = VoidAnalyzer::new(VoidSettings::default().with_spacing(0.5))
            .analyze(&crystal)
            .unwrap();
        assert_eq!(field.unknown_species, vec!["X".to_string()]);
        let expected = 4.0 * 3.0_f64.sqrt() - elements::DEFAULT_RADIUS;
        assert!((field.largest_sphere.radius - expected).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let crystal = Crystal::new(
            "QO",
            Lattice::from_parameters(6.0, 6.5, 7.0, 90.0, 95.0, 90.0),
            vec![
                Atom::new("Q", [0.0, 0.0, 0.0]),
                Atom::new("O", [0.5, 0.5, 0.5]),
                Atom::new("O", [0.25, 0.1, 0.7]),
            ],
        );
        let settings = VoidSettings::default().with_probe(1.2).with_spacing(0.2);
        let first = VoidAnalyzer::new(settings.clone()).analyze(&crystal).unwrap();
        let second = VoidAnalyzer::new(settings).analyze(&crystal).unwrap();

        assert_eq!(first.unknown_species, vec!["Q".to_string()]);
        assert_eq!(first.dims, second.dims);
        assert_eq!(first.clearance, second.clearance);
        assert_eq!(first.void_points, second.void_points);
        assert_eq!(first.void_fraction.to_bits(), second.void_fraction.to_bits());
        assert_eq!(first.clusters, second.clusters);
        assert_eq!(first.largest_sphere, second.largest_sphere);
        assert_eq!(first.fitting_ions, second.fitting_ions);

        // 原点格点就在 Q 上，未知物种按默认半径 1.5 Å 计
        assert!((first.clearance[0] + elements::DEFAULT_RADIUS).abs() < 1e-9);
    }
}
