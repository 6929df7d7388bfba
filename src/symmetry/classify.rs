//! # 点群、惯用晶胞与空间群判定
//!
//! 输入为已找到的对称操作（输入晶胞分数坐标），流程：
//! 1. 纯平移 → 约化原胞 P
//! 2. 原胞坐标中的点操作 → 旋转类型统计 → 点群
//! 3. 由对称轴构造惯用晶胞，由 det(C) 判定带心
//! 4. 原点搜索判定是否点式；否则按各方向上的螺旋轴与滑移面记号为候选打分

use super::spacegroups::{self, SpaceGroupEntry, SymbolToken};
use super::{Centering, CrystalSystem, RotationKind, SymmetryOp};
use crate::lattice::{reduce_basis, CellGeometry};

use nalgebra::{Matrix3, Vector3};

/// 轴向搜索的整数盒范围（原胞坐标）
const BOX_RANGE: i32 = 3;

struct PointGroupDef {
    symbol: &'static str,
    system: CrystalSystem,
    /// 按 RotationKind 顺序的操作计数
    census: [u8; 10],
}

const fn pg(symbol: &'static str, system: CrystalSystem, census: [u8; 10]) -> PointGroupDef {
    PointGroupDef {
        symbol,
        system,
        census,
    }
}

use super::CrystalSystem::{Cubic, Hexagonal, Monoclinic, Orthorhombic, Tetragonal, Triclinic, Trigonal};

//                                  1  2  3  4  6 -1  m -3 -4 -6
static POINT_GROUPS: [PointGroupDef; 32] = [
    pg("1", Triclinic, [1, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
    pg("-1", Triclinic, [1, 0, 0, 0, 0, 1, 0, 0, 0, 0]),
    pg("2", Monoclinic, [1, 1, 0, 0, 0, 0, 0, 0, 0, 0]),
    pg("m", Monoclinic, [1, 0, 0, 0, 0, 0, 1, 0, 0, 0]),
    pg("2/m", Monoclinic, [1, 1, 0, 0, 0, 1, 1, 0, 0, 0]),
    pg("222", Orthorhombic, [1, 3, 0, 0, 0, 0, 0, 0, 0, 0]),
    pg("mm2", Orthorhombic, [1, 1, 0, 0, 0, 0, 2, 0, 0, 0]),
    pg("mmm", Orthorhombic, [1, 3, 0, 0, 0, 1, 3, 0, 0, 0]),
    pg("4", Tetragonal, [1, 1, 0, 2, 0, 0, 0, 0, 0, 0]),
    pg("-4", Tetragonal, [1, 1, 0, 0, 0, 0, 0, 0, 2, 0]),
    pg("4/m", Tetragonal, [1, 1, 0, 2, 0, 1, 1, 0, 2, 0]),
    pg("422", Tetragonal, [1, 5, 0, 2, 0, 0, 0, 0, 0, 0]),
    pg("4mm", Tetragonal, [1, 1, 0, 2, 0, 0, 4, 0, 0, 0]),
    pg("-42m", Tetragonal, [1, 3, 0, 0, 0, 0, 2, 0, 2, 0]),
    pg("4/mmm", Tetragonal, [1, 5, 0, 2, 0, 1, 5, 0, 2, 0]),
    pg("3", Trigonal, [1, 0, 2, 0, 0, 0, 0, 0, 0, 0]),
    pg("-3", Trigonal, [1, 0, 2, 0, 0, 1, 0, 2, 0, 0]),
    pg("32", Trigonal, [1, 3, 2, 0, 0, 0, 0, 0, 0, 0]),
    pg("3m", Trigonal, [1, 0, 2, 0, 0, 0, 3, 0, 0, 0]),
    pg("-3m", Trigonal, [1, 3, 2, 0, 0, 1, 3, 2, 0, 0]),
    pg("6", Hexagonal, [1, 1, 2, 0, 2, 0, 0, 0, 0, 0]),
    pg("-6", Hexagonal, [1, 0, 2, 0, 0, 0, 1, 0, 0, 2]),
    pg("6/m", Hexagonal, [1, 1, 2, 0, 2, 1, 1, 2, 0, 2]),
    pg("622", Hexagonal, [1, 7, 2, 0, 2, 0, 0, 0, 0, 0]),
    pg("6mm", Hexagonal, [1, 1, 2, 0, 2, 0, 6, 0, 0, 0]),
    pg("-6m2", Hexagonal, [1, 3, 2, 0, 0, 0, 4, 0, 0, 2]),
    pg("6/mmm", Hexagonal, [1, 7, 2, 0, 2, 1, 7, 2, 0, 2]),
    pg("23", Cubic, [1, 3, 8, 0, 0, 0, 0, 0, 0, 0]),
    pg("m-3", Cubic, [1, 3, 8, 0, 0, 1, 3, 8, 0, 0]),
    pg("432", Cubic, [1, 9, 8, 6, 0, 0, 0, 0, 0, 0]),
    pg("-43m", Cubic, [1, 3, 8, 0, 0, 0, 6, 0, 6, 0]),
    pg("m-3m", Cubic, [1, 9, 8, 6, 0, 1, 9, 8, 6, 0]),
];

/// 判定结果
pub(crate) struct Classification {
    pub entry: &'static SpaceGroupEntry,
    pub system: CrystalSystem,
    pub point_group: &'static str,
    pub centering: Centering,
    pub symmorphic: bool,
    pub alternatives: Vec<u16>,
    /// 约化原胞（笛卡尔列向量）
    pub primitive: Matrix3<f64>,
    /// 惯用晶胞（笛卡尔列向量）
    pub conventional: Matrix3<f64>,
}

/// 原胞坐标中的点操作，每个旋转保留一个平移代表
struct PointOp {
    w: Matrix3<f64>,
    t: Vector3<f64>,
    kind: RotationKind,
    /// det(W)·W
    proper: Matrix3<f64>,
    /// 转轴（对反映面为法向）上最短的格矢
    axis: Option<Vector3<f64>>,
}

/// 原胞坐标系下的工作上下文
struct Frame {
    basis: Matrix3<f64>,
    metric: Matrix3<f64>,
    ops: Vec<PointOp>,
    /// 首个非零分量为正的整数向量，按长度排序
    points: Vec<Vector3<f64>>,
    tolerance: f64,
}

/// 惯用晶胞设置：`c` 的列为惯用基矢在原胞坐标中的整数表示
struct Setting {
    c: Matrix3<f64>,
    centering: Centering,
    two_along_a: bool,
    mirror_along_a: bool,
}

impl Setting {
    fn primitive() -> Self {
        Self {
            c: Matrix3::identity(),
            centering: Centering::P,
            two_along_a: false,
            mirror_along_a: false,
        }
    }
}

pub(crate) fn classify(cell: &CellGeometry, ops: &[SymmetryOp], tolerance: f64) -> Classification {
    let basis = *cell.basis();
    let identity = SymmetryOp::identity().rotation;
    let pure: Vec<Vector3<f64>> = ops
        .iter()
        .filter(|op| op.rotation == identity)
        .map(|op| op.translation_vector())
        .collect();

    let p = primitive_transform(&basis, &pure);
    let p_inv = p
        .try_inverse()
        .map(|m| m.map(|x| x.round()))
        .unwrap_or_else(Matrix3::identity);
    let prim = basis * p;
    let frame = Frame::new(prim, &p, &p_inv, ops, tolerance);

    let mut census = [0u8; 10];
    for op in &frame.ops {
        census[op.kind as usize] = census[op.kind as usize].saturating_add(1);
    }
    let pg = match POINT_GROUPS.iter().find(|g| g.census == census) {
        Some(g) => g,
        None => {
            let fallback = POINT_GROUPS
                .iter()
                .filter(|g| g.census.iter().zip(&census).all(|(a, b)| a <= b))
                .max_by_key(|g| g.census.iter().map(|&x| x as u32).sum::<u32>())
                .unwrap_or(&POINT_GROUPS[0]);
            log::warn!(
                "operations do not close into a point group (census {:?}); using {}",
                census,
                fallback.symbol
            );
            fallback
        }
    };

    let setting = conventional_setting(&frame, pg).unwrap_or_else(|| {
        log::warn!(
            "could not build a conventional cell for point group {}; using the reduced primitive cell",
            pg.symbol
        );
        Setting::primitive()
    });

    let symmorphic = frame.has_common_origin();
    let oriented = oriented_symbol(pg.symbol, &setting);

    let mut candidates = spacegroups::candidates(setting.centering, &oriented);
    if candidates.is_empty() {
        log::warn!(
            "no space group with centering {} and point group {}; matching by point group only",
            setting.centering.letter(),
            oriented
        );
        candidates = spacegroups::SPACE_GROUPS
            .iter()
            .filter(|e| e.point_group() == pg.symbol)
            .collect();
    }

    let (entry, alternatives) = choose_entry(&frame, &setting, pg, &candidates, symmorphic);

    Classification {
        entry,
        system: pg.system,
        point_group: pg.symbol,
        centering: setting.centering,
        symmorphic,
        alternatives,
        primitive: prim,
        conventional: prim * setting.c,
    }
}

// ─────────────────────────────────────────────────────────────
// 原胞
// ─────────────────────────────────────────────────────────────

/// 由纯平移构造约化原胞，返回输入分数坐标下的列变换 P
fn primitive_transform(basis: &Matrix3<f64>, pure: &[Vector3<f64>]) -> Matrix3<f64> {
    let n = pure.len().max(1);
    let mut p = Matrix3::identity();

    if n > 1 {
        match centred_primitive(basis, pure, n) {
            Some(found) => p = found,
            None => log::warn!(
                "{} pure translations do not form a lattice; keeping the input cell",
                n
            ),
        }
    }

    let (_, reduce) = reduce_basis(&(basis * p));
    p * reduce
}

fn centred_primitive(basis: &Matrix3<f64>, pure: &[Vector3<f64>], n: usize) -> Option<Matrix3<f64>> {
    let nf = n as f64;
    let (_, t_red) = reduce_basis(basis);
    let t_red_inv = t_red.try_inverse()?.map(|x| x.round());
    let reduced_basis = basis * t_red;

    let mut vectors: Vec<(i64, [i64; 3], Vector3<f64>)> = Vec::new();
    for t in pure {
        let snapped = t.map(|x| (x * nf).round() / nf);
        let local = (t_red_inv * snapped).map(|x| x - x.floor());
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1 {
                    let v = local + Vector3::new(i as f64, j as f64, k as f64);
                    if v.norm() < 1e-9 {
                        continue;
                    }
                    let len = (reduced_basis * v).norm();
                    let key = [
                        (v.x * nf).round() as i64,
                        (v.y * nf).round() as i64,
                        (v.z * nf).round() as i64,
                    ];
                    vectors.push(((len * 1e6).round() as i64, key, v));
                }
            }
        }
    }
    vectors.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    let v1 = vectors.first()?.2;
    let v2 = vectors.iter().map(|e| e.2).find(|v| v1.cross(v).norm() > 1e-9)?;
    let target = 1.0 / nf;
    let v3 = vectors.iter().map(|e| e.2).find(|v| {
        let det = Matrix3::from_columns(&[v1, v2, *v]).determinant().abs();
        (det - target).abs() < 1e-6
    })?;

    let mut local = Matrix3::from_columns(&[v1, v2, v3]);
    if local.determinant() < 0.0 {
        local.set_column(2, &(-v3));
    }
    Some(t_red * local)
}

// ─────────────────────────────────────────────────────────────
// 原胞坐标中的点操作
// ─────────────────────────────────────────────────────────────

impl Frame {
    fn new(
        basis: Matrix3<f64>,
        p: &Matrix3<f64>,
        p_inv: &Matrix3<f64>,
        ops: &[SymmetryOp],
        tolerance: f64,
    ) -> Self {
        let metric = basis.transpose() * basis;
        let points = box_points(&basis);

        let mut point_ops: Vec<PointOp> = Vec::new();
        for op in ops {
            let w = p_inv * op.rotation_matrix() * p;
            let rounded = w.map(|x| x.round());
            if (w - rounded).abs().max() > 1e-3 {
                log::warn!("operation {} is not integral in the primitive cell", op.to_xyz());
                continue;
            }
            if point_ops.iter().any(|q| q.w == rounded) {
                continue;
            }
            let det = rounded.determinant().round() as i32;
            let trace = rounded.trace().round() as i32;
            let Some(kind) = RotationKind::classify(det, trace) else {
                continue;
            };
            let proper = rounded * det as f64;
            let axis = match kind {
                RotationKind::Identity | RotationKind::Inversion => None,
                _ => points
                    .iter()
                    .find(|v| (proper * **v - **v).norm() < 1e-6)
                    .copied(),
            };
            point_ops.push(PointOp {
                w: rounded,
                t: p_inv * op.translation_vector(),
                kind,
                proper,
                axis,
            });
        }

        Self {
            basis,
            metric,
            ops: point_ops,
            points,
            tolerance,
        }
    }

    fn length(&self, v: &Vector3<f64>) -> f64 {
        (self.basis * v).norm()
    }

    /// 分数坐标位移是否等价于零（模整数平移）
    fn is_lattice_translation(&self, d: &Vector3<f64>) -> bool {
        (self.basis * d.map(|x| x - x.round())).norm() < 3.0 * self.tolerance
    }

    fn axes_of(&self, kinds: &[RotationKind]) -> Vec<Vector3<f64>> {
        let mut axes: Vec<Vector3<f64>> = Vec::new();
        for op in self.ops.iter().filter(|op| kinds.contains(&op.kind)) {
            if let Some(axis) = op.axis {
                if !axes.iter().any(|a| parallel(a, &axis)) {
                    axes.push(axis);
                }
            }
        }
        axes
    }

    /// 是否存在一个原点，使所有操作的平移都化为晶格平移
    ///
    /// 若原点 s₀ 存在，则各代表平移的平均值 s̄ 与 s₀ 只差 (1/|G|)Z³
    /// 以及点群不动方向上的分量，因此只需在 s̄ 周围的 1/|G| 网格上搜索。
    fn has_common_origin(&self) -> bool {
        let order = self.ops.len();
        if order <= 1 {
            return true;
        }
        let mean = self.ops.iter().fold(Vector3::zeros(), |acc, op| acc + op.t) / order as f64;

        let mut ops: Vec<&PointOp> = self.ops.iter().filter(|op| op.kind != RotationKind::Identity).collect();
        ops.sort_by_key(|op| op.w.determinant() > 0.0);

        let step = 1.0 / order as f64;
        for i in 0..order {
            for j in 0..order {
                for k in 0..order {
                    let s = mean + Vector3::new(i as f64, j as f64, k as f64) * step;
                    let fits = ops.iter().all(|op| {
                        let r = op.t - (Matrix3::identity() - op.w) * s;
                        self.is_lattice_translation(&r)
                    });
                    if fits {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// 方向 d 上反映面的全部记号：纯反映为 `m`，滑移面按惯用晶胞中的滑移向量命名
    fn plane_letters(&self, d: &Vector3<f64>, c_inv: &Matrix3<f64>) -> Vec<char> {
        let mut letters = Vec::new();
        for op in self.ops.iter().filter(|op| op.kind == RotationKind::Mirror) {
            if !op.axis.is_some_and(|a| parallel(&a, d)) {
                continue;
            }
            for l in lattice_offsets() {
                let t = op.t + l;
                let glide = (t + op.w * t) / 2.0;
                let letter = if self.is_lattice_translation(&glide) {
                    'm'
                } else {
                    glide_letter(&(c_inv * glide))
                };
                if !letters.contains(&letter) {
                    letters.push(letter);
                }
            }
        }
        letters
    }

    /// 方向 d 上 n 次轴出现的全部螺旋分量（0 表示纯旋转），升序
    ///
    /// 分量按右手螺旋计：绕轴正向转 2π/n 时沿轴平移 m/n。
    fn screw_components(&self, d: &Vector3<f64>, n: u32) -> Vec<u32> {
        let mut found: Vec<u32> = Vec::new();
        for op in &self.ops {
            if op.w.determinant() < 0.0 || op.kind.order() != n || op.kind == RotationKind::Identity {
                continue;
            }
            let Some(axis) = op.axis else {
                continue;
            };
            if !parallel(&axis, d) {
                continue;
            }
            let sense = self.rotation_sense(&op.w, &axis);
            for l in lattice_offsets() {
                if let Some(m) = self.screw_component(op, &axis, &(op.t + l), n, sense) {
                    if !found.contains(&m) {
                        found.push(m);
                    }
                }
            }
        }
        found.sort_unstable();
        found
    }

    /// 笛卡尔空间中 W 绕 axis 的转向：逆时针为 +1，顺时针为 -1，二次轴记 +1
    fn rotation_sense(&self, w: &Matrix3<f64>, axis: &Vector3<f64>) -> f64 {
        let Some(v) = self.points.iter().find(|v| !parallel(v, axis)) else {
            return 1.0;
        };
        let d = self.basis * axis;
        let from = self.basis * v;
        let to = self.basis * (w * v);
        if d.dot(&from.cross(&to)) < -1e-9 {
            -1.0
        } else {
            1.0
        }
    }

    fn screw_component(
        &self,
        op: &PointOp,
        axis: &Vector3<f64>,
        t: &Vector3<f64>,
        n: u32,
        sense: f64,
    ) -> Option<u32> {
        let mut sum = Vector3::zeros();
        let mut power = Matrix3::identity();
        for _ in 0..n {
            sum += power * t;
            power = op.w * power;
        }
        let intrinsic = sum / n as f64;
        let alpha = (intrinsic.transpose() * self.metric * axis)[0]
            / (axis.transpose() * self.metric * axis)[0];
        // 顺时针的操作是逆操作，其本征平移反号
        let scaled = alpha * n as f64 * sense;
        if (scaled - scaled.round()).abs() > 0.1 {
            return None;
        }
        Some((scaled.round() as i64).rem_euclid(n as i64) as u32)
    }
}

fn box_points(basis: &Matrix3<f64>) -> Vec<Vector3<f64>> {
    let mut points: Vec<(i64, [i32; 3], Vector3<f64>)> = Vec::new();
    for i in -BOX_RANGE..=BOX_RANGE {
        for j in -BOX_RANGE..=BOX_RANGE {
            for k in -BOX_RANGE..=BOX_RANGE {
                let first = if i != 0 { i } else if j != 0 { j } else { k };
                if first <= 0 {
                    continue;
                }
                let v = Vector3::new(i as f64, j as f64, k as f64);
                let len = (basis * v).norm();
                points.push(((len * 1e6).round() as i64, [i, j, k], v));
            }
        }
    }
    points.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
    points.into_iter().map(|p| p.2).collect()
}

fn lattice_offsets() -> impl Iterator<Item = Vector3<f64>> {
    (0..27).map(|n| Vector3::new((n % 3) as f64, ((n / 3) % 3) as f64, (n / 9) as f64))
}

fn parallel(u: &Vector3<f64>, v: &Vector3<f64>) -> bool {
    u.cross(v).norm() < 1e-6
}

/// 惯用坐标中的滑移向量 → 滑移面字母
fn glide_letter(g: &Vector3<f64>) -> char {
    let frac: Vec<f64> = g.iter().map(|x| x - x.floor()).collect();
    let near = |x: f64, target: f64| (x - target).abs() < 0.05;
    if frac.iter().any(|&x| near(x, 0.25) || near(x, 0.75)) {
        return 'd';
    }
    let halves: Vec<usize> = (0..3).filter(|&i| near(frac[i], 0.5)).collect();
    match halves.as_slice() {
        [0] => 'a',
        [1] => 'b',
        [2] => 'c',
        [_, _] | [_, _, _] => 'n',
        _ => 'g',
    }
}

fn is_integral(v: &Vector3<f64>) -> bool {
    v.iter().all(|x| (x - x.round()).abs() < 1e-6)
}

// ─────────────────────────────────────────────────────────────
// 惯用晶胞
// ─────────────────────────────────────────────────────────────

fn conventional_setting(frame: &Frame, pg: &PointGroupDef) -> Option<Setting> {
    match pg.system {
        Triclinic => Some(Setting::primitive()),
        Monoclinic => monoclinic_setting(frame),
        Orthorhombic => orthorhombic_setting(frame, pg.symbol == "mm2"),
        Tetragonal | Trigonal | Hexagonal => axial_setting(frame, pg.system),
        Cubic => cubic_setting(frame),
    }
}

/// 由 det(C) 与带心向量判定带心类型
fn lattice_centering(c: &Matrix3<f64>) -> Option<Centering> {
    let has = |v: [f64; 3]| is_integral(&(c * Vector3::from(v)));
    match c.determinant().abs().round() as i32 {
        1 => Some(Centering::P),
        2 if has([0.5, 0.5, 0.5]) => Some(Centering::I),
        2 if has([0.5, 0.5, 0.0]) => Some(Centering::C),
        2 if has([0.0, 0.5, 0.5]) => Some(Centering::A),
        2 if has([0.5, 0.0, 0.5]) => Some(Centering::B),
        3 if has([2.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0]) || has([1.0 / 3.0, 2.0 / 3.0, 1.0 / 3.0]) => {
            Some(Centering::R)
        }
        4 if has([0.0, 0.5, 0.5]) && has([0.5, 0.0, 0.5]) => Some(Centering::F),
        _ => None,
    }
}

fn right_handed(columns: [Vector3<f64>; 3], flip: usize) -> Matrix3<f64> {
    let mut m = Matrix3::from_columns(&columns);
    if m.determinant() < 0.0 {
        m.set_column(flip, &(-columns[flip]));
    }
    m
}

fn monoclinic_setting(frame: &Frame) -> Option<Setting> {
    let op = frame
        .ops
        .iter()
        .find(|op| matches!(op.kind, RotationKind::Two | RotationKind::Mirror))?;
    let b = op.axis?;
    let plane: Vec<Vector3<f64>> = frame
        .points
        .iter()
        .filter(|v| (op.proper * **v + **v).norm() < 1e-6)
        .copied()
        .collect();
    let a = *plane.first()?;
    let c = plane
        .iter()
        .filter(|v| !parallel(&a, v))
        .min_by_key(|v| Matrix3::from_columns(&[a, b, **v]).determinant().abs().round() as i64)
        .copied()?;

    let mut m = right_handed([a, b, c], 2);
    let centering = match lattice_centering(&m)? {
        Centering::P => Centering::P,
        Centering::C => Centering::C,
        Centering::A => {
            let (a, b, c) = (m.column(0).into_owned(), m.column(1).into_owned(), m.column(2).into_owned());
            m = Matrix3::from_columns(&[c, -b, a]);
            Centering::C
        }
        Centering::I => {
            let (a, c) = (m.column(0).into_owned(), m.column(2).into_owned());
            m.set_column(0, &(a + c));
            Centering::C
        }
        _ => return None,
    };

    Some(Setting {
        c: m,
        centering,
        two_along_a: false,
        mirror_along_a: false,
    })
}

fn orthorhombic_setting(frame: &Frame, polar: bool) -> Option<Setting> {
    let axes = frame.axes_of(&[RotationKind::Two, RotationKind::Mirror]);
    if axes.len() != 3 {
        return None;
    }
    let by_length = |v: &Vector3<f64>| (frame.length(v) * 1e6).round() as i64;

    let [a, b, c] = if polar {
        let proper = frame.axes_of(&[RotationKind::Two]);
        let c = *proper.first()?;
        let mut rest: Vec<Vector3<f64>> = axes.into_iter().filter(|v| !parallel(v, &c)).collect();
        rest.sort_by_key(by_length);
        [*rest.first()?, *rest.get(1)?, c]
    } else {
        let mut sorted = axes;
        sorted.sort_by_key(by_length);
        [sorted[0], sorted[1], sorted[2]]
    };

    let mut m = right_handed([a, b, c], 2);
    let col = |m: &Matrix3<f64>, i: usize| m.column(i).into_owned();
    let centering = match lattice_centering(&m)? {
        Centering::A if !polar => {
            m = Matrix3::from_columns(&[col(&m, 1), col(&m, 2), col(&m, 0)]);
            Centering::C
        }
        Centering::B if !polar => {
            m = Matrix3::from_columns(&[col(&m, 2), col(&m, 0), col(&m, 1)]);
            Centering::C
        }
        Centering::B => {
            m = Matrix3::from_columns(&[col(&m, 1), col(&m, 0), -col(&m, 2)]);
            Centering::A
        }
        Centering::R => return None,
        other => other,
    };

    Some(Setting {
        c: m,
        centering,
        two_along_a: false,
        mirror_along_a: false,
    })
}

/// 四方、三方、六方：c 沿主轴，a 为最短垂直格矢，b = R·a
fn axial_setting(frame: &Frame, system: CrystalSystem) -> Option<Setting> {
    let (n, op) = if system == Tetragonal {
        let op = frame
            .ops
            .iter()
            .find(|op| matches!(op.kind, RotationKind::Four | RotationKind::RotoInversion4))?;
        (4, op)
    } else {
        (3, frame.ops.iter().find(|op| op.kind == RotationKind::Three)?)
    };
    let r = op.proper;
    let c = op.axis?;

    let perpendicular = |v: &Vector3<f64>| {
        let mut sum = Vector3::zeros();
        let mut image = *v;
        for _ in 0..n {
            sum += image;
            image = r * image;
        }
        sum.norm() < 1e-6
    };
    let a = *frame.points.iter().find(|v| perpendicular(v))?;
    let b = r * a;

    let mut m = Matrix3::from_columns(&[a, b, c]);
    if m.determinant() < 0.0 {
        let b = if n == 4 { -b } else { r * r * a };
        m.set_column(1, &b);
    }

    let centering = match (system, lattice_centering(&m)?) {
        (_, Centering::P) => Centering::P,
        (Tetragonal, Centering::I) => Centering::I,
        (Trigonal, Centering::R) => {
            if !is_integral(&(m * Vector3::new(2.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0))) {
                // 反向设置：绕 c 旋转 180° 得到正向设置
                let (a, b) = (m.column(0).into_owned(), m.column(1).into_owned());
                m.set_column(0, &(-a));
                m.set_column(1, &(-b));
            }
            Centering::R
        }
        _ => return None,
    };

    let along_a = |kind: RotationKind| {
        frame
            .ops
            .iter()
            .any(|op| op.kind == kind && op.axis.is_some_and(|ax| parallel(&ax, &a)))
    };

    Some(Setting {
        c: m,
        centering,
        two_along_a: along_a(RotationKind::Two),
        mirror_along_a: along_a(RotationKind::Mirror),
    })
}

fn cubic_setting(frame: &Frame) -> Option<Setting> {
    let mut axes = frame.axes_of(&[RotationKind::Four]);
    if axes.is_empty() {
        axes = frame.axes_of(&[RotationKind::Two]);
    }
    if axes.len() != 3 {
        return None;
    }
    axes.sort_by_key(|v| {
        (
            (frame.length(v) * 1e6).round() as i64,
            [v.x as i64, v.y as i64, v.z as i64],
        )
    });

    let m = right_handed([axes[0], axes[1], axes[2]], 2);
    let centering = match lattice_centering(&m)? {
        c @ (Centering::P | Centering::I | Centering::F) => c,
        _ => return None,
    };

    Some(Setting {
        c: m,
        centering,
        two_along_a: false,
        mirror_along_a: false,
    })
}

/// 带取向的点群符号，用于区分 -42m/-4m2、321/312 等
fn oriented_symbol(symbol: &str, setting: &Setting) -> String {
    let rhombohedral = setting.centering == Centering::R;
    let oriented = match symbol {
        "-42m" if !setting.two_along_a => "-4m2",
        "32" if !rhombohedral => {
            if setting.two_along_a {
                "321"
            } else {
                "312"
            }
        }
        "3m" if !rhombohedral => {
            if setting.mirror_along_a {
                "3m1"
            } else {
                "31m"
            }
        }
        "-3m" if !rhombohedral => {
            if setting.two_along_a {
                "-3m1"
            } else {
                "-31m"
            }
        }
        "-6m2" if !setting.mirror_along_a => "-62m",
        other => other,
    };
    oriented.to_string()
}

// ─────────────────────────────────────────────────────────────
// 空间群候选
// ─────────────────────────────────────────────────────────────

/// 符号各位置对应的惯用晶胞方向
fn symbol_directions(system: CrystalSystem) -> Vec<[f64; 3]> {
    match system {
        Triclinic => vec![],
        Monoclinic => vec![[0.0, 1.0, 0.0]],
        Orthorhombic => vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        Tetragonal => vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0]],
        Trigonal | Hexagonal => vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [1.0, -1.0, 0.0]],
        Cubic => vec![[1.0, 0.0, 0.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
    }
}

/// 正交晶系允许的轴置换（保持带心字母不变）
fn axis_permutations(pg: &PointGroupDef, centering: Centering) -> Vec<[usize; 3]> {
    if pg.system != Orthorhombic {
        return vec![[0, 1, 2]];
    }
    let polar = pg.symbol == "mm2";
    match (polar, centering) {
        (true, Centering::A) => vec![[0, 1, 2]],
        (true, _) | (false, Centering::C) => vec![[0, 1, 2], [1, 0, 2]],
        _ => vec![
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ],
    }
}

fn token_score(frame: &Frame, c_inv: &Matrix3<f64>, token: &SymbolToken, d: &Vector3<f64>) -> i32 {
    let mut score = 0;
    if let Some(plane) = token.plane {
        let letters = frame.plane_letters(d, c_inv);
        if !letters.is_empty() {
            let has_mirror = letters.contains(&'m');
            score += match plane {
                'm' if has_mirror => 2,
                'm' => 0,
                _ if has_mirror => 0,
                'e' => 2,
                g if letters.contains(&g) => 2,
                _ => 1,
            };
        }
    }
    if token.rotation >= 2 {
        let n = token.rotation as u32;
        let screw = token.screw as u32 % n;
        let found = frame.screw_components(d, n);
        // 带心晶胞中同一方向可同时出现多种螺旋，记号取最小者，手性须严格一致
        let folded = |m: u32| m.min(n - m);
        let lowest = found.iter().map(|&m| folded(m)).min();
        if lowest == Some(folded(screw)) && found.contains(&screw) {
            score += 1;
        }
    }
    score
}

fn choose_entry(
    frame: &Frame,
    setting: &Setting,
    pg: &PointGroupDef,
    candidates: &[&'static SpaceGroupEntry],
    symmorphic: bool,
) -> (&'static SpaceGroupEntry, Vec<u16>) {
    let fallback = &spacegroups::SPACE_GROUPS[0];
    if candidates.is_empty() {
        return (fallback, Vec::new());
    }

    if symmorphic {
        if let Some(&entry) = candidates.iter().find(|e| e.is_symmorphic()) {
            return (entry, Vec::new());
        }
    }

    let pool: Vec<&'static SpaceGroupEntry> = {
        let nonsymmorphic: Vec<_> = candidates.iter().copied().filter(|e| !e.is_symmorphic()).collect();
        if nonsymmorphic.is_empty() {
            candidates.to_vec()
        } else {
            nonsymmorphic
        }
    };

    let c_inv = setting.c.try_inverse().unwrap_or_else(Matrix3::identity);
    let base = symbol_directions(pg.system);
    let permutations = axis_permutations(pg, setting.centering);
    let scores: Vec<i32> = pool
        .iter()
        .map(|entry| {
            let tokens = entry.tokens();
            permutations
                .iter()
                .map(|perm| {
                    tokens
                        .iter()
                        .zip(perm.iter())
                        .map(|(token, &axis)| {
                            let d = base.get(axis).copied().unwrap_or([0.0, 0.0, 1.0]);
                            let prim = setting.c * Vector3::from(d);
                            token_score(frame, &c_inv, token, &prim)
                        })
                        .sum::<i32>()
                })
                .max()
                .unwrap_or(0)
        })
        .collect();

    let best = scores.iter().copied().max().unwrap_or(0);
    let mut winners = pool
        .iter()
        .zip(&scores)
        .filter(|&(_, &s)| s == best)
        .map(|(e, _)| *e);
    let chosen = winners.next().unwrap_or(pool[0]);
    let alternatives: Vec<u16> = winners.map(|e| e.number).collect();
    if !alternatives.is_empty() {
        log::debug!(
            "space group {} chosen over equally scored {:?}",
            chosen.symbol,
            alternatives
        );
    }
    (chosen, alternatives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::CellGeometry;
    use crate::models::Lattice;

    #[test]
    fn test_point_group_orders() {
        let orders = [1, 2, 2, 2, 4, 4, 4, 8, 4, 4, 8, 8, 8, 8, 16, 3, 6, 6, 6, 12, 6, 6, 12, 12, 12, 12, 24, 12, 24, 24, 24, 48];
        for (g, &order) in POINT_GROUPS.iter().zip(orders.iter()) {
            let sum: u32 = g.census.iter().map(|&x| x as u32).sum();
            assert_eq!(sum, order, "{}", g.symbol);
        }
    }

    #[test]
    fn test_primitive_of_fcc_translations() {
        let basis = Matrix3::identity() * 4.0;
        let pure = vec![
            Vector3::zeros(),
            Vector3::new(0.5, 0.5, 0.0),
            Vector3::new(0.5, 0.0, 0.5),
            Vector3::new(0.0, 0.5, 0.5),
        ];
        let p = primitive_transform(&basis, &pure);
        assert!((p.determinant() - 0.25).abs() < 1e-9);
        for i in 0..3 {
            let len = (basis * p.column(i)).norm();
            assert!((len - 4.0 / 2f64.sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_lattice_centering_detection() {
        let body = Matrix3::new(
            -1.0, 1.0, 1.0, //
            1.0, -1.0, 1.0, //
            1.0, 1.0, -1.0,
        )
        .try_inverse()
        .unwrap()
        .map(|x| x * 2.0);
        // 列为体心原胞坐标下的立方基矢，行列式为 2
        assert_eq!(lattice_centering(&body.map(|x: f64| x.round())), Some(Centering::I));
        assert_eq!(lattice_centering(&Matrix3::identity()), Some(Centering::P));
    }

    #[test]
    fn test_simple_cubic_ops_classify() {
        let cell = CellGeometry::new(&Lattice::cubic(3.0)).unwrap();
        let rotations = super::super::operations::lattice_rotations(&cell, 1e-3);
        let ops: Vec<SymmetryOp> = rotations
            .iter()
            .map(|w| SymmetryOp::from_parts(w, &Vector3::zeros()))
            .collect();
        let result = classify(&cell, &ops, 1e-3);
        assert_eq!(result.point_group, "m-3m");
        assert_eq!(result.centering, Centering::P);
        assert!(result.symmorphic);
        assert_eq!(result.entry.number, 221);
    }
}
