//! # 高对称点目录
//!
//! Setyawan–Curtarolo 约定下 25 种晶格变体的高对称点（标准原胞倒格基的分数坐标）
//! 与推荐路径。含参数的点（η, ζ, ν, …）由标准惯用胞参数现场计算。
//!
//! 路径写成紧凑字符串：`-` 连接连续的点，`|` 分隔不连续的分支。

use serde::Serialize;
use std::fmt;

/// 晶格变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LatticeVariant {
    Cub,
    Fcc,
    Bcc,
    Tet,
    Bct1,
    Bct2,
    Orc,
    Orcf1,
    Orcf2,
    Orcf3,
    Orci,
    Orcc,
    Hex,
    Rhl1,
    Rhl2,
    Mcl,
    Mclc1,
    Mclc2,
    Mclc3,
    Mclc4,
    Mclc5,
    Tri1a,
    Tri1b,
    Tri2a,
    Tri2b,
}

impl LatticeVariant {
    pub fn name(&self) -> &'static str {
        use LatticeVariant::*;
        match self {
            Cub => "CUB",
            Fcc => "FCC",
            Bcc => "BCC",
            Tet => "TET",
            Bct1 => "BCT1",
            Bct2 => "BCT2",
            Orc => "ORC",
            Orcf1 => "ORCF1",
            Orcf2 => "ORCF2",
            Orcf3 => "ORCF3",
            Orci => "ORCI",
            Orcc => "ORCC",
            Hex => "HEX",
            Rhl1 => "RHL1",
            Rhl2 => "RHL2",
            Mcl => "MCL",
            Mclc1 => "MCLC1",
            Mclc2 => "MCLC2",
            Mclc3 => "MCLC3",
            Mclc4 => "MCLC4",
            Mclc5 => "MCLC5",
            Tri1a => "TRI1a",
            Tri1b => "TRI1b",
            Tri2a => "TRI2a",
            Tri2b => "TRI2b",
        }
    }

    /// 推荐路径（紧凑写法）
    pub fn path(&self) -> &'static str {
        use LatticeVariant::*;
        match self {
            Cub => "Γ-X-M-Γ-R-X|M-R",
            Fcc => "Γ-X-W-K-Γ-L-U-W-L-K|U-X",
            Bcc => "Γ-H-N-Γ-P-H|P-N",
            Tet => "Γ-X-M-Γ-Z-R-A-Z|X-R|M-A",
            Bct1 => "Γ-X-M-Γ-Z-P-N-Z1-M|X-P",
            Bct2 => "Γ-X-Y-Σ-Γ-Z-Σ1-N-P-Y1-Z|X-P",
            Orc => "Γ-X-S-Y-Γ-Z-U-R-T-Z|Y-T|U-X|S-R",
            Orcf1 => "Γ-Y-T-Z-Γ-X-A1-Y|T-X1|X-A-Z|L-Γ",
            Orcf2 => "Γ-Y-C-D-X-Γ-Z-D1-H-C|C1-Z|X-H1|H-Y|L-Γ",
            Orcf3 => "Γ-Y-T-Z-Γ-X-A1-Y|X-A-Z|L-Γ",
            Orci => "Γ-X-L-T-W-R-X1-Z-Γ-Y-S-W|L1-Y|Y1-Z",
            Orcc => "Γ-X-S-R-A-Z-Γ-Y-X1-A1-T-Y|Z-T",
            Hex => "Γ-M-K-Γ-A-L-H-A|L-M|K-H",
            Rhl1 => "Γ-L-B1|B-Z-Γ-X|Q-F-P1-Z|L-P",
            Rhl2 => "Γ-P-Z-Q-Γ-F-P1-Q1-L-Z",
            Mcl => "Γ-Y-H-C-E-M1-A-X-H1|M-D-Z|Y-D",
            Mclc1 => "Γ-Y-F-L-I|I1-Z-F1|Y-X1|X-Γ-N|M-Γ",
            Mclc2 => "Γ-Y-F-L-I|I1-Z-F1|N-Γ-M",
            Mclc3 => "Γ-Y-F-H-Z-I-F1|H1-Y1-X-Γ-N|M-Γ",
            Mclc4 => "Γ-Y-F-H-Z-I|H1-Y1-X-Γ-N|M-Γ",
            Mclc5 => "Γ-Y-F-L-I|I1-Z-H-F1|H1-Y1-X-Γ-N|M-Γ",
            Tri1a | Tri1b | Tri2a | Tri2b => "X-Γ-Y|L-Γ-Z|N-Γ-M|R-Γ",
        }
    }

    /// 路径分支，每个分支是一串连续的点名
    pub fn branches(&self) -> Vec<Vec<&'static str>> {
        self.path()
            .split('|')
            .map(|branch| branch.split('-').collect())
            .collect()
    }
}

impl fmt::Display for LatticeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 标准惯用胞参数
///
/// 单斜为 a 轴唯一、α < 90° 的设置；菱方的 `a` 与 `alpha` 为菱方原胞的边长与夹角。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    /// 弧度
    pub alpha: f64,
}

/// 某变体的全部高对称点及其用到的参数
#[derive(Debug, Clone)]
pub struct PointTable {
    pub points: Vec<(&'static str, [f64; 3])>,
    pub parameters: Vec<(&'static str, f64)>,
}

impl PointTable {
    pub fn get(&self, label: &str) -> Option<[f64; 3]> {
        self.points.iter().find(|(l, _)| *l == label).map(|(_, p)| *p)
    }
}

const G: (&str, [f64; 3]) = ("Γ", [0.0, 0.0, 0.0]);

/// 计算变体的高对称点
pub fn special_points(variant: LatticeVariant, p: &CellParams) -> PointTable {
    use LatticeVariant::*;
    let CellParams { a, b, c, alpha } = *p;
    let (cos_a, sin_a) = (alpha.cos(), alpha.sin());

    let (points, parameters): (Vec<(&'static str, [f64; 3])>, Vec<(&'static str, f64)>) =
        match variant {
            Cub => (
                vec![
                    G,
                    ("M", [0.5, 0.5, 0.0]),
                    ("R", [0.5, 0.5, 0.5]),
                    ("X", [0.0, 0.5, 0.0]),
                ],
                vec![],
            ),
            Fcc => (
                vec![
                    G,
                    ("K", [0.375, 0.375, 0.75]),
                    ("L", [0.5, 0.5, 0.5]),
                    ("U", [0.625, 0.25, 0.625]),
                    ("W", [0.5, 0.25, 0.75]),
                    ("X", [0.5, 0.0, 0.5]),
                ],
                vec![],
            ),
            Bcc => (
                vec![
                    G,
                    ("H", [0.5, -0.5, 0.5]),
                    ("P", [0.25, 0.25, 0.25]),
                    ("N", [0.0, 0.0, 0.5]),
                ],
                vec![],
            ),
            Tet => (
                vec![
                    G,
                    ("A", [0.5, 0.5, 0.5]),
                    ("M", [0.5, 0.5, 0.0]),
                    ("R", [0.0, 0.5, 0.5]),
                    ("X", [0.0, 0.5, 0.0]),
                    ("Z", [0.0, 0.0, 0.5]),
                ],
                vec![],
            ),
            Bct1 => {
                let eta = (1.0 + c * c / (a * a)) / 4.0;
                (
                    vec![
                        G,
                        ("M", [-0.5, 0.5, 0.5]),
                        ("N", [0.0, 0.5, 0.0]),
                        ("P", [0.25, 0.25, 0.25]),
                        ("X", [0.0, 0.0, 0.5]),
                        ("Z", [eta, eta, -eta]),
                        ("Z1", [-eta, 1.0 - eta, eta]),
                    ],
                    vec![("η", eta)],
                )
            }
            Bct2 => {
                let eta = (1.0 + a * a / (c * c)) / 4.0;
                let zeta = a * a / (2.0 * c * c);
                (
                    vec![
                        G,
                        ("N", [0.0, 0.5, 0.0]),
                        ("P", [0.25, 0.25, 0.25]),
                        ("Σ", [-eta, eta, eta]),
                        ("Σ1", [eta, 1.0 - eta, -eta]),
                        ("X", [0.0, 0.0, 0.5]),
                        ("Y", [-zeta, zeta, 0.5]),
                        ("Y1", [0.5, 0.5, -zeta]),
                        ("Z", [0.5, 0.5, -0.5]),
                    ],
                    vec![("η", eta), ("ζ", zeta)],
                )
            }
            Orc => (
                vec![
                    G,
                    ("R", [0.5, 0.5, 0.5]),
                    ("S", [0.5, 0.5, 0.0]),
                    ("T", [0.0, 0.5, 0.5]),
                    ("U", [0.5, 0.0, 0.5]),
                    ("X", [0.5, 0.0, 0.0]),
                    ("Y", [0.0, 0.5, 0.0]),
                    ("Z", [0.0, 0.0, 0.5]),
                ],
                vec![],
            ),
            Orcf1 | Orcf3 => {
                let (a2, b2, c2) = (a * a, b * b, c * c);
                let zeta = (1.0 + a2 / b2 - a2 / c2) / 4.0;
                let eta = (1.0 + a2 / b2 + a2 / c2) / 4.0;
                (
                    vec![
                        G,
                        ("A", [0.5, 0.5 + zeta, zeta]),
                        ("A1", [0.5, 0.5 - zeta, 1.0 - zeta]),
                        ("L", [0.5, 0.5, 0.5]),
                        ("T", [1.0, 0.5, 0.5]),
                        ("X", [0.0, eta, eta]),
                        ("X1", [1.0, 1.0 - eta, 1.0 - eta]),
                        ("Y", [0.5, 0.0, 0.5]),
                        ("Z", [0.5, 0.5, 0.0]),
                    ],
                    vec![("ζ", zeta), ("η", eta)],
                )
            }
            Orcf2 => {
                let (a2, b2, c2) = (a * a, b * b, c * c);
                let eta = (1.0 + a2 / b2 - a2 / c2) / 4.0;
                let phi = (1.0 + c2 / b2 - c2 / a2) / 4.0;
                let delta = (1.0 + b2 / a2 - b2 / c2) / 4.0;
                (
                    vec![
                        G,
                        ("C", [0.5, 0.5 - eta, 1.0 - eta]),
                        ("C1", [0.5, 0.5 + eta, eta]),
                        ("D", [0.5 - delta, 0.5, 1.0 - delta]),
                        ("D1", [0.5 + delta, 0.5, delta]),
                        ("L", [0.5, 0.5, 0.5]),
                        ("H", [1.0 - phi, 0.5 - phi, 0.5]),
                        ("H1", [phi, 0.5 + phi, 0.5]),
                        ("X", [0.0, 0.5, 0.5]),
                        ("Y", [0.5, 0.0, 0.5]),
                        ("Z", [0.5, 0.5, 0.0]),
                    ],
                    vec![("η", eta), ("φ", phi), ("δ", delta)],
                )
            }
            Orci => {
                let (a2, b2, c2) = (a * a, b * b, c * c);
                let zeta = (1.0 + a2 / c2) / 4.0;
                let eta = (1.0 + b2 / c2) / 4.0;
                let delta = (b2 - a2) / (4.0 * c2);
                let mu = (a2 + b2) / (4.0 * c2);
                (
                    vec![
                        G,
                        ("L", [-mu, mu, 0.5 - delta]),
                        ("L1", [mu, -mu, 0.5 + delta]),
                        ("L2", [0.5 - delta, 0.5 + delta, -mu]),
                        ("R", [0.0, 0.5, 0.0]),
                        ("S", [0.5, 0.0, 0.0]),
                        ("T", [0.0, 0.0, 0.5]),
                        ("W", [0.25, 0.25, 0.25]),
                        ("X", [-zeta, zeta, zeta]),
                        ("X1", [zeta, 1.0 - zeta, -zeta]),
                        ("Y", [eta, -eta, eta]),
                        ("Y1", [1.0 - eta, eta, -eta]),
                        ("Z", [0.5, 0.5, -0.5]),
                    ],
                    vec![("ζ", zeta), ("η", eta), ("δ", delta), ("μ", mu)],
                )
            }
            Orcc => {
                let zeta = (1.0 + a * a / (b * b)) / 4.0;
                (
                    vec![
                        G,
                        ("A", [zeta, zeta, 0.5]),
                        ("A1", [-zeta, 1.0 - zeta, 0.5]),
                        ("R", [0.0, 0.5, 0.5]),
                        ("S", [0.0, 0.5, 0.0]),
                        ("T", [-0.5, 0.5, 0.5]),
                        ("X", [zeta, zeta, 0.0]),
                        ("X1", [-zeta, 1.0 - zeta, 0.0]),
                        ("Y", [-0.5, 0.5, 0.0]),
                        ("Z", [0.0, 0.0, 0.5]),
                    ],
                    vec![("ζ", zeta)],
                )
            }
            Hex => (
                vec![
                    G,
                    ("A", [0.0, 0.0, 0.5]),
                    ("H", [1.0 / 3.0, 1.0 / 3.0, 0.5]),
                    ("K", [1.0 / 3.0, 1.0 / 3.0, 0.0]),
                    ("L", [0.5, 0.0, 0.5]),
                    ("M", [0.5, 0.0, 0.0]),
                ],
                vec![],
            ),
            Rhl1 => {
                let eta = (1.0 + 4.0 * cos_a) / (2.0 + 4.0 * cos_a);
                let nu = 0.75 - eta / 2.0;
                (
                    vec![
                        G,
                        ("B", [eta, 0.5, 1.0 - eta]),
                        ("B1", [0.5, 1.0 - eta, eta - 1.0]),
                        ("F", [0.5, 0.5, 0.0]),
                        ("L", [0.5, 0.0, 0.0]),
                        ("L1", [0.0, 0.0, -0.5]),
                        ("P", [eta, nu, nu]),
                        ("P1", [1.0 - nu, 1.0 - nu, 1.0 - eta]),
                        ("P2", [nu, nu, eta - 1.0]),
                        ("Q", [1.0 - nu, nu, 0.0]),
                        ("X", [nu, 0.0, -nu]),
                        ("Z", [0.5, 0.5, 0.5]),
                    ],
                    vec![("η", eta), ("ν", nu)],
                )
            }
            Rhl2 => {
                let eta = 1.0 / (2.0 * (alpha / 2.0).tan().powi(2));
                let nu = 0.75 - eta / 2.0;
                (
                    vec![
                        G,
                        ("F", [0.5, -0.5, 0.0]),
                        ("L", [0.5, 0.0, 0.0]),
                        ("P", [1.0 - nu, -nu, 1.0 - nu]),
                        ("P1", [nu, nu - 1.0, nu - 1.0]),
                        ("Q", [eta, eta, eta]),
                        ("Q1", [1.0 - eta, -eta, -eta]),
                        ("Z", [0.5, -0.5, 0.5]),
                    ],
                    vec![("η", eta), ("ν", nu)],
                )
            }
            Mcl => {
                let eta = (1.0 - b * cos_a / c) / (2.0 * sin_a * sin_a);
                let nu = 0.5 - eta * c * cos_a / b;
                (
                    vec![
                        G,
                        ("A", [0.5, 0.5, 0.0]),
                        ("C", [0.0, 0.5, 0.5]),
                        ("D", [0.5, 0.0, 0.5]),
                        ("D1", [0.5, 0.0, -0.5]),
                        ("E", [0.5, 0.5, 0.5]),
                        ("H", [0.0, eta, 1.0 - nu]),
                        ("H1", [0.0, 1.0 - eta, nu]),
                        ("H2", [0.0, eta, -nu]),
                        ("M", [0.5, eta, 1.0 - nu]),
                        ("M1", [0.5, 1.0 - eta, nu]),
                        ("M2", [0.5, eta, -nu]),
                        ("X", [0.0, 0.5, 0.0]),
                        ("Y", [0.0, 0.0, 0.5]),
                        ("Y1", [0.0, 0.0, -0.5]),
                        ("Z", [0.5, 0.0, 0.0]),
                    ],
                    vec![("η", eta), ("ν", nu)],
                )
            }
            Mclc1 | Mclc2 => {
                let zeta = (2.0 - b * cos_a / c) / (4.0 * sin_a * sin_a);
                let eta = 0.5 + 2.0 * zeta * c * cos_a / b;
                let psi = 0.75 - a * a / (4.0 * b * b * sin_a * sin_a);
                let phi = psi + (0.75 - psi) * b * cos_a / c;
                (
                    vec![
                        G,
                        ("N", [0.5, 0.0, 0.0]),
                        ("N1", [0.0, -0.5, 0.0]),
                        ("F", [1.0 - zeta, 1.0 - zeta, 1.0 - eta]),
                        ("F1", [zeta, zeta, eta]),
                        ("F2", [-zeta, -zeta, 1.0 - eta]),
                        ("F3", [1.0 - zeta, -zeta, 1.0 - eta]),
                        ("I", [phi, 1.0 - phi, 0.5]),
                        ("I1", [1.0 - phi, phi - 1.0, 0.5]),
                        ("L", [0.5, 0.5, 0.5]),
                        ("M", [0.5, 0.0, 0.5]),
                        ("X", [1.0 - psi, psi - 1.0, 0.0]),
                        ("X1", [psi, 1.0 - psi, 0.0]),
                        ("X2", [psi - 1.0, -psi, 0.0]),
                        ("Y", [0.5, 0.5, 0.0]),
                        ("Y1", [-0.5, -0.5, 0.0]),
                        ("Z", [0.0, 0.0, 0.5]),
                    ],
                    vec![("ζ", zeta), ("η", eta), ("ψ", psi), ("φ", phi)],
                )
            }
            Mclc3 | Mclc4 => {
                let mu = (1.0 + b * b / (a * a)) / 4.0;
                let delta = b * c * cos_a / (2.0 * a * a);
                let zeta = mu - 0.25 + (1.0 - b * cos_a / c) / (4.0 * sin_a * sin_a);
                let eta = 0.5 + 2.0 * zeta * c * cos_a / b;
                let phi = 1.0 + zeta - 2.0 * mu;
                let psi = eta - 2.0 * delta;
                (
                    vec![
                        G,
                        ("F", [1.0 - phi, 1.0 - phi, 1.0 - psi]),
                        ("F1", [phi, phi - 1.0, psi]),
                        ("F2", [1.0 - phi, -phi, 1.0 - psi]),
                        ("H", [zeta, zeta, eta]),
                        ("H1", [1.0 - zeta, -zeta, 1.0 - eta]),
                        ("H2", [-zeta, -zeta, 1.0 - eta]),
                        ("I", [0.5, -0.5, 0.5]),
                        ("M", [0.5, 0.0, 0.5]),
                        ("N", [0.5, 0.0, 0.0]),
                        ("N1", [0.0, -0.5, 0.0]),
                        ("X", [0.5, -0.5, 0.0]),
                        ("Y", [mu, mu, delta]),
                        ("Y1", [1.0 - mu, -mu, -delta]),
                        ("Y2", [-mu, -mu, -delta]),
                        ("Y3", [mu, mu - 1.0, delta]),
                        ("Z", [0.0, 0.0, 0.5]),
                    ],
                    vec![
                        ("μ", mu),
                        ("δ", delta),
                        ("ζ", zeta),
                        ("η", eta),
                        ("φ", phi),
                        ("ψ", psi),
                    ],
                )
            }
            Mclc5 => {
                let (a2, b2) = (a * a, b * b);
                let zeta = (b2 / a2 + (1.0 - b * cos_a / c) / (sin_a * sin_a)) / 4.0;
                let eta = 0.5 + 2.0 * zeta * c * cos_a / b;
                let mu = eta / 2.0 + b2 / (4.0 * a2) - b * c * cos_a / (2.0 * a2);
                let nu = 2.0 * mu - zeta;
                let omega = (4.0 * nu - 1.0 - b2 * sin_a * sin_a / a2) * c / (2.0 * b * cos_a);
                let delta = zeta * c * cos_a / b + omega / 2.0 - 0.25;
                let rho = 1.0 - zeta * a2 / b2;
                (
                    vec![
                        G,
                        ("F", [nu, nu, omega]),
                        ("F1", [1.0 - nu, 1.0 - nu, 1.0 - omega]),
                        ("F2", [nu, nu - 1.0, omega]),
                        ("H", [zeta, zeta, eta]),
                        ("H1", [1.0 - zeta, -zeta, 1.0 - eta]),
                        ("H2", [-zeta, -zeta, 1.0 - eta]),
                        ("I", [rho, 1.0 - rho, 0.5]),
                        ("I1", [1.0 - rho, rho - 1.0, 0.5]),
                        ("L", [0.5, 0.5, 0.5]),
                        ("M", [0.5, 0.0, 0.5]),
                        ("N", [0.5, 0.0, 0.0]),
                        ("N1", [0.0, -0.5, 0.0]),
                        ("X", [0.5, -0.5, 0.0]),
                        ("Y", [mu, mu, delta]),
                        ("Y1", [1.0 - mu, -mu, -delta]),
                        ("Y2", [-mu, -mu, -delta]),
                        ("Y3", [mu, mu - 1.0, delta]),
                        ("Z", [0.0, 0.0, 0.5]),
                    ],
                    vec![
                        ("ζ", zeta),
                        ("η", eta),
                        ("μ", mu),
                        ("ν", nu),
                        ("ω", omega),
                        ("δ", delta),
                        ("ρ", rho),
                    ],
                )
            }
            Tri1a | Tri2a => (
                vec![
                    G,
                    ("L", [0.5, 0.5, 0.0]),
                    ("M", [0.0, 0.5, 0.5]),
                    ("N", [0.5, 0.0, 0.5]),
                    ("R", [0.5, 0.5, 0.5]),
                    ("X", [0.5, 0.0, 0.0]),
                    ("Y", [0.0, 0.5, 0.0]),
                    ("Z", [0.0, 0.0, 0.5]),
                ],
                vec![],
            ),
            Tri1b | Tri2b => (
                vec![
                    G,
                    ("L", [0.5, -0.5, 0.0]),
                    ("M", [0.0, 0.0, 0.5]),
                    ("N", [-0.5, -0.5, 0.5]),
                    ("R", [0.0, -0.5, 0.5]),
                    ("X", [0.0, -0.5, 0.0]),
                    ("Y", [0.5, 0.0, 0.0]),
                    ("Z", [-0.5, 0.0, 0.5]),
                ],
                vec![],
            ),
        };

    PointTable { points, parameters }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const ALL: [LatticeVariant; 25] = {
        use LatticeVariant::*;
        [
            Cub, Fcc, Bcc, Tet, Bct1, Bct2, Orc, Orcf1, Orcf2, Orcf3, Orci, Orcc, Hex, Rhl1, Rhl2,
            Mcl, Mclc1, Mclc2, Mclc3, Mclc4, Mclc5, Tri1a, Tri1b, Tri2a, Tri2b,
        ]
    };

    fn params() -> CellParams {
        CellParams {
            a: 3.0,
            b: 4.0,
            c: 5.0,
            alpha: 70.0 * PI / 180.0,
        }
    }

    #[test]
    fn test_every_path_label_is_in_catalogue() {
        for variant in ALL {
            let table = special_points(variant, &params());
            for branch in variant.branches() {
                assert!(branch.len() >= 2, "{} has a one-point branch", variant);
                for label in branch {
                    assert!(
                        table.get(label).is_some(),
                        "{}: path point {} missing from catalogue",
                        variant,
                        label
                    );
                }
            }
        }
    }

    #[test]
    fn test_gamma_always_at_origin() {
        for variant in ALL {
            assert_eq!(special_points(variant, &params()).get("Γ"), Some([0.0; 3]));
        }
    }

    #[test]
    fn test_cubic_branches() {
        let branches = LatticeVariant::Cub.branches();
        assert_eq!(branches, vec![vec!["Γ", "X", "M", "Γ", "R", "X"], vec!["M", "R"]]);
    }

    #[test]
    fn test_bct1_parameter() {
        let p = CellParams {
            a: 4.0,
            b: 4.0,
            c: 2.0,
            alpha: PI / 2.0,
        };
        let table = special_points(LatticeVariant::Bct1, &p);
        let eta = table.parameters[0].1;
        assert!((eta - 0.3125).abs() < 1e-12);
        assert_eq!(table.get("Z"), Some([eta, eta, -eta]));
    }
}
