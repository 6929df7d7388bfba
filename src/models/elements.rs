//! # 元素数据表
//!
//! 每种元素的原子序数与三套原子半径（Å）：
//! - 共价半径
//! - 离子半径（Shannon 1976，CN=6，常见价态）
//! - Van der Waals 半径（Alvarez 2013）
//!
//! ## 依赖关系
//! - 被 `voids/` 和 `xrd/scattering.rs` 使用
//! - 纯静态数据，无外部依赖

use std::collections::HashMap;
use std::sync::LazyLock;

/// 未知物种使用的默认半径（Å）
pub const DEFAULT_RADIUS: f64 = 1.5;

/// 单个元素的数据行
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementData {
    pub symbol: &'static str,
    pub atomic_number: u32,
    pub covalent_radius: f64,
    pub ionic_radius: f64,
    pub vdw_radius: f64,
}

const fn el(
    symbol: &'static str,
    atomic_number: u32,
    covalent_radius: f64,
    ionic_radius: f64,
    vdw_radius: f64,
) -> ElementData {
    ElementData {
        symbol,
        atomic_number,
        covalent_radius,
        ionic_radius,
        vdw_radius,
    }
}

/// H 到 Lr 的元素表
pub static ELEMENTS: &[ElementData] = &[
    el("H", 1, 0.37, 0.60, 1.20),
    el("He", 2, 0.32, 0.00, 1.40),
    el("Li", 3, 1.34, 0.76, 1.82),
    el("Be", 4, 0.90, 0.45, 1.53),
    el("B", 5, 0.82, 0.27, 1.92),
    el("C", 6, 0.77, 0.16, 1.70),
    el("N", 7, 0.75, 0.13, 1.55),
    el("O", 8, 0.73, 1.40, 1.52),
    el("F", 9, 0.71, 1.33, 1.47),
    el("Ne", 10, 0.69, 0.00, 1.54),
    el("Na", 11, 1.54, 1.02, 2.27),
    el("Mg", 12, 1.30, 0.72, 1.73),
    el("Al", 13, 1.18, 0.54, 1.84),
    el("Si", 14, 1.11, 0.40, 2.10),
    el("P", 15, 1.06, 0.38, 1.80),
    el("S", 16, 1.02, 1.84, 1.80),
    el("Cl", 17, 0.99, 1.81, 1.75),
    el("Ar", 18, 0.97, 0.00, 1.88),
    el("K", 19, 1.96, 1.38, 2.75),
    el("Ca", 20, 1.74, 1.00, 2.31),
    el("Sc", 21, 1.44, 0.745, 2.30),
    el("Ti", 22, 1.36, 0.605, 2.15),
    el("V", 23, 1.25, 0.59, 2.05),
    el("Cr", 24, 1.27, 0.615, 2.05),
    el("Mn", 25, 1.39, 0.83, 2.05),
    el("Fe", 26, 1.25, 0.78, 2.00),
    el("Co", 27, 1.26, 0.745, 2.00),
    el("Ni", 28, 1.21, 0.69, 1.97),
    el("Cu", 29, 1.38, 0.73, 1.96),
    el("Zn", 30, 1.31, 0.74, 2.01),
    el("Ga", 31, 1.26, 0.62, 1.87),
    el("Ge", 32, 1.22, 0.53, 2.11),
    el("As", 33, 1.19, 0.58, 1.85),
    el("Se", 34, 1.16, 1.98, 1.90),
    el("Br", 35, 1.14, 1.96, 1.85),
    el("Kr", 36, 1.10, 0.00, 2.02),
    el("Rb", 37, 2.11, 1.52, 3.03),
    el("Sr", 38, 1.92, 1.18, 2.49),
    el("Y", 39, 1.62, 0.90, 2.40),
    el("Zr", 40, 1.48, 0.72, 2.30),
    el("Nb", 41, 1.37, 0.64, 2.15),
    el("Mo", 42, 1.45, 0.59, 2.10),
    el("Tc", 43, 1.56, 0.56, 2.05),
    el("Ru", 44, 1.26, 0.62, 2.05),
    el("Rh", 45, 1.35, 0.665, 2.00),
    el("Pd", 46, 1.31, 0.86, 2.05),
    el("Ag", 47, 1.53, 1.15, 2.03),
    el("Cd", 48, 1.48, 0.95, 2.18),
    el("In", 49, 1.44, 0.80, 1.93),
    el("Sn", 50, 1.41, 0.69, 2.17),
    el("Sb", 51, 1.38, 0.76, 2.06),
    el("Te", 52, 1.35, 2.21, 2.06),
    el("I", 53, 1.33, 2.20, 1.98),
    el("Xe", 54, 1.30, 0.00, 2.16),
    el("Cs", 55, 2.25, 1.67, 3.43),
    el("Ba", 56, 1.98, 1.35, 2.68),
    el("La", 57, 1.69, 1.03, 2.50),
    el("Ce", 58, 1.63, 1.01, 2.48),
    el("Pr", 59, 1.76, 0.99, 2.47),
    el("Nd", 60, 1.74, 0.98, 2.45),
    el("Pm", 61, 1.73, 0.97, 2.43),
    el("Sm", 62, 1.72, 0.96, 2.42),
    el("Eu", 63, 1.68, 1.09, 2.40),
    el("Gd", 64, 1.69, 0.94, 2.38),
    el("Tb", 65, 1.68, 0.92, 2.37),
    el("Dy", 66, 1.67, 0.91, 2.35),
    el("Ho", 67, 1.66, 0.90, 2.33),
    el("Er", 68, 1.65, 0.89, 2.32),
    el("Tm", 69, 1.64, 0.88, 2.30),
    el("Yb", 70, 1.63, 0.86, 2.28),
    el("Lu", 71, 1.62, 0.85, 2.27),
    el("Hf", 72, 1.52, 0.71, 2.25),
    el("Ta", 73, 1.46, 0.64, 2.20),
    el("W", 74, 1.37, 0.60, 2.10),
    el("Re", 75, 1.31, 0.63, 2.05),
    el("Os", 76, 1.29, 0.63, 2.00),
    el("Ir", 77, 1.22, 0.68, 2.00),
    el("Pt", 78, 1.23, 0.86, 2.05),
    el("Au", 79, 1.24, 1.37, 2.10),
    el("Hg", 80, 1.33, 1.02, 2.05),
    el("Tl", 81, 1.44, 1.50, 1.96),
    el("Pb", 82, 1.44, 1.19, 2.02),
    el("Bi", 83, 1.51, 1.03, 2.07),
    el("Po", 84, 1.45, 0.94, 1.97),
    el("At", 85, 1.47, 0.62, 2.02),
    el("Rn", 86, 1.42, 0.00, 2.20),
    el("Fr", 87, 2.60, 1.80, 3.48),
    el("Ra", 88, 2.21, 1.48, 2.83),
    el("Ac", 89, 2.15, 1.12, 2.00),
    el("Th", 90, 2.06, 1.05, 2.40),
    el("Pa", 91, 2.00, 0.99, 2.00),
    el("U", 92, 1.96, 1.00, 1.86),
    el("Np", 93, 1.90, 0.98, 2.00),
    el("Pu", 94, 1.87, 0.96, 2.00),
    el("Am", 95, 1.80, 0.95, 2.00),
    el("Cm", 96, 1.69, 0.94, 2.00),
    el("Bk", 97, 1.66, 0.93, 2.00),
    el("Cf", 98, 1.63, 0.92, 2.00),
    el("Es", 99, 1.62, 0.91, 2.00),
    el("Fm", 100, 1.61, 0.90, 2.00),
    el("Md", 101, 1.60, 0.89, 2.00),
    el("No", 102, 1.59, 0.88, 2.00),
    el("Lr", 103, 1.58, 0.87, 2.00),
];

static BY_SYMBOL: LazyLock<HashMap<&'static str, &'static ElementData>> =
    LazyLock::new(|| ELEMENTS.iter().map(|e| (e.symbol, e)).collect());

/// 把原子标签规范化为元素符号
///
/// `"Fe1"`, `"fe"`, `"Fe2+"` 都得到 `"Fe"`；标签不以字母开头时返回 `None`。
pub fn normalize_symbol(label: &str) -> Option<String> {
    let letters: Vec<char> = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    let first = letters.first()?;
    let mut symbol = first.to_ascii_uppercase().to_string();
    if let Some(second) = letters.get(1) {
        let candidate = format!("{}{}", symbol, second.to_ascii_lowercase());
        if BY_SYMBOL.contains_key(candidate.as_str()) || !BY_SYMBOL.contains_key(symbol.as_str()) {
            symbol = candidate;
        }
    }
    Some(symbol)
}

/// 按标签查找元素（先规范化）
pub fn lookup(label: &str) -> Option<&'static ElementData> {
    if let Some(data) = BY_SYMBOL.get(label) {
        return Some(data);
    }
    let symbol = normalize_symbol(label)?;
    BY_SYMBOL.get(symbol.as_str()).copied()
}
