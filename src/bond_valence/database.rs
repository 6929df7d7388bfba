//! # 键价参数
//!
//! R₀ 取自 Brown & Altermatt (1985) 与 Brese & O'Keeffe (1991)，软度参数 B 统一取 0.37 Å。
//! 参数按元素对存储，查询与顺序无关；标签先规范化（"Fe3+" → "Fe"）。
//!
//! ## 依赖关系
//! - 被 `bond_valence/mod.rs` 调用
//! - 使用 `models::elements::normalize_symbol`

use crate::models::elements;

use std::collections::HashMap;
use std::sync::LazyLock;

/// 软度参数 B（Å）
pub const SOFTNESS: f64 = 0.37;

/// (阳离子, 阴离子, R₀ / Å)
const R0_TABLE: &[(&str, &str, f64)] = &[
    // 氧化物
    ("H", "O", 0.989), ("Li", "O", 1.466), ("Na", "O", 1.803),
    ("K", "O", 2.132), ("Rb", "O", 2.263), ("Cs", "O", 2.417),
    ("Be", "O", 1.381), ("Mg", "O", 1.693), ("Ca", "O", 1.967),
    ("Sr", "O", 2.118), ("Ba", "O", 2.285), ("Ra", "O", 2.420),
    ("Sc", "O", 1.849), ("Ti", "O", 1.815), ("V", "O", 1.743),
    ("Cr", "O", 1.724), ("Mn", "O", 1.790), ("Fe", "O", 1.759),
    ("Co", "O", 1.692), ("Ni", "O", 1.654), ("Cu", "O", 1.679),
    ("Zn", "O", 1.704), ("Y", "O", 2.019), ("Zr", "O", 1.937),
    ("Nb", "O", 1.911), ("Mo", "O", 1.907), ("Tc", "O", 1.859),
    ("Ru", "O", 1.834), ("Rh", "O", 1.812), ("Pd", "O", 1.792),
    ("Ag", "O", 1.842), ("Cd", "O", 1.904), ("La", "O", 2.172),
    ("Hf", "O", 1.923), ("Ta", "O", 1.920), ("W", "O", 1.921),
    ("Re", "O", 1.891), ("Os", "O", 1.856), ("Ir", "O", 1.847),
    ("Pt", "O", 1.837), ("Au", "O", 1.833), ("Hg", "O", 1.967),
    ("B", "O", 1.371), ("Al", "O", 1.651), ("Ga", "O", 1.730),
    ("In", "O", 1.902), ("Tl", "O", 2.042), ("C", "O", 1.394),
    ("Si", "O", 1.624), ("Ge", "O", 1.748), ("Sn", "O", 1.905),
    ("Pb", "O", 2.042), ("N", "O", 1.432), ("P", "O", 1.617),
    ("As", "O", 1.767), ("Sb", "O", 1.973), ("Bi", "O", 2.094),
    ("S", "O", 1.644), ("Se", "O", 1.811), ("Te", "O", 1.977),
    ("Cl", "O", 1.674), ("Br", "O", 1.849), ("I", "O", 2.019),
    // 卤化物
    ("Li", "F", 1.360), ("Na", "F", 1.677), ("K", "F", 1.992),
    ("Rb", "F", 2.150), ("Cs", "F", 2.304), ("Be", "F", 1.281),
    ("Mg", "F", 1.578), ("Ca", "F", 1.842), ("Sr", "F", 1.993),
    ("Ba", "F", 2.170), ("Al", "F", 1.545), ("Si", "F", 1.549),
    ("Li", "Cl", 1.949), ("Na", "Cl", 2.237), ("K", "Cl", 2.567),
    ("Rb", "Cl", 2.715), ("Cs", "Cl", 2.871), ("Mg", "Cl", 2.107),
    ("Ca", "Cl", 2.372), ("Sr", "Cl", 2.527), ("Ba", "Cl", 2.704),
    ("Li", "Br", 2.117), ("Na", "Br", 2.405), ("K", "Br", 2.735),
    ("Rb", "Br", 2.883), ("Cs", "Br", 3.039), ("Li", "I", 2.340),
    ("Na", "I", 2.628), ("K", "I", 2.958), ("Rb", "I", 3.106),
    ("Cs", "I", 3.262),
    // 稀土氧化物
    ("Ce", "O", 2.151), ("Pr", "O", 2.134), ("Nd", "O", 2.105),
    ("Pm", "O", 2.086), ("Sm", "O", 2.067), ("Eu", "O", 2.074),
    ("Gd", "O", 2.063), ("Tb", "O", 2.038), ("Dy", "O", 2.027),
    ("Ho", "O", 2.010), ("Er", "O", 1.997), ("Tm", "O", 1.981),
    ("Yb", "O", 1.985), ("Lu", "O", 1.971),
    // 硫化物
    ("Li", "S", 2.126), ("Na", "S", 2.398), ("K", "S", 2.778),
    ("Mg", "S", 2.321), ("Ca", "S", 2.597), ("Fe", "S", 2.321),
    ("Co", "S", 2.260), ("Ni", "S", 2.222), ("Cu", "S", 2.205),
    ("Zn", "S", 2.272),
    // 氮化物
    ("Li", "N", 1.756), ("Mg", "N", 1.988), ("Al", "N", 1.869),
    ("Si", "N", 1.879), ("Ti", "N", 2.041), ("Ga", "N", 1.976),
    // 磷化物
    ("Li", "P", 2.362), ("Na", "P", 2.649), ("Ca", "P", 2.826),
    ("Ga", "P", 2.265), ("In", "P", 2.541),
    // 锕系氧化物
    ("Th", "O", 2.167), ("U", "O", 2.051), ("Np", "O", 2.035),
    ("Pu", "O", 2.019),
];

/// 参与阴离子判定的元素
const ANIONS: &[&str] = &["O", "S", "Se", "Te", "F", "Cl", "Br", "I", "N"];

static BY_PAIR: LazyLock<HashMap<(&'static str, &'static str), f64>> = LazyLock::new(|| {
    R0_TABLE
        .iter()
        .flat_map(|&(cation, anion, r0)| [((cation, anion), r0), ((anion, cation), r0)])
        .collect()
});

fn symbol(label: &str) -> String {
    elements::normalize_symbol(label).unwrap_or_else(|| label.trim().to_string())
}

/// 元素对的 R₀，与顺序无关
pub fn r0(a: &str, b: &str) -> Option<f64> {
    let (a, b) = (symbol(a), symbol(b));
    BY_PAIR.get(&(a.as_str(), b.as_str())).copied()
}

pub fn is_anion(label: &str) -> bool {
    ANIONS.contains(&symbol(label).as_str())
}

/// 一方为阴离子、另一方不是；这类元素对缺少参数时需要提示
pub fn is_cation_anion_pair(a: &str, b: &str) -> bool {
    is_anion(a) != is_anion(b)
}

/// 离子晶体中最常见氧化态的绝对值，未收录的元素返回 `None`
pub fn expected_valence(label: &str) -> Option<f64> {
    let valence = match symbol(label).as_str() {
        "O" | "S" | "Se" | "Te" => 2.0,
        "F" | "Cl" | "Br" | "I" => 1.0,
        "N" | "P" | "As" => 3.0,
        "H" | "Li" | "Na" | "K" | "Rb" | "Cs" | "Fr" | "Ag" => 1.0,
        "Be" | "Mg" | "Ca" | "Sr" | "Ba" | "Ra" => 2.0,
        "B" | "Al" | "Ga" | "In" | "Tl" => 3.0,
        "C" | "Si" | "Ge" | "Sn" | "Pb" => 4.0,
        "Sc" | "Y" | "La" => 3.0,
        "Ti" | "Zr" | "Hf" => 4.0,
        "V" | "Nb" | "Ta" => 5.0,
        "Cr" | "Mo" | "W" => 6.0,
        "Fe" | "Au" => 3.0,
        "Mn" | "Co" | "Ni" | "Cu" | "Zn" | "Cd" | "Hg" => 2.0,
        "Ce" | "Pr" | "Nd" | "Pm" | "Sm" | "Eu" | "Gd" | "Tb" | "Dy" | "Ho" | "Er" | "Tm" | "Yb" | "Lu" => 3.0,
        "Th" | "Pa" | "U" | "Np" | "Pu" | "Am" | "Pt" => 4.0,
        _ => return None,
    };
    Some(valence)
}

/// 表中收录的元素对数（单向）
pub fn table_len() -> usize {
    R0_TABLE.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_symmetric() {
        assert_eq!(r0("Li", "O"), Some(1.466));
        assert_eq!(r0("O", "Li"), Some(1.466));
        assert_eq!(r0("Fe3+", "O2-"), Some(1.759));
        assert_eq!(r0("Na1", "Cl1"), Some(2.237));
        assert_eq!(r0("Eu", "N"), None);
        assert_eq!(r0("Na", "Na"), None);
    }

    #[test]
    fn test_pairs_are_unique() {
        let mut pairs: Vec<(&str, &str)> = R0_TABLE.iter().map(|&(a, b, _)| (a, b)).collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), table_len());
        assert!(table_len() > 120);
    }

    #[test]
    fn test_expected_valence() {
        assert_eq!(expected_valence("O"), Some(2.0));
        assert_eq!(expected_valence("Li+"), Some(1.0));
        assert_eq!(expected_valence("Fe"), Some(3.0));
        assert_eq!(expected_valence("Ar"), None);
    }

    #[test]
    fn test_cation_anion_pairs() {
        assert!(is_cation_anion_pair("Eu", "N"));
        assert!(is_cation_anion_pair("Cl", "Na"));
        assert!(!is_cation_anion_pair("Na", "K"));
        assert!(!is_cation_anion_pair("S", "O"));
    }
}
