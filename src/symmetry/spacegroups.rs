//! # 230 个空间群的静态表
//!
//! 以国际表标准设置的 Hermann-Mauguin 短符号存储，螺旋轴写作 `4_2`。
//! 单斜取 b 唯一轴，三方 R 格子取六方轴。
//!
//! 由符号可直接推导：带心字母、点群（去掉螺旋下标、滑移面记为 m）、
//! 是否为点式群，以及逐位置的对称元素记号。

use super::{Centering, CrystalSystem};

use regex::Regex;
use std::sync::LazyLock;

/// 空间群表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceGroupEntry {
    pub number: u16,
    pub symbol: &'static str,
}

macro_rules! sg {
    ($($n:literal => $s:literal),* $(,)?) => {
        [$(SpaceGroupEntry { number: $n, symbol: $s }),*]
    };
}

pub static SPACE_GROUPS: [SpaceGroupEntry; 230] = sg![
    1 => "P1", 2 => "P-1",
    3 => "P2", 4 => "P2_1", 5 => "C2", 6 => "Pm", 7 => "Pc", 8 => "Cm", 9 => "Cc",
    10 => "P2/m", 11 => "P2_1/m", 12 => "C2/m", 13 => "P2/c", 14 => "P2_1/c", 15 => "C2/c",
    16 => "P222", 17 => "P222_1", 18 => "P2_12_12", 19 => "P2_12_12_1", 20 => "C222_1",
    21 => "C222", 22 => "F222", 23 => "I222", 24 => "I2_12_12_1",
    25 => "Pmm2", 26 => "Pmc2_1", 27 => "Pcc2", 28 => "Pma2", 29 => "Pca2_1", 30 => "Pnc2",
    31 => "Pmn2_1", 32 => "Pba2", 33 => "Pna2_1", 34 => "Pnn2", 35 => "Cmm2", 36 => "Cmc2_1",
    37 => "Ccc2", 38 => "Amm2", 39 => "Aem2", 40 => "Ama2", 41 => "Aea2", 42 => "Fmm2",
    43 => "Fdd2", 44 => "Imm2", 45 => "Iba2", 46 => "Ima2",
    47 => "Pmmm", 48 => "Pnnn", 49 => "Pccm", 50 => "Pban", 51 => "Pmma", 52 => "Pnna",
    53 => "Pmna", 54 => "Pcca", 55 => "Pbam", 56 => "Pccn", 57 => "Pbcm", 58 => "Pnnm",
    59 => "Pmmn", 60 => "Pbcn", 61 => "Pbca", 62 => "Pnma", 63 => "Cmcm", 64 => "Cmce",
    65 => "Cmmm", 66 => "Cccm", 67 => "Cmme", 68 => "Ccce", 69 => "Fmmm", 70 => "Fddd",
    71 => "Immm", 72 => "Ibam", 73 => "Ibca", 74 => "Imma",
    75 => "P4", 76 => "P4_1", 77 => "P4_2", 78 => "P4_3", 79 => "I4", 80 => "I4_1",
    81 => "P-4", 82 => "I-4", 83 => "P4/m", 84 => "P4_2/m", 85 => "P4/n", 86 => "P4_2/n",
    87 => "I4/m", 88 => "I4_1/a",
    89 => "P422", 90 => "P42_12", 91 => "P4_122", 92 => "P4_12_12", 93 => "P4_222",
    94 => "P4_22_12", 95 => "P4_322", 96 => "P4_32_12", 97 => "I422", 98 => "I4_122",
    99 => "P4mm", 100 => "P4bm", 101 => "P4_2cm", 102 => "P4_2nm", 103 => "P4cc", 104 => "P4nc",
    105 => "P4_2mc", 106 => "P4_2bc", 107 => "I4mm", 108 => "I4cm", 109 => "I4_1md", 110 => "I4_1cd",
    111 => "P-42m", 112 => "P-42c", 113 => "P-42_1m", 114 => "P-42_1c", 115 => "P-4m2",
    116 => "P-4c2", 117 => "P-4b2", 118 => "P-4n2", 119 => "I-4m2", 120 => "I-4c2",
    121 => "I-42m", 122 => "I-42d",
    123 => "P4/mmm", 124 => "P4/mcc", 125 => "P4/nbm", 126 => "P4/nnc", 127 => "P4/mbm",
    128 => "P4/mnc", 129 => "P4/nmm", 130 => "P4/ncc", 131 => "P4_2/mmc", 132 => "P4_2/mcm",
    133 => "P4_2/nbc", 134 => "P4_2/nnm", 135 => "P4_2/mbc", 136 => "P4_2/mnm", 137 => "P4_2/nmc",
    138 => "P4_2/ncm", 139 => "I4/mmm", 140 => "I4/mcm", 141 => "I4_1/amd", 142 => "I4_1/acd",
    143 => "P3", 144 => "P3_1", 145 => "P3_2", 146 => "R3", 147 => "P-3", 148 => "R-3",
    149 => "P312", 150 => "P321", 151 => "P3_112", 152 => "P3_121", 153 => "P3_212",
    154 => "P3_221", 155 => "R32", 156 => "P3m1", 157 => "P31m", 158 => "P3c1", 159 => "P31c",
    160 => "R3m", 161 => "R3c", 162 => "P-31m", 163 => "P-31c", 164 => "P-3m1", 165 => "P-3c1",
    166 => "R-3m", 167 => "R-3c",
    168 => "P6", 169 => "P6_1", 170 => "P6_5", 171 => "P6_2", 172 => "P6_4", 173 => "P6_3",
    174 => "P-6", 175 => "P6/m", 176 => "P6_3/m", 177 => "P622", 178 => "P6_122",
    179 => "P6_522", 180 => "P6_222", 181 => "P6_422", 182 => "P6_322", 183 => "P6mm",
    184 => "P6cc", 185 => "P6_3cm", 186 => "P6_3mc", 187 => "P-6m2", 188 => "P-6c2",
    189 => "P-62m", 190 => "P-62c", 191 => "P6/mmm", 192 => "P6/mcc", 193 => "P6_3/mcm",
    194 => "P6_3/mmc",
    195 => "P23", 196 => "F23", 197 => "I23", 198 => "P2_13", 199 => "I2_13", 200 => "Pm-3",
    201 => "Pn-3", 202 => "Fm-3", 203 => "Fd-3", 204 => "Im-3", 205 => "Pa-3", 206 => "Ia-3",
    207 => "P432", 208 => "P4_232", 209 => "F432", 210 => "F4_132", 211 => "I432",
    212 => "P4_332", 213 => "P4_132", 214 => "I4_132", 215 => "P-43m", 216 => "F-43m",
    217 => "I-43m", 218 => "P-43n", 219 => "F-43c", 220 => "I-43d", 221 => "Pm-3m",
    222 => "Pn-3n", 223 => "Pm-3n", 224 => "Pn-3m", 225 => "Fm-3m", 226 => "Fm-3c",
    227 => "Fd-3m", 228 => "Fd-3c", 229 => "Im-3m", 230 => "Ia-3d",
];

static SCREW_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_\d").unwrap());

const GLIDE_LETTERS: &[char] = &['a', 'b', 'c', 'n', 'd', 'e'];

/// 符号中一个位置上的对称元素
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolToken {
    /// 旋转阶数（负数为旋转反演），0 表示该位置只有反映面
    pub rotation: i8,
    /// 螺旋下标
    pub screw: u8,
    /// 反映面或滑移面字母
    pub plane: Option<char>,
}

impl SpaceGroupEntry {
    pub fn centering(&self) -> Centering {
        self.symbol
            .chars()
            .next()
            .and_then(Centering::from_letter)
            .unwrap_or(Centering::P)
    }

    pub fn crystal_system(&self) -> CrystalSystem {
        CrystalSystem::from_space_group(self.number)
    }

    /// 带取向的点群符号，如 `-4m2`、`31m`
    pub fn oriented_point_group(&self) -> String {
        let body = &self.symbol[1..];
        SCREW_SUFFIX
            .replace_all(body, "")
            .chars()
            .map(|c| if GLIDE_LETTERS.contains(&c) { 'm' } else { c })
            .collect()
    }

    /// 点群符号（去掉取向）
    pub fn point_group(&self) -> &'static str {
        plain_point_group(&self.oriented_point_group())
    }

    /// 不含螺旋轴与滑移面即为点式空间群
    pub fn is_symmorphic(&self) -> bool {
        let body = &self.symbol[1..];
        !body.contains('_') && !body.chars().any(|c| GLIDE_LETTERS.contains(&c))
    }

    /// 按位置拆分符号
    pub fn tokens(&self) -> Vec<SymbolToken> {
        let chars: Vec<char> = self.symbol.chars().skip(1).collect();
        let mut tokens = Vec::new();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            if c == '-' || c.is_ascii_digit() {
                let negative = c == '-';
                if negative {
                    i += 1;
                }
                let order = chars.get(i).and_then(|d| d.to_digit(10)).unwrap_or(1) as i8;
                i += 1;
                let mut screw = 0;
                if chars.get(i) == Some(&'_') {
                    screw = chars.get(i + 1).and_then(|d| d.to_digit(10)).unwrap_or(0) as u8;
                    i += 2;
                }
                let mut plane = None;
                if chars.get(i) == Some(&'/') {
                    plane = chars.get(i + 1).copied();
                    i += 2;
                }
                tokens.push(SymbolToken {
                    rotation: if negative { -order } else { order },
                    screw,
                    plane,
                });
            } else {
                tokens.push(SymbolToken {
                    rotation: 0,
                    screw: 0,
                    plane: Some(c),
                });
                i += 1;
            }
        }
        tokens
    }
}

/// 去掉取向信息的点群符号
pub fn plain_point_group(oriented: &str) -> &'static str {
    match oriented {
        "1" => "1",
        "-1" => "-1",
        "2" => "2",
        "m" => "m",
        "2/m" => "2/m",
        "222" => "222",
        "mm2" => "mm2",
        "mmm" => "mmm",
        "4" => "4",
        "-4" => "-4",
        "4/m" => "4/m",
        "422" => "422",
        "4mm" => "4mm",
        "-42m" | "-4m2" => "-42m",
        "4/mmm" => "4/mmm",
        "3" => "3",
        "-3" => "-3",
        "32" | "321" | "312" => "32",
        "3m" | "3m1" | "31m" => "3m",
        "-3m" | "-3m1" | "-31m" => "-3m",
        "6" => "6",
        "-6" => "-6",
        "6/m" => "6/m",
        "622" => "622",
        "6mm" => "6mm",
        "-6m2" | "-62m" => "-6m2",
        "6/mmm" => "6/mmm",
        "23" => "23",
        "m-3" => "m-3",
        "432" => "432",
        "-43m" => "-43m",
        _ => "m-3m",
    }
}

/// 按编号查表
pub fn by_number(number: u16) -> Option<&'static SpaceGroupEntry> {
    SPACE_GROUPS.get(usize::from(number).checked_sub(1)?)
}

/// 按 Hermann-Mauguin 符号查表（忽略空格）
pub fn by_symbol(symbol: &str) -> Option<&'static SpaceGroupEntry> {
    let compact: String = symbol.chars().filter(|c| !c.is_whitespace()).collect();
    SPACE_GROUPS.iter().find(|e| e.symbol == compact)
}

/// 同一带心类型与取向点群下的全部候选
pub fn candidates(centering: Centering, oriented: &str) -> Vec<&'static SpaceGroupEntry> {
    SPACE_GROUPS
        .iter()
        .filter(|e| e.centering() == centering && e.oriented_point_group() == oriented)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_complete_and_ordered() {
        for (i, entry) in SPACE_GROUPS.iter().enumerate() {
            assert_eq!(entry.number as usize, i + 1);
        }
        assert_eq!(by_number(221).unwrap().symbol, "Pm-3m");
        assert!(by_number(0).is_none());
        assert!(by_number(231).is_none());
    }

    #[test]
    fn test_point_group_derivation() {
        assert_eq!(by_number(136).unwrap().point_group(), "4/mmm");
        assert_eq!(by_number(62).unwrap().point_group(), "mmm");
        assert_eq!(by_number(113).unwrap().oriented_point_group(), "-42m");
        assert_eq!(by_number(115).unwrap().oriented_point_group(), "-4m2");
        assert_eq!(by_number(152).unwrap().oriented_point_group(), "321");
        assert_eq!(by_number(230).unwrap().point_group(), "m-3m");
        assert_eq!(by_number(14).unwrap().point_group(), "2/m");
    }

    #[test]
    fn test_every_point_group_has_consistent_system() {
        for entry in SPACE_GROUPS.iter() {
            let pg = entry.point_group();
            let system = entry.crystal_system();
            let expected = match pg {
                "1" | "-1" => CrystalSystem::Triclinic,
                "2" | "m" | "2/m" => CrystalSystem::Monoclinic,
                "222" | "mm2" | "mmm" => CrystalSystem::Orthorhombic,
                "4" | "-4" | "4/m" | "422" | "4mm" | "-42m" | "4/mmm" => CrystalSystem::Tetragonal,
                "3" | "-3" | "32" | "3m" | "-3m" => CrystalSystem::Trigonal,
                "6" | "-6" | "6/m" | "622" | "6mm" | "-6m2" | "6/mmm" => CrystalSystem::Hexagonal,
                _ => CrystalSystem::Cubic,
            };
            assert_eq!(system, expected, "{}", entry.symbol);
        }
    }

    #[test]
    fn test_symmorphic_count() {
        let count = SPACE_GROUPS.iter().filter(|e| e.is_symmorphic()).count();
        assert_eq!(count, 73);
    }

    #[test]
    fn test_tokens() {
        let t = by_symbol("P4_2/mnm").unwrap().tokens();
        assert_eq!(t.len(), 3);
        assert_eq!((t[0].rotation, t[0].screw, t[0].plane), (4, 2, Some('m')));
        assert_eq!(t[1].plane, Some('n'));

        let t = by_symbol("P-42_1c").unwrap().tokens();
        assert_eq!(t[0].rotation, -4);
        assert_eq!((t[1].rotation, t[1].screw), (2, 1));
        assert_eq!(t[2].plane, Some('c'));

        let t = by_symbol("P2_12_12_1").unwrap().tokens();
        assert!(t.iter().all(|x| x.rotation == 2 && x.screw == 1));
    }

    #[test]
    fn test_candidates_by_centering() {
        let c = candidates(Centering::F, "m-3m");
        let numbers: Vec<u16> = c.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![225, 226, 227, 228]);
    }
}
