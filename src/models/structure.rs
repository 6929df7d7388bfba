//! # 晶体结构数据模型
//!
//! 定义统一的晶体结构表示。分析引擎只读取 `Crystal`，从不修改它；
//! 切片构建器生成新的 `Crystal`。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`lattice/` 以及所有分析模块使用
//! - 无外部模块依赖

use crate::error::{CrystanError, Result};

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// 判定晶格退化的体积阈值（Å³）
pub const MIN_CELL_VOLUME: f64 = 1e-8;

/// 晶格参数表示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    /// 晶格向量矩阵 (3x3)，行向量表示 a, b, c
    /// [[a1, a2, a3], [b1, b2, b3], [c1, c2, c3]]
    pub matrix: [[f64; 3]; 3],
}

impl Lattice {
    /// 从晶格参数 (a, b, c, alpha, beta, gamma) 创建晶格
    /// 角度单位：度
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        let cos_alpha = alpha.to_radians().cos();
        let cos_beta = beta.to_radians().cos();
        let cos_gamma = gamma.to_radians().cos();
        let sin_gamma = gamma.to_radians().sin();

        let a_vec = [a, 0.0, 0.0];
        let b_vec = [b * cos_gamma, b * sin_gamma, 0.0];

        let c1 = c * cos_beta;
        let c2 = c * (cos_alpha - cos_beta * cos_gamma) / sin_gamma;
        let c3 = (c * c - c1 * c1 - c2 * c2).max(0.0).sqrt();

        Lattice {
            matrix: [a_vec, b_vec, [c1, c2, c3]],
        }
    }

    /// 从晶格向量矩阵创建
    pub fn from_vectors(matrix: [[f64; 3]; 3]) -> Self {
        Lattice { matrix }
    }

    /// 立方晶格
    pub fn cubic(a: f64) -> Self {
        Lattice::from_vectors([[a, 0.0, 0.0], [0.0, a, 0.0], [0.0, 0.0, a]])
    }

    /// 晶格向量长度 (|a|, |b|, |c|)
    pub fn lengths(&self) -> [f64; 3] {
        let norm = |v: &[f64; 3]| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        [
            norm(&self.matrix[0]),
            norm(&self.matrix[1]),
            norm(&self.matrix[2]),
        ]
    }

    /// 获取晶格参数 (a, b, c, alpha, beta, gamma)
    pub fn parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let [a_vec, b_vec, c_vec] = self.matrix;
        let [a, b, c] = self.lengths();

        let dot = |x: &[f64; 3], y: &[f64; 3]| x[0] * y[0] + x[1] * y[1] + x[2] * y[2];

        let alpha = (dot(&b_vec, &c_vec) / (b * c)).clamp(-1.0, 1.0).acos().to_degrees();
        let beta = (dot(&a_vec, &c_vec) / (a * c)).clamp(-1.0, 1.0).acos().to_degrees();
        let gamma = (dot(&a_vec, &b_vec) / (a * b)).clamp(-1.0, 1.0).acos().to_degrees();

        (a, b, c, alpha, beta, gamma)
    }

    /// 计算晶格体积（带符号，右手系为正）
    pub fn volume(&self) -> f64 {
        let [a, b, c] = self.matrix;

        a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
            + a[2] * (b[0] * c[1] - b[1] * c[0])
    }

    /// 晶格是否退化（体积接近零或含非有限值）
    pub fn is_degenerate(&self) -> bool {
        let finite = self.matrix.iter().flatten().all(|x| x.is_finite());
        !finite || self.volume().abs() < MIN_CELL_VOLUME
    }
}

/// 原子信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 元素符号（物种标签）
    pub element: String,

    /// 分数坐标 [x, y, z]
    pub position: [f64; 3],

    /// 可选：原子标签（用于区分同种元素的不同位置）
    #[serde(default)]
    pub label: Option<String>,
}

impl Atom {
    pub fn new(element: impl Into<String>, position: [f64; 3]) -> Self {
        Atom {
            element: element.into(),
            position,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// 晶体结构
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crystal {
    /// 结构名称
    pub name: String,

    /// 晶格
    pub lattice: Lattice,

    /// 原子列表（分数坐标）
    pub atoms: Vec<Atom>,
}

impl Crystal {
    pub fn new(name: impl Into<String>, lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Crystal {
            name: name.into(),
            lattice,
            atoms,
        }
    }

    /// 校验结构：晶格非退化、坐标有限
    pub fn validate(&self) -> Result<()> {
        if self.lattice.is_degenerate() {
            return Err(CrystanError::DegenerateLattice {
                volume: self.lattice.volume(),
            });
        }
        if let Some(atom) = self
            .atoms
            .iter()
            .find(|a| a.position.iter().any(|x| !x.is_finite()))
        {
            return Err(CrystanError::InvalidStructure {
                reason: format!("atom '{}' has a non-finite coordinate", atom.element),
            });
        }
        Ok(())
    }

    /// 计算化学式
    pub fn formula(&self) -> String {
        use std::collections::BTreeMap;
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();

        for atom in &self.atoms {
            *counts.entry(atom.element.as_str()).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(el, count)| {
                if count == 1 {
                    el.to_string()
                } else {
                    format!("{}{}", el, count)
                }
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// 按首次出现顺序列出物种
    pub fn species(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for atom in &self.atoms {
            if !seen.contains(&atom.element.as_str()) {
                seen.push(atom.element.as_str());
            }
        }
        seen
    }

    /// 计算每原子体积
    pub fn volume_per_atom(&self) -> Option<f64> {
        if self.atoms.is_empty() {
            return None;
        }
        Some(self.lattice.volume().abs() / self.atoms.len() as f64)
    }

    /// 结构指纹：晶格与原子的稳定哈希，作为缓存键
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for x in self.lattice.matrix.iter().flatten() {
            x.to_bits().hash(&mut hasher);
        }
        self.atoms.len().hash(&mut hasher);
        for atom in &self.atoms {
            atom.element.hash(&mut hasher);
            for x in &atom.position {
                x.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}
