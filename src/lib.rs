//! # Crystan - 晶体结构分析引擎
//!
//! 对周期性晶体结构做对称识别、粉末衍射模拟、空隙分析、表面板层切割、
//! 能带 k 路径生成、晶胞变换与键价和校验。库部分不做终端输出，命令行工具见 `main.rs`。
//!
//! ## 依赖关系
//! ```text
//! engine/       (后台作业调度、取消、对称缓存)
//!   ├── symmetry/  (空间群识别)
//!   ├── xrd/       (衍射模拟与导出)
//!   ├── voids/     (空隙网格与连通簇)
//!   ├── slab/      (表面基矢与板层)
//!   ├── kpath/     (标准化晶胞、特殊点、布里渊区)
//!   ├── cell/      (原胞、惯用胞与超胞)
//!   └── bond_valence/ (键价和)
//! lattice/      (晶胞几何内核)
//! models/       (数据模型与元素表)
//! parsers/      (POSCAR / JSON)
//! batch/        (目录批处理)
//! cli/ commands/ utils/  (命令行工具)
//! error.rs      (错误处理)
//! ```

pub mod batch;
pub mod bond_valence;
pub mod cell;
pub mod cli;
pub mod commands;
pub mod engine;
pub mod error;
pub mod kpath;
pub mod lattice;
pub mod models;
pub mod parsers;
pub mod slab;
pub mod symmetry;
pub mod utils;
pub mod voids;
pub mod xrd;

pub use engine::{AnalysisEngine, AnalysisRequest, AnalysisResult, CancelToken, JobHandle};
pub use error::{CrystanError, Result};
pub use models::{Atom, Crystal, Lattice};
