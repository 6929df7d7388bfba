//! # 衍射模拟
//!
//! 由结构计算粉末 X 射线衍射图样。
//!
//! ## 子模块
//! - `scattering`: Cromer–Mann 原子散射因子
//! - `calculator`: 倒格点枚举、结构因子、LP 校正与峰合并
//! - `broadening`: Gaussian / Lorentzian / Pseudo-Voigt 峰形
//! - `plot`: 图表生成
//! - `export`: 数据导出
//!
//! ## 依赖关系
//! - 被 `commands/analyze/xrd.rs` 与 `engine/` 使用
//! - 使用 `models/structure.rs` 与 `lattice/`

pub mod broadening;
pub mod calculator;
pub mod export;
pub mod plot;
pub mod scattering;

pub use broadening::{broaden, BroadeningSettings, Profile};
pub use calculator::{Peak, XrdCalculator, XrdPattern, XrdSettings};
pub use plot::PlotOptions;
