//! # 空隙分析
//!
//! 在晶胞网格上计算每点到最近原子表面的距离，统计探针可达的空隙率，
//! 并把连通的空隙点聚成簇，给出每个簇的中心与可容纳球半径。
//!
//! ## 子模块
//! - `probes`: 气体探针与插层离子目录、半径来源
//! - `cluster`: 周期网格上的并查集聚类
//! - `analyzer`: 网格采样与结果汇总
//!
//! ## 依赖关系
//! - 被 `commands/analyze/voids.rs` 与 `engine/` 使用
//! - 使用 `lattice::CellGeometry` 做最小镜像距离
//! - 使用 `models::elements` 的原子半径

pub mod analyzer;
pub mod cluster;
pub mod probes;

pub use analyzer::{LargestSphere, VoidAnalyzer, VoidCluster, VoidField, VoidSettings};
pub use cluster::Connectivity;
pub use probes::{find_probe, parse_probe, Probe, RadiusSet, CANDIDATE_IONS, GAS_PROBES};
