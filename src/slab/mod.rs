//! # 表面板层构建
//!
//! 由体相结构和 Miller 指数生成带真空层的表面模型（新结构，原结构不变）。
//!
//! ## 子模块
//! - `basis`: 面内原胞与面外矢量的整数搜索
//! - `builder`: 原子映射、层复制与去重
//!
//! ## 依赖关系
//! - 被 `commands/slab.rs` 与 `engine/` 使用
//! - 使用 `lattice/` 的坐标变换与最小镜像距离

pub mod basis;
pub mod builder;

pub use basis::{find_surface_basis, reduce_miller, SurfaceBasis};
pub use builder::{SlabBuilder, SlabModel, SlabSettings};
