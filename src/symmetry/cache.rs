//! # 对称分析结果缓存
//!
//! 以 (结构指纹, 容差) 为键保存 `SymmetryInfo`。切换活动结构时由引擎清空。
//!
//! ## 依赖关系
//! - 被 `engine/` 使用
//! - 使用 `models::Crystal::fingerprint`

use super::{SymmetryAnalyzer, SymmetryInfo, SymmetrySettings};
use crate::engine::CancelToken;
use crate::error::Result;
use crate::models::Crystal;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type CacheKey = (u64, u64);

#[derive(Debug, Default)]
pub struct SymmetryCache {
    entries: Mutex<HashMap<CacheKey, Arc<SymmetryInfo>>>,
}

impl SymmetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(crystal: &Crystal, settings: &SymmetrySettings) -> CacheKey {
        (crystal.fingerprint(), settings.tolerance.to_bits())
    }

    pub fn get(&self, crystal: &Crystal, settings: &SymmetrySettings) -> Option<Arc<SymmetryInfo>> {
        let entries = self.entries.lock().ok()?;
        entries.get(&Self::key(crystal, settings)).cloned()
    }

    /// 命中则直接返回，否则计算并写入
    ///
    /// 计算期间不持有锁；两个线程同时未命中时各自计算，后写入者覆盖。
    pub fn get_or_compute(
        &self,
        crystal: &Crystal,
        settings: &SymmetrySettings,
        cancel: &CancelToken,
    ) -> Result<Arc<SymmetryInfo>> {
        if let Some(hit) = self.get(crystal, settings) {
            log::debug!("symmetry cache hit for {}", crystal.name);
            return Ok(hit);
        }

        let info = Arc::new(
            SymmetryAnalyzer::new(*settings)
                .with_cancel(cancel.clone())
                .analyze(crystal)?,
        );
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(Self::key(crystal, settings), Arc::clone(&info));
        }
        Ok(info)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    #[test]
    fn test_cache_hit_returns_same_result() {
        let crystal = Crystal::new("X", Lattice::cubic(4.0), vec![Atom::new("X", [0.0; 3])]);
        let cache = SymmetryCache::new();
        let settings = SymmetrySettings::default();
        let token = CancelToken::new();

        let first = cache.get_or_compute(&crystal, &settings, &token).unwrap();
        let second = cache.get_or_compute(&crystal, &settings, &token).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        // 不同容差是不同的键
        let loose = SymmetrySettings::with_tolerance(1e-2);
        cache.get_or_compute(&crystal, &loose, &token).unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
