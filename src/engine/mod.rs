//! # 分析引擎
//!
//! 持有当前活动结构，在后台线程执行各项分析并返回作业句柄。
//!
//! - `load` 替换结构：代数加一，取消所有进行中的作业，清空对称缓存
//! - `submit` 在独立线程运行分析；完成时若结构已被替换，结果作废并返回 `Cancelled`
//! - 对称分析结果按 (结构指纹, 容差) 缓存，k 路径与晶胞转换复用同一缓存
//!
//! ## 依赖关系
//! - 被 `commands/` 使用
//! - 使用 `symmetry/`, `xrd/`, `voids/`, `slab/`, `kpath/`, `cell/`, `bond_valence/`

pub mod cancel;

pub use cancel::CancelToken;

use crate::bond_valence::{BondValenceAnalyzer, BondValenceReport, BondValenceSettings};
use crate::cell::{CellModel, CellSettings, CellTransformer};
use crate::error::{CrystanError, Result};
use crate::kpath::{KPath, KPathGenerator};
use crate::models::Crystal;
use crate::slab::{SlabBuilder, SlabModel, SlabSettings};
use crate::symmetry::{SymmetryCache, SymmetryInfo, SymmetrySettings};
use crate::voids::{VoidAnalyzer, VoidField, VoidSettings};
use crate::xrd::{XrdCalculator, XrdPattern, XrdSettings};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

/// 分析请求
#[derive(Debug, Clone)]
pub enum AnalysisRequest {
    Symmetry(SymmetrySettings),
    Xrd(XrdSettings),
    Voids(VoidSettings),
    Slab(SlabSettings),
    KPath(SymmetrySettings),
    Cell(CellSettings),
    BondValence(BondValenceSettings),
}

impl AnalysisRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::Symmetry(_) => "symmetry",
            AnalysisRequest::Xrd(_) => "xrd",
            AnalysisRequest::Voids(_) => "voids",
            AnalysisRequest::Slab(_) => "slab",
            AnalysisRequest::KPath(_) => "kpath",
            AnalysisRequest::Cell(_) => "cell",
            AnalysisRequest::BondValence(_) => "bvs",
        }
    }
}

/// 分析结果
#[derive(Debug, Clone)]
pub enum AnalysisResult {
    Symmetry(Arc<SymmetryInfo>),
    Xrd(XrdPattern),
    Voids(VoidField),
    Slab(SlabModel),
    KPath(KPath),
    Cell(CellModel),
    BondValence(BondValenceReport),
}

#[derive(Debug, Default)]
struct EngineState {
    structure: RwLock<Option<Arc<Crystal>>>,
    generation: AtomicU64,
    next_job: AtomicU64,
    symmetry_cache: SymmetryCache,
    in_flight: Mutex<HashMap<u64, CancelToken>>,
}

impl EngineState {
    fn register(&self, id: u64, token: CancelToken) {
        if let Ok(mut jobs) = self.in_flight.lock() {
            jobs.insert(id, token);
        }
    }

    fn finish(&self, id: u64) {
        if let Ok(mut jobs) = self.in_flight.lock() {
            jobs.remove(&id);
        }
    }

    fn cancel_all(&self) {
        if let Ok(mut jobs) = self.in_flight.lock() {
            for token in jobs.values() {
                token.cancel();
            }
            jobs.clear();
        }
    }
}

/// 分析引擎，克隆体共享同一状态
#[derive(Debug, Clone, Default)]
pub struct AnalysisEngine {
    state: Arc<EngineState>,
    timeout: Option<Duration>,
}

impl AnalysisEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每个作业的超时
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// 替换活动结构；结构无效时保留原结构并返回错误
    pub fn load(&self, crystal: Crystal) -> Result<()> {
        crystal.validate()?;
        let name = crystal.name.clone();
        {
            let mut slot = self
                .state
                .structure
                .write()
                .map_err(|_| CrystanError::Other("structure lock poisoned".to_string()))?;
            // 代数、取消与缓存清空都在写锁内完成，submit 在读锁内登记作业
            *slot = Some(Arc::new(crystal));
            self.state.generation.fetch_add(1, Ordering::SeqCst);
            self.state.cancel_all();
            self.state.symmetry_cache.clear();
        }
        log::info!("loaded structure {} (generation {})", name, self.generation());
        Ok(())
    }

    pub fn current(&self) -> Option<Arc<Crystal>> {
        self.state.structure.read().ok()?.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::SeqCst)
    }

    pub fn symmetry_cache(&self) -> &SymmetryCache {
        &self.state.symmetry_cache
    }

    /// 在后台线程执行分析
    pub fn submit(&self, request: AnalysisRequest) -> Result<JobHandle> {
        let mut cancel = CancelToken::new();
        if let Some(timeout) = self.timeout {
            cancel = cancel.with_timeout(timeout);
        }
        let id = self.state.next_job.fetch_add(1, Ordering::SeqCst);

        let (crystal, generation) = {
            let slot = self
                .state
                .structure
                .read()
                .map_err(|_| CrystanError::Other("structure lock poisoned".to_string()))?;
            let crystal = slot.clone().ok_or_else(|| CrystanError::InvalidStructure {
                reason: "no structure loaded".to_string(),
            })?;
            self.state.register(id, cancel.clone());
            (crystal, self.generation())
        };

        let (sender, receiver) = mpsc::channel();
        let state = Arc::clone(&self.state);
        let token = cancel.clone();
        let kind = request.kind();
        log::debug!("job {} ({}) submitted for {}", id, kind, crystal.name);

        thread::Builder::new()
            .name(format!("crystan-{}", kind))
            .spawn(move || {
                let outcome = run(&state, &crystal, request, &token).and_then(|result| {
                    if state.generation.load(Ordering::SeqCst) != generation {
                        log::debug!("job {} discarded: structure replaced", id);
                        Err(CrystanError::Cancelled)
                    } else {
                        Ok(result)
                    }
                });
                state.finish(id);
                // 接收端已丢弃时结果无人关心
                let _ = sender.send(outcome);
            })
            .map_err(|e| CrystanError::Other(format!("failed to start worker thread: {}", e)))?;

        Ok(JobHandle {
            id,
            kind,
            generation,
            receiver,
            cancel,
        })
    }

    /// 提交并等待
    pub fn run(&self, request: AnalysisRequest) -> Result<AnalysisResult> {
        self.submit(request)?.wait()
    }
}

fn run(
    state: &EngineState,
    crystal: &Crystal,
    request: AnalysisRequest,
    cancel: &CancelToken,
) -> Result<AnalysisResult> {
    cancel.check()?;
    match request {
        AnalysisRequest::Symmetry(settings) => state
            .symmetry_cache
            .get_or_compute(crystal, &settings, cancel)
            .map(AnalysisResult::Symmetry),
        AnalysisRequest::Xrd(settings) => XrdCalculator::new(settings)
            .with_cancel(cancel.clone())
            .calculate(crystal)
            .map(AnalysisResult::Xrd),
        AnalysisRequest::Voids(settings) => VoidAnalyzer::new(settings)
            .with_cancel(cancel.clone())
            .analyze(crystal)
            .map(AnalysisResult::Voids),
        AnalysisRequest::Slab(settings) => SlabBuilder::new(settings)
            .with_cancel(cancel.clone())
            .build(crystal)
            .map(AnalysisResult::Slab),
        AnalysisRequest::KPath(settings) => {
            let info = state.symmetry_cache.get_or_compute(crystal, &settings, cancel)?;
            KPathGenerator::new(settings)
                .with_cancel(cancel.clone())
                .generate_from(&crystal.name, &info)
                .map(AnalysisResult::KPath)
        }
        AnalysisRequest::Cell(settings) => {
            settings.validate()?;
            let transformer = CellTransformer::new(settings.clone()).with_cancel(cancel.clone());
            let model = match settings.target {
                Some(_) => {
                    let info = state
                        .symmetry_cache
                        .get_or_compute(crystal, &settings.symmetry(), cancel)?;
                    transformer.transform_with(crystal, &info)?
                }
                None => transformer.transform(crystal)?,
            };
            Ok(AnalysisResult::Cell(model))
        }
        AnalysisRequest::BondValence(settings) => BondValenceAnalyzer::new(settings)
            .with_cancel(cancel.clone())
            .analyze(crystal)
            .map(AnalysisResult::BondValence),
    }
}

/// 后台作业句柄
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    kind: &'static str,
    generation: u64,
    receiver: Receiver<Result<AnalysisResult>>,
    cancel: CancelToken,
}

impl JobHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// 提交时结构的代数
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// 阻塞直到作业结束
    pub fn wait(self) -> Result<AnalysisResult> {
        self.receiver.recv().unwrap_or_else(|_| Err(worker_lost(self.kind)))
    }

    /// 最多等待 `timeout`，未完成返回 `None`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<AnalysisResult>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(worker_lost(self.kind))),
        }
    }

    /// 非阻塞查询
    pub fn try_result(&self) -> Option<Result<AnalysisResult>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(worker_lost(self.kind))),
        }
    }
}

fn worker_lost(kind: &str) -> CrystanError {
    CrystanError::Other(format!("{} worker terminated without a result", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Atom, Lattice};

    fn cubic_x(a: f64) -> Crystal {
        Crystal::new("X", Lattice::cubic(a), vec![Atom::new("X", [0.0, 0.0, 0.0])])
    }

    fn slow_voids() -> AnalysisRequest {
        AnalysisRequest::Voids(VoidSettings {
            grid_spacing: 0.1,
            ..VoidSettings::default()
        })
    }

    #[test]
    fn test_submit_without_structure() {
        let engine = AnalysisEngine::new();
        let err = engine
            .submit(AnalysisRequest::Symmetry(SymmetrySettings::default()))
            .unwrap_err();
        assert!(matches!(err, CrystanError::InvalidStructure { .. }));
    }

    #[test]
    fn test_symmetry_is_cached() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(4.0)).unwrap();
        let first = engine
            .run(AnalysisRequest::Symmetry(SymmetrySettings::default()))
            .unwrap();
        let AnalysisResult::Symmetry(first) = first else {
            panic!("expected symmetry result");
        };
        assert_eq!(first.space_group_number, 221);
        assert_eq!(engine.symmetry_cache().len(), 1);

        // k 路径复用缓存
        let path = engine
            .run(AnalysisRequest::KPath(SymmetrySettings::default()))
            .unwrap();
        assert!(matches!(path, AnalysisResult::KPath(_)));
        assert_eq!(engine.symmetry_cache().len(), 1);
    }

    #[test]
    fn test_cell_conversion_uses_cache() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(4.0)).unwrap();
        engine
            .run(AnalysisRequest::Symmetry(SymmetrySettings::default()))
            .unwrap();

        let settings = CellSettings::new(Some(crate::cell::CellType::Conventional), [2, 1, 1]);
        let AnalysisResult::Cell(model) = engine.run(AnalysisRequest::Cell(settings)).unwrap() else {
            panic!("expected cell result");
        };
        assert_eq!(model.structure.atoms.len(), 2);
        assert_eq!(model.space_group_number, Some(221));
        assert_eq!(engine.symmetry_cache().len(), 1);

        let bvs = engine
            .run(AnalysisRequest::BondValence(BondValenceSettings::default()))
            .unwrap();
        assert!(matches!(bvs, AnalysisResult::BondValence(_)));
    }

    #[test]
    fn test_load_replaces_and_clears() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(4.0)).unwrap();
        engine
            .run(AnalysisRequest::Symmetry(SymmetrySettings::default()))
            .unwrap();
        let before = engine.generation();

        engine.load(cubic_x(5.0)).unwrap();
        assert_eq!(engine.generation(), before + 1);
        assert!(engine.symmetry_cache().is_empty());
        assert_eq!(engine.current().unwrap().lattice.lengths()[0], 5.0);
    }

    #[test]
    fn test_invalid_load_keeps_previous() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(4.0)).unwrap();
        let flat = Crystal::new(
            "flat",
            Lattice::from_vectors([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]]),
            vec![],
        );
        assert!(engine.load(flat).is_err());
        assert_eq!(engine.current().unwrap().name, "X");
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn test_new_structure_cancels_in_flight() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(20.0)).unwrap();
        let job = engine.submit(slow_voids()).unwrap();
        engine.load(cubic_x(4.0)).unwrap();
        assert!(matches!(job.wait(), Err(CrystanError::Cancelled)));
    }

    #[test]
    fn test_job_on_current_structure_survives_concurrent_loads() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(4.0)).unwrap();

        let loader = {
            let engine = engine.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    engine.load(cubic_x(4.0 + (i % 3) as f64)).unwrap();
                }
            })
        };
        let mut jobs = Vec::new();
        for _ in 0..200 {
            jobs.push(engine.submit(AnalysisRequest::Symmetry(SymmetrySettings::default())).unwrap());
        }
        loader.join().unwrap();

        let last = engine.generation();
        for job in jobs {
            let submitted = job.generation();
            let result = job.wait();
            if submitted == last {
                // 没有更新的结构替换它，结果必须有效
                assert!(result.is_ok(), "job of the final generation was discarded");
            } else {
                assert!(matches!(result, Ok(_) | Err(CrystanError::Cancelled)));
            }
        }
    }

    #[test]
    fn test_explicit_cancel() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(20.0)).unwrap();
        let job = engine.submit(slow_voids()).unwrap();
        job.cancel();
        assert!(matches!(job.wait(), Err(CrystanError::Cancelled)));
    }

    #[test]
    fn test_zero_timeout() {
        let engine = AnalysisEngine::new().with_timeout(Some(Duration::ZERO));
        engine.load(cubic_x(4.0)).unwrap();
        let err = engine
            .run(AnalysisRequest::Xrd(XrdSettings::default()))
            .unwrap_err();
        assert!(matches!(err, CrystanError::ComputeTimeout { .. }));
    }

    #[test]
    fn test_wait_timeout_polling() {
        let engine = AnalysisEngine::new();
        engine.load(cubic_x(4.0)).unwrap();
        let job = engine
            .submit(AnalysisRequest::Slab(SlabSettings::new([1, 0, 0], 3, 10.0)))
            .unwrap();
        let result = loop {
            if let Some(result) = job.wait_timeout(Duration::from_millis(20)) {
                break result;
            }
        };
        let AnalysisResult::Slab(slab) = result.unwrap() else {
            panic!("expected slab result");
        };
        assert!((slab.structure.lattice.lengths()[2] - 22.0).abs() < 1e-9);
    }
}
