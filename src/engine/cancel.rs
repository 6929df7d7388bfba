//! # 协作式取消与超时
//!
//! 长时间运行的循环（对称操作搜索、倒格点枚举、空隙网格扫描）在每个外层
//! 迭代调用 `check()`，收到取消或越过截止时间后立即返回错误。

use crate::error::{CrystanError, Result};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 可克隆的取消信号，克隆体共享同一标志
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置绝对截止时间
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// 从现在起计时的超时
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// 已取消返回 `Cancelled`，已超时返回 `ComputeTimeout`
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CrystanError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(CrystanError::ComputeTimeout {
                    reason: "deadline exceeded".to_string(),
                });
            }
        }
        Ok(())
    }
}
