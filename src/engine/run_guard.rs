// ==========================================
// 船舶燃油核算系统 - 运行互斥守卫
// ==========================================
// 红线: 同一时刻只允许一个分摊/恢复运行
// 第二个调用立即失败 (Busy)，不排队、不交错修改批次余量
// ==========================================

use std::sync::atomic::{AtomicBool, Ordering};

/// 运行级互斥守卫（分摊引擎与对账服务共享）
#[derive(Debug, Default)]
pub struct RunGuard {
    running: AtomicBool,
}

/// 运行许可；离开作用域时释放守卫
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试获取运行许可；已有运行时返回 None
    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit { guard: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.running.store(false, Ordering::Release);
    }
}
