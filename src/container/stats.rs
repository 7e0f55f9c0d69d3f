//! 容器统计信息

use std::sync::atomic::{AtomicU64, Ordering};

/// 内部容器统计信息（原子计数器）
#[derive(Default)]
pub(crate) struct InnerStats {
    total_resolutions: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    builds: AtomicU64,
    prototype_clones: AtomicU64,
}

impl InnerStats {
    pub(crate) fn record_resolution(&self) {
        self.total_resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_build(&self) {
        self.builds.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_clone(&self) {
        self.prototype_clones.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.total_resolutions.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.builds.store(0, Ordering::Relaxed);
        self.prototype_clones.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, registered_bindings: usize, active_singletons: usize) -> ContainerStats {
        ContainerStats {
            total_resolutions: self.total_resolutions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            prototype_clones: self.prototype_clones.load(Ordering::Relaxed),
            registered_bindings,
            active_singletons,
        }
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerStats {
    /// 总解析次数（包括嵌套解析）
    pub total_resolutions: u64,
    /// 共享实例或原型模板命中次数
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// 通过类型目录构建的次数
    pub builds: u64,
    pub prototype_clones: u64,
    pub registered_bindings: usize,
    pub active_singletons: usize,
}

impl ContainerStats {
    /// 缓存命中率（小数形式）
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// 获取性能指标摘要
    pub fn performance_summary(&self) -> String {
        format!(
            "Container Performance: {} total resolutions, {:.1}% cache hit rate, {} builds, {} registered bindings, {} active singletons",
            self.total_resolutions,
            self.hit_rate() * 100.0,
            self.builds,
            self.registered_bindings,
            self.active_singletons
        )
    }
}
