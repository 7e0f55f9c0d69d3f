//! 解析回调
//!
//! 两层回调：全局回调对每次解析触发；按类型注册的回调在抽象标识符相同，
//! 或实例满足该类型/能力时触发。先触发 resolving，再触发 after-resolving。

use std::collections::HashMap;
use std::sync::Arc;

use super::Container;
use crate::instance::Instance;
use crate::reflection::TypeCatalog;

/// 解析回调
pub type Callback = Arc<dyn Fn(&Instance, &Container) + Send + Sync>;

/// 重新绑定回调
pub type ReboundCallback = Arc<dyn Fn(&Container, &Instance) + Send + Sync>;

#[derive(Default, Clone)]
pub(crate) struct Events {
    global_resolving: Vec<Callback>,
    resolving: Vec<(String, Callback)>,
    global_after_resolving: Vec<Callback>,
    after_resolving: Vec<(String, Callback)>,
    rebound: HashMap<String, Vec<ReboundCallback>>,
}

impl Events {
    pub(crate) fn add_resolving(&mut self, target: Option<String>, callback: Callback) {
        match target {
            Some(target) => self.resolving.push((target, callback)),
            None => self.global_resolving.push(callback),
        }
    }

    pub(crate) fn add_after_resolving(&mut self, target: Option<String>, callback: Callback) {
        match target {
            Some(target) => self.after_resolving.push((target, callback)),
            None => self.global_after_resolving.push(callback),
        }
    }

    pub(crate) fn add_rebound(&mut self, abstract_id: String, callback: ReboundCallback) {
        self.rebound.entry(abstract_id).or_default().push(callback);
    }

    pub(crate) fn rebound_for(&self, abstract_id: &str) -> Vec<ReboundCallback> {
        self.rebound.get(abstract_id).cloned().unwrap_or_default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.global_resolving.is_empty()
            && self.resolving.is_empty()
            && self.global_after_resolving.is_empty()
            && self.after_resolving.is_empty()
    }

    /// 按触发顺序收集本次解析要执行的回调
    pub(crate) fn callbacks_for(
        &self,
        abstract_id: &str,
        instance: &Instance,
        catalog: &TypeCatalog,
    ) -> Vec<Callback> {
        let matches = |target: &str| target == abstract_id || catalog.satisfies(instance, target);

        let mut callbacks = self.global_resolving.clone();
        callbacks.extend(
            self.resolving
                .iter()
                .filter(|(target, _)| matches(target.as_str()))
                .map(|(_, callback)| callback.clone()),
        );
        callbacks.extend(self.global_after_resolving.iter().cloned());
        callbacks.extend(
            self.after_resolving
                .iter()
                .filter(|(target, _)| matches(target.as_str()))
                .map(|(_, callback)| callback.clone()),
        );
        callbacks
    }
}
