//! 生命周期存储
//!
//! 三类实例缓存：单例、请求作用域、原型模板。请求作用域缓存按工作单元
//! 分区，每个 [`RequestScope`] 持有自己的缓存，互不共享。

use dashmap::DashMap;
use std::sync::{Arc, Weak};

use super::bound_method::Callable;
use super::resolver::Resolver;
use super::Container;
use crate::error::ContainerError;
use crate::instance::{Instance, Parameters};

/// 单个工作单元的实例缓存
pub(crate) struct RequestCache {
    id: uuid::Uuid,
    name: String,
    instances: DashMap<String, Instance>,
}

impl RequestCache {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name: name.into(),
            instances: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, abstract_id: &str) -> Option<Instance> {
        self.instances.get(abstract_id).map(|entry| entry.value().clone())
    }

    /// 先写入者胜出，返回缓存中的实例
    pub(crate) fn store(&self, abstract_id: &str, instance: Instance) -> Instance {
        self.instances
            .entry(abstract_id.to_string())
            .or_insert(instance)
            .value()
            .clone()
    }

    pub(crate) fn contains(&self, abstract_id: &str) -> bool {
        self.instances.contains_key(abstract_id)
    }

    pub(crate) fn forget(&self, abstract_id: &str) {
        self.instances.remove(abstract_id);
    }

    pub(crate) fn clear(&self) {
        self.instances.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }
}

pub(crate) struct LifecycleStore {
    singletons: DashMap<String, Instance>,
    templates: DashMap<String, Instance>,
    /// 容器默认的工作单元
    pub(crate) requests: Arc<RequestCache>,
    /// 仍然存活的独立工作单元，失效操作需要同步到它们
    scopes: DashMap<uuid::Uuid, Weak<RequestCache>>,
}

impl LifecycleStore {
    pub(crate) fn new() -> Self {
        Self {
            singletons: DashMap::new(),
            templates: DashMap::new(),
            requests: Arc::new(RequestCache::new("default")),
            scopes: DashMap::new(),
        }
    }

    pub(crate) fn track_scope(&self, cache: &Arc<RequestCache>) {
        self.scopes.insert(cache.id, Arc::downgrade(cache));
    }

    pub(crate) fn release_scope(&self, id: uuid::Uuid) {
        self.scopes.remove(&id);
    }

    pub(crate) fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    fn each_request_cache(&self, f: impl Fn(&RequestCache)) {
        f(&*self.requests);
        // 已经释放的作用域顺便清理掉
        self.scopes.retain(|_, cache| match cache.upgrade() {
            Some(cache) => {
                f(&*cache);
                true
            }
            None => false,
        });
    }

    /// 已缓存的共享实例：先单例，再当前工作单元
    pub(crate) fn shared(&self, abstract_id: &str, requests: &RequestCache) -> Option<Instance> {
        if let Some(entry) = self.singletons.get(abstract_id) {
            return Some(entry.value().clone());
        }
        requests.get(abstract_id)
    }

    pub(crate) fn singleton(&self, abstract_id: &str) -> Option<Instance> {
        self.singletons
            .get(abstract_id)
            .map(|entry| entry.value().clone())
    }

    pub(crate) fn has_singleton(&self, abstract_id: &str) -> bool {
        self.singletons.contains_key(abstract_id)
    }

    /// 先写入者胜出，返回缓存中的实例
    pub(crate) fn store_singleton(&self, abstract_id: &str, instance: Instance) -> Instance {
        self.singletons
            .entry(abstract_id.to_string())
            .or_insert(instance)
            .value()
            .clone()
    }

    pub(crate) fn replace_singleton(&self, abstract_id: &str, instance: Instance) {
        self.singletons.insert(abstract_id.to_string(), instance);
    }

    pub(crate) fn template(&self, abstract_id: &str) -> Option<Instance> {
        self.templates
            .get(abstract_id)
            .map(|entry| entry.value().clone())
    }

    pub(crate) fn store_template(&self, abstract_id: &str, template: Instance) {
        self.templates.insert(abstract_id.to_string(), template);
    }

    /// 重新绑定时清除该抽象的全部缓存，包括所有存活的工作单元
    pub(crate) fn forget(&self, abstract_id: &str) {
        self.singletons.remove(abstract_id);
        self.templates.remove(abstract_id);
        self.each_request_cache(|cache| cache.forget(abstract_id));
    }

    pub(crate) fn clear(&self) {
        self.singletons.clear();
        self.templates.clear();
        self.each_request_cache(RequestCache::clear);
    }

    pub(crate) fn singleton_count(&self) -> usize {
        self.singletons.len()
    }
}

/// 独立的工作单元
///
/// 在作用域内解析的请求作用域服务只在本作用域共享；作用域被丢弃时
/// 其缓存随之释放。单例仍然来自容器。
pub struct RequestScope {
    container: Container,
    cache: Arc<RequestCache>,
}

impl RequestScope {
    pub(crate) fn new(container: Container, name: impl Into<String>) -> Self {
        let cache = Arc::new(RequestCache::new(name));
        container.lifecycle.track_scope(&cache);
        tracing::debug!(scope_id = %cache.id, scope = %cache.name, "Request scope started");
        Self { container, cache }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.cache.id
    }

    pub fn name(&self) -> &str {
        &self.cache.name
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn make(&self, abstract_id: &str) -> Result<Instance, ContainerError> {
        self.make_with(abstract_id, Parameters::new())
    }

    pub fn make_with(&self, abstract_id: &str, parameters: Parameters) -> Result<Instance, ContainerError> {
        Resolver::new(&self.container, &self.cache).resolve(abstract_id, parameters, true)
    }

    pub fn make_as<T: std::any::Any + Send + Sync>(&self, abstract_id: &str) -> Result<Arc<T>, ContainerError> {
        self.make(abstract_id)?.downcast()
    }

    pub fn call(&self, callable: impl Into<Callable>, parameters: Parameters) -> Result<Instance, ContainerError> {
        Resolver::new(&self.container, &self.cache).call(callable, parameters, None)
    }

    /// 本作用域是否已缓存该抽象
    pub fn is_cached(&self, abstract_id: &str) -> bool {
        let abstract_id = self.container.get_alias(abstract_id);
        self.cache.contains(&abstract_id)
    }

    /// 清空本作用域的实例，作用域可以继续使用
    pub fn end(&self) {
        tracing::debug!(scope_id = %self.cache.id, instances = self.cache.len(), "Request scope cleared");
        self.cache.clear();
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.container.lifecycle.release_scope(self.cache.id);
        tracing::debug!(scope_id = %self.cache.id, scope = %self.cache.name, "Request scope ended");
    }
}
