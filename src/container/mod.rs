//! 依赖注入容器
//!
//! 以字符串标识符注册服务，按类型目录递归构建依赖。支持三种共享模式、
//! 别名、上下文绑定、扩展器、解析回调以及带依赖注入的方法调用。
//!
//! ```ignore
//! let catalog = TypeCatalog::new();
//! catalog.interface("Logger");
//! catalog.define(ClassDescriptor::of::<FileLogger>("FileLogger").implements("Logger").construct_default());
//!
//! let container = Container::with_catalog(catalog);
//! container.singleton("Logger", "FileLogger")?;
//! let logger = container.make("Logger")?;
//! ```

mod bound_method;
mod contextual;
mod events;
mod lifecycle;
mod registry;
mod resolver;
mod stats;

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::ContainerConfig;
use crate::error::ContainerError;
use crate::instance::{Instance, Parameters};
use crate::reflection::TypeCatalog;

pub use bound_method::Callable;
pub use contextual::ContextualBindingBuilder;
pub use events::{Callback, ReboundCallback};
pub use lifecycle::RequestScope;
pub use registry::{Concrete, Extender, Factory, Implementation, MethodBinding, SharingMode};
pub use resolver::Resolver;
pub use stats::ContainerStats;

use lifecycle::LifecycleStore;
use registry::{Binding, Registry};
use stats::InnerStats;

/// 服务容器
///
/// 克隆得到的是同一个容器的句柄。
#[derive(Clone)]
pub struct Container {
    registry: Arc<RwLock<Registry>>,
    lifecycle: Arc<LifecycleStore>,
    catalog: Arc<TypeCatalog>,
    config: Arc<ContainerConfig>,
    stats: Arc<InnerStats>,
}

impl Container {
    /// 空类型目录、默认配置
    pub fn new() -> Self {
        Self::from_parts(TypeCatalog::new(), ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self::from_parts(TypeCatalog::new(), config)
    }

    pub fn with_catalog(catalog: TypeCatalog) -> Self {
        Self::from_parts(catalog, ContainerConfig::default())
    }

    pub fn from_parts(catalog: TypeCatalog, config: ContainerConfig) -> Self {
        tracing::debug!(?config, "Creating container");
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            lifecycle: Arc::new(LifecycleStore::new()),
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            stats: Arc::new(InnerStats::default()),
        }
    }

    /// 类型目录，可以在创建容器之后继续注册类型
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    // ---- 注册 ----

    /// 注册绑定
    ///
    /// 清除该抽象已缓存的实例和同名别名；如果它已经被解析过，
    /// 会触发 rebound 回调（回调需要的新实例解析失败时返回错误，但绑定仍然生效）。
    pub fn bind(
        &self,
        abstract_id: &str,
        concrete: impl Into<Concrete>,
        sharing: SharingMode,
    ) -> Result<(), ContainerError> {
        let factory = concrete.into().into_factory(abstract_id);

        let was_resolved = {
            let mut registry = self.registry.write();
            registry.remove_alias(abstract_id);
            registry.bindings.insert(
                abstract_id.to_string(),
                Binding {
                    concrete: factory,
                    sharing,
                },
            );
            registry.resolved.contains(abstract_id) || self.lifecycle.has_singleton(abstract_id)
        };
        self.lifecycle.forget(abstract_id);
        tracing::debug!(abstract_id = %abstract_id, ?sharing, "Binding registered");

        if was_resolved {
            self.rebound(abstract_id)?;
        }
        Ok(())
    }

    /// 只在尚未绑定时注册，返回是否注册了
    pub fn bind_if_absent(
        &self,
        abstract_id: &str,
        concrete: impl Into<Concrete>,
        sharing: SharingMode,
    ) -> Result<bool, ContainerError> {
        if self.bound(abstract_id) {
            return Ok(false);
        }
        self.bind(abstract_id, concrete, sharing)?;
        Ok(true)
    }

    pub fn singleton(&self, abstract_id: &str, concrete: impl Into<Concrete>) -> Result<(), ContainerError> {
        self.bind(abstract_id, concrete, SharingMode::Singleton)
    }

    pub fn request_scoped(&self, abstract_id: &str, concrete: impl Into<Concrete>) -> Result<(), ContainerError> {
        self.bind(abstract_id, concrete, SharingMode::RequestScoped)
    }

    /// 绑定到抽象自身（直接构建同名类型）
    pub fn bind_self(&self, abstract_id: &str, sharing: SharingMode) -> Result<(), ContainerError> {
        self.bind(abstract_id, Concrete::Itself, sharing)
    }

    /// 注册一个已有对象作为共享实例
    pub fn instance(&self, abstract_id: &str, instance: Instance) -> Result<(), ContainerError> {
        let was_bound = {
            let mut registry = self.registry.write();
            let was_bound = registry.bindings.contains_key(abstract_id)
                || registry.is_alias(abstract_id)
                || self.lifecycle.has_singleton(abstract_id);
            registry.remove_alias(abstract_id);
            was_bound
        };
        self.lifecycle.forget(abstract_id);
        self.lifecycle.replace_singleton(abstract_id, instance);
        tracing::debug!(abstract_id = %abstract_id, "Shared instance registered");

        if was_bound {
            self.rebound(abstract_id)?;
        }
        Ok(())
    }

    /// 注册别名，`alias` 解析时等同于 `abstract_id`
    pub fn alias(&self, abstract_id: &str, alias: &str) -> Result<(), ContainerError> {
        self.registry.write().alias(abstract_id, alias)?;
        tracing::debug!(alias = %alias, abstract_id = %abstract_id, "Alias registered");
        Ok(())
    }

    /// 开始为一个消费者定义上下文绑定
    pub fn when(&self, concrete: &str) -> ContextualBindingBuilder<'_> {
        self.when_any([concrete])
    }

    /// 为多个消费者定义同一条上下文绑定
    pub fn when_any<I, S>(&self, concretes: I) -> ContextualBindingBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let concretes = concretes
            .into_iter()
            .map(|concrete| self.get_alias(concrete.as_ref()))
            .collect();
        ContextualBindingBuilder::new(self, concretes)
    }

    pub fn add_contextual_binding(
        &self,
        concrete: &str,
        needs: &str,
        implementation: impl Into<Implementation>,
    ) {
        let concrete = self.get_alias(concrete);
        self.registry
            .write()
            .add_contextual(&concrete, needs, implementation.into());
    }

    /// 注册扩展器
    ///
    /// 已有共享实例时直接作用于该实例并触发 rebound 回调。
    pub fn extend<F>(&self, abstract_id: &str, extender: F) -> Result<(), ContainerError>
    where
        F: Fn(Instance, &Container) -> Result<Instance, ContainerError> + Send + Sync + 'static,
    {
        let abstract_id = self.get_alias(abstract_id);

        if let Some(existing) = self.lifecycle.singleton(&abstract_id) {
            let extended = extender(existing, self)?;
            self.lifecycle.replace_singleton(&abstract_id, extended);
            tracing::debug!(abstract_id = %abstract_id, "Extended existing shared instance");
            return self.rebound(&abstract_id);
        }

        let was_resolved = {
            let mut registry = self.registry.write();
            let extender: Extender = Arc::new(extender);
            registry
                .extenders
                .entry(abstract_id.clone())
                .or_default()
                .push(extender);
            registry.resolved.contains(&abstract_id)
        };
        self.lifecycle.forget(&abstract_id);

        if was_resolved {
            self.rebound(&abstract_id)?;
        }
        Ok(())
    }

    /// 抽象被重新绑定或扩展时的回调
    pub fn rebinding<F>(&self, abstract_id: &str, callback: F)
    where
        F: Fn(&Container, &Instance) + Send + Sync + 'static,
    {
        let abstract_id = self.get_alias(abstract_id);
        self.registry
            .write()
            .events
            .add_rebound(abstract_id, Arc::new(callback));
    }

    /// 按抽象或实现的能力触发的 resolving 回调
    pub fn resolving<F>(&self, abstract_id: &str, callback: F)
    where
        F: Fn(&Instance, &Container) + Send + Sync + 'static,
    {
        let target = self.get_alias(abstract_id);
        self.registry
            .write()
            .events
            .add_resolving(Some(target), Arc::new(callback));
    }

    /// 每次解析都触发的 resolving 回调
    pub fn resolving_any<F>(&self, callback: F)
    where
        F: Fn(&Instance, &Container) + Send + Sync + 'static,
    {
        self.registry
            .write()
            .events
            .add_resolving(None, Arc::new(callback));
    }

    pub fn after_resolving<F>(&self, abstract_id: &str, callback: F)
    where
        F: Fn(&Instance, &Container) + Send + Sync + 'static,
    {
        let target = self.get_alias(abstract_id);
        self.registry
            .write()
            .events
            .add_after_resolving(Some(target), Arc::new(callback));
    }

    pub fn after_resolving_any<F>(&self, callback: F)
    where
        F: Fn(&Instance, &Container) + Send + Sync + 'static,
    {
        self.registry
            .write()
            .events
            .add_after_resolving(None, Arc::new(callback));
    }

    /// 拦截 `"Type@method"` 的调用
    pub fn bind_method<F>(&self, method: &str, binding: F)
    where
        F: Fn(&Instance, &Container) -> Result<Instance, ContainerError> + Send + Sync + 'static,
    {
        self.registry
            .write()
            .method_bindings
            .insert(method.to_string(), Arc::new(binding));
    }

    pub fn has_method_binding(&self, method: &str) -> bool {
        self.registry.read().method_bindings.contains_key(method)
    }

    // ---- 查询 ----

    /// 是否注册过绑定、共享实例或别名
    pub fn bound(&self, abstract_id: &str) -> bool {
        let registry = self.registry.read();
        registry.bindings.contains_key(abstract_id)
            || registry.is_alias(abstract_id)
            || self.lifecycle.has_singleton(abstract_id)
    }

    pub fn has(&self, id: &str) -> bool {
        self.bound(id)
    }

    /// 容器访问器语义：从未绑定且解析失败时返回 `NotFound`，
    /// 否则原样返回解析错误
    pub fn get(&self, id: &str) -> Result<Instance, ContainerError> {
        match self.make(id) {
            Ok(instance) => Ok(instance),
            Err(_) if !self.has(id) => Err(ContainerError::NotFound(id.to_string())),
            Err(err) => Err(err),
        }
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.registry.read().is_alias(name)
    }

    /// 沿别名链找到最终标识符
    pub fn get_alias(&self, name: &str) -> String {
        self.registry.read().get_alias(name)
    }

    /// 是否已经解析过（或已有共享实例）
    pub fn resolved(&self, abstract_id: &str) -> bool {
        let abstract_id = self.get_alias(abstract_id);
        self.registry.read().resolved.contains(&abstract_id) || self.lifecycle.has_singleton(&abstract_id)
    }

    pub fn is_singleton(&self, abstract_id: &str) -> bool {
        let abstract_id = self.get_alias(abstract_id);
        self.lifecycle.has_singleton(&abstract_id)
            || self.sharing_mode(&abstract_id) == Some(SharingMode::Singleton)
    }

    pub fn is_request_scoped(&self, abstract_id: &str) -> bool {
        let abstract_id = self.get_alias(abstract_id);
        !self.lifecycle.has_singleton(&abstract_id)
            && self.sharing_mode(&abstract_id) == Some(SharingMode::RequestScoped)
    }

    /// 未声明共享模式的抽象默认是原型
    pub fn is_prototype(&self, abstract_id: &str) -> bool {
        !self.is_singleton(abstract_id) && !self.is_request_scoped(abstract_id)
    }

    pub(crate) fn sharing_mode(&self, abstract_id: &str) -> Option<SharingMode> {
        self.registry
            .read()
            .bindings
            .get(abstract_id)
            .map(|binding| binding.sharing)
    }

    // ---- 解析 ----

    pub fn make(&self, abstract_id: &str) -> Result<Instance, ContainerError> {
        self.make_with(abstract_id, Parameters::new())
    }

    /// 带参数覆盖的解析；带参数时不读写共享缓存
    pub fn make_with(&self, abstract_id: &str, parameters: Parameters) -> Result<Instance, ContainerError> {
        Resolver::new(self, &self.lifecycle.requests).resolve(abstract_id, parameters, true)
    }

    /// 解析并向下转型
    pub fn make_as<T: std::any::Any + Send + Sync>(&self, abstract_id: &str) -> Result<Arc<T>, ContainerError> {
        self.make(abstract_id)?.downcast()
    }

    pub fn call(&self, callable: impl Into<Callable>, parameters: Parameters) -> Result<Instance, ContainerError> {
        Resolver::new(self, &self.lifecycle.requests).call(callable, parameters, None)
    }

    /// 字符串形式未给出方法时使用 `default_method`
    pub fn call_with_default(
        &self,
        callable: impl Into<Callable>,
        parameters: Parameters,
        default_method: &str,
    ) -> Result<Instance, ContainerError> {
        Resolver::new(self, &self.lifecycle.requests).call(callable, parameters, Some(default_method))
    }

    // ---- 生命周期 ----

    /// 清空所有注册信息和缓存
    pub fn flush(&self) {
        *self.registry.write() = Registry::default();
        self.lifecycle.clear();
        tracing::debug!("Container flushed");
    }

    /// 结束容器默认工作单元，清空其请求作用域实例
    pub fn end_request(&self) {
        self.lifecycle.requests.clear();
        tracing::debug!("Default request scope cleared");
    }

    /// 创建独立的工作单元
    pub fn request_scope(&self, name: impl Into<String>) -> RequestScope {
        RequestScope::new(self.clone(), name)
    }

    pub fn stats(&self) -> ContainerStats {
        let registered = self.registry.read().bindings.len();
        self.stats
            .snapshot(registered, self.lifecycle.singleton_count())
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    fn rebound(&self, abstract_id: &str) -> Result<(), ContainerError> {
        let callbacks = self.registry.read().events.rebound_for(abstract_id);
        if callbacks.is_empty() {
            return Ok(());
        }

        let instance = self.make(abstract_id)?;
        tracing::debug!(abstract_id = %abstract_id, callbacks = callbacks.len(), "Firing rebound callbacks");
        for callback in callbacks {
            callback(self, &instance);
        }
        Ok(())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Container")
            .field("bindings", &registry.bindings.len())
            .field("aliases", &registry.aliases.len())
            .field("singletons", &self.lifecycle.singleton_count())
            .finish()
    }
}
