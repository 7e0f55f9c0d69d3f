//! 递归解析引擎
//!
//! [`Resolver`] 是一次外层 `make`/`call` 的解析上下文：构建栈、参数覆盖栈和
//! 嵌套深度都只属于这一次调用，因此多个线程可以共享同一个容器并发解析。
//! 工厂闭包拿到的是 `&mut Resolver`，嵌套解析沿用同一组栈。

use std::sync::Arc;

use super::bound_method::{self, Callable};
use super::lifecycle::RequestCache;
use super::registry::{Factory, Implementation, SharingMode};
use super::Container;
use crate::config::PrototypeStrategy;
use crate::error::ContainerError;
use crate::instance::{Arguments, Instance, Parameters};
use crate::reflection::{ClassDescriptor, CloneFn, Constructor, Parameter};

pub struct Resolver<'c> {
    container: &'c Container,
    requests: &'c RequestCache,
    build_stack: Vec<String>,
    with: Vec<Parameters>,
    depth: usize,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(container: &'c Container, requests: &'c RequestCache) -> Self {
        Self {
            container,
            requests,
            build_stack: Vec::new(),
            with: Vec::new(),
            depth: 0,
        }
    }

    pub fn container(&self) -> &'c Container {
        self.container
    }

    /// 嵌套解析，触发回调
    pub fn make(&mut self, abstract_id: &str) -> Result<Instance, ContainerError> {
        self.resolve(abstract_id, Parameters::new(), true)
    }

    pub fn make_with(&mut self, abstract_id: &str, parameters: Parameters) -> Result<Instance, ContainerError> {
        self.resolve(abstract_id, parameters, true)
    }

    pub fn make_as<T: std::any::Any + Send + Sync>(&mut self, abstract_id: &str) -> Result<Arc<T>, ContainerError> {
        self.make(abstract_id)?.downcast()
    }

    /// 在当前解析上下文中调用可调用对象
    pub fn call(
        &mut self,
        callable: impl Into<Callable>,
        parameters: Parameters,
        default_method: Option<&str>,
    ) -> Result<Instance, ContainerError> {
        bound_method::call(self, callable.into(), parameters, default_method)
    }

    /// 正在构建的具体类型，从外到内
    pub fn build_stack(&self) -> &[String] {
        &self.build_stack
    }

    /// 最近一次推入的参数覆盖
    pub fn parameters(&self) -> Option<&Parameters> {
        self.with.last()
    }

    pub(crate) fn resolve(
        &mut self,
        abstract_id: &str,
        parameters: Parameters,
        raise_events: bool,
    ) -> Result<Instance, ContainerError> {
        let max_depth = self.container.config.max_resolution_depth;
        if self.depth >= max_depth {
            return Err(ContainerError::DepthExceeded {
                depth: max_depth,
                chain: self.build_stack.clone(),
            });
        }

        self.depth += 1;
        let result = self.resolve_inner(abstract_id, parameters, raise_events);
        self.depth -= 1;
        result
    }

    fn resolve_inner(
        &mut self,
        abstract_id: &str,
        parameters: Parameters,
        raise_events: bool,
    ) -> Result<Instance, ContainerError> {
        let abstract_id = self.container.get_alias(abstract_id);
        let stats = &self.container.stats;
        stats.record_resolution();

        let contextual = self.contextual_concrete(&abstract_id);
        // 带参数或命中上下文绑定的解析既不读也不写共享缓存
        let cacheable = parameters.is_empty() && contextual.is_none();

        if cacheable {
            if let Some(shared) = self.container.lifecycle.shared(&abstract_id, self.requests) {
                stats.record_hit();
                tracing::trace!(abstract_id = %abstract_id, "Shared instance cache hit");
                return Ok(shared);
            }
            if let Some(copy) = self.clone_template(&abstract_id)? {
                stats.record_hit();
                stats.record_clone();
                self.finish(&abstract_id, &copy, raise_events);
                return Ok(copy);
            }
        }
        stats.record_miss();

        self.with.push(parameters);
        let result = self.resolve_fresh(&abstract_id, contextual, cacheable, raise_events);
        self.with.pop();
        result
    }

    fn resolve_fresh(
        &mut self,
        abstract_id: &str,
        contextual: Option<Implementation>,
        cacheable: bool,
        raise_events: bool,
    ) -> Result<Instance, ContainerError> {
        let mut instance = match contextual {
            Some(Implementation::Value(value)) => value,
            Some(Implementation::Factory(factory)) => self.invoke_factory(&factory)?,
            Some(Implementation::Class(class)) if class == abstract_id => self.build(&class)?,
            Some(Implementation::Class(class)) => self.resolve(&class, Parameters::new(), true)?,
            None => match self.binding_factory(abstract_id) {
                Some(factory) => self.invoke_factory(&factory)?,
                None => self.build(abstract_id)?,
            },
        };

        let extenders = self.container.registry.read().extenders_for(abstract_id);
        for extender in extenders {
            instance = extender(instance, self.container)?;
        }

        if cacheable {
            instance = self.store(abstract_id, instance)?;
        }

        self.finish(abstract_id, &instance, raise_events);
        Ok(instance)
    }

    /// 直接按类型目录构建具体类型
    pub fn build(&mut self, concrete: &str) -> Result<Instance, ContainerError> {
        let class = self
            .container
            .catalog
            .lookup(concrete)
            .ok_or_else(|| ContainerError::NotFound(concrete.to_string()))?;

        let Some(constructor) = class.constructor().cloned() else {
            return Err(ContainerError::NotInstantiable {
                concrete: concrete.to_string(),
                chain: self.build_stack.clone(),
            });
        };

        if self.container.config.detect_cycles && self.build_stack.iter().any(|c| c == concrete) {
            let mut chain = self.build_stack.clone();
            chain.push(concrete.to_string());
            return Err(ContainerError::CircularDependency {
                concrete: concrete.to_string(),
                chain,
            });
        }

        self.build_stack.push(concrete.to_string());
        let result = self.construct(&class, &constructor);
        self.build_stack.pop();

        if result.is_ok() {
            self.container.stats.record_build();
            tracing::trace!(concrete = %concrete, "Built instance");
        }
        result
    }

    fn construct(&mut self, class: &ClassDescriptor, constructor: &Constructor) -> Result<Instance, ContainerError> {
        let had_frame = !self.with.is_empty();
        let mut overrides = self.with.pop().unwrap_or_default();
        let arguments = self.resolve_dependencies(class.name(), class.parameters(), &mut overrides, false);
        if had_frame {
            self.with.push(overrides);
        }
        constructor(&arguments?)
    }

    /// 逐个解析形参
    ///
    /// 顺序：按名称覆盖，按类型标识覆盖（仅 `call`），递归解析类型，
    /// 标量的 `$name` 上下文绑定，默认值。未被消费的覆盖追加在最后。
    pub(crate) fn resolve_dependencies(
        &mut self,
        owner: &str,
        parameters: &[Parameter],
        overrides: &mut Parameters,
        by_class_key: bool,
    ) -> Result<Arguments, ContainerError> {
        let mut arguments = Arguments::new(owner);

        for parameter in parameters {
            if let Some(value) = overrides.take(parameter.name()) {
                arguments.push(parameter.name(), value);
                continue;
            }

            let value = match parameter.class() {
                Some(class) => match by_class_key.then(|| overrides.take(class)).flatten() {
                    Some(value) => value,
                    None => self.resolve_class(owner, parameter, class)?,
                },
                None => self.resolve_primitive(owner, parameter)?,
            };
            arguments.push(parameter.name(), value);
        }

        arguments.extend_extras(overrides);
        Ok(arguments)
    }

    fn resolve_class(&mut self, owner: &str, parameter: &Parameter, class: &str) -> Result<Instance, ContainerError> {
        match self.resolve(class, Parameters::new(), true) {
            Ok(instance) => Ok(instance),
            Err(err) if err.is_resolution_failure() => {
                if let Some(default) = parameter.default_value() {
                    return Ok(default.clone());
                }
                // 形参类型本身无人认识，归为依赖无法解析
                match err {
                    ContainerError::NotFound(missing) if missing == self.container.get_alias(class) => {
                        Err(ContainerError::UnresolvableDependency {
                            parameter: parameter.name().to_string(),
                            class: owner.to_string(),
                        })
                    }
                    other => Err(other),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn resolve_primitive(&mut self, owner: &str, parameter: &Parameter) -> Result<Instance, ContainerError> {
        let key = format!("${}", parameter.name());
        if let Some(implementation) = self.contextual_concrete(&key) {
            return match implementation {
                Implementation::Value(value) => Ok(value),
                Implementation::Class(literal) => Ok(Instance::new(literal)),
                Implementation::Factory(factory) => factory(self, &Parameters::new()),
            };
        }

        if let Some(default) = parameter.default_value() {
            return Ok(default.clone());
        }

        Err(ContainerError::UnresolvableDependency {
            parameter: parameter.name().to_string(),
            class: owner.to_string(),
        })
    }

    /// 栈顶消费者的上下文绑定
    fn contextual_concrete(&self, abstract_id: &str) -> Option<Implementation> {
        let consumer = self.build_stack.last()?;
        self.container
            .registry
            .read()
            .contextual_concrete(consumer, abstract_id)
    }

    fn binding_factory(&self, abstract_id: &str) -> Option<Factory> {
        self.container
            .registry
            .read()
            .bindings
            .get(abstract_id)
            .map(|binding| binding.concrete.clone())
    }

    fn invoke_factory(&mut self, factory: &Factory) -> Result<Instance, ContainerError> {
        let frame = self.with.last().cloned().unwrap_or_default();
        factory(self, &frame)
    }

    fn store(&self, abstract_id: &str, instance: Instance) -> Result<Instance, ContainerError> {
        let lifecycle = &self.container.lifecycle;
        match self.container.sharing_mode(abstract_id) {
            Some(SharingMode::Singleton) => Ok(lifecycle.store_singleton(abstract_id, instance)),
            Some(SharingMode::RequestScoped) => Ok(self.requests.store(abstract_id, instance)),
            Some(SharingMode::Prototype) | None => {
                if self.container.config.prototype_strategy == PrototypeStrategy::CloneTemplate
                    && lifecycle.template(abstract_id).is_none()
                {
                    if let Some(clone) = self.clone_fn_for(&instance) {
                        lifecycle.store_template(abstract_id, clone(&instance)?);
                    }
                }
                Ok(instance)
            }
        }
    }

    fn clone_template(&self, abstract_id: &str) -> Result<Option<Instance>, ContainerError> {
        if self.container.config.prototype_strategy != PrototypeStrategy::CloneTemplate {
            return Ok(None);
        }
        let Some(template) = self.container.lifecycle.template(abstract_id) else {
            return Ok(None);
        };
        match self.clone_fn_for(&template) {
            Some(clone) => clone(&template).map(Some),
            None => Ok(None),
        }
    }

    fn clone_fn_for(&self, instance: &Instance) -> Option<CloneFn> {
        self.container
            .catalog
            .class_of(instance)
            .and_then(|class| class.clone_fn().cloned())
    }

    /// 触发回调并标记为已解析
    fn finish(&self, abstract_id: &str, instance: &Instance, raise_events: bool) {
        if raise_events {
            let callbacks = {
                let registry = self.container.registry.read();
                if registry.events.is_empty() {
                    Vec::new()
                } else {
                    registry
                        .events
                        .callbacks_for(abstract_id, instance, &self.container.catalog)
                }
            };
            for callback in callbacks {
                callback(instance, self.container);
            }
        }

        if !self.container.registry.read().resolved.contains(abstract_id) {
            self.container
                .registry
                .write()
                .resolved
                .insert(abstract_id.to_string());
        }
    }
}
