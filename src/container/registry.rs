//! 绑定注册表
//!
//! 只负责存储和查找：抽象到绑定记录、别名表、上下文绑定表、扩展器、
//! 方法绑定以及已解析标记。所有逻辑都在解析器里。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::events::Events;
use super::resolver::Resolver;
use super::Container;
use crate::error::ContainerError;
use crate::instance::{Instance, Parameters};

/// 工厂：`(解析器, 参数覆盖) -> 实例`
pub type Factory =
    Arc<dyn Fn(&mut Resolver<'_>, &Parameters) -> Result<Instance, ContainerError> + Send + Sync>;

/// 扩展器：对新构建的实例做后置变换
pub type Extender =
    Arc<dyn Fn(Instance, &Container) -> Result<Instance, ContainerError> + Send + Sync>;

/// 方法绑定：拦截 `Type@method` 调用
pub type MethodBinding =
    Arc<dyn Fn(&Instance, &Container) -> Result<Instance, ContainerError> + Send + Sync>;

/// 共享模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharingMode {
    /// 每次解析都得到独立实例
    #[default]
    Prototype,
    /// 进程生命周期内只构建一次
    Singleton,
    /// 每个请求（工作单元）构建一次
    RequestScoped,
}

/// 注册时提供的具体实现
#[derive(Clone)]
pub enum Concrete {
    /// 绑定到抽象自身，即直接构建同名类型
    Itself,
    /// 转发到另一个标识符
    Class(String),
    Factory(Factory),
}

impl Concrete {
    /// 从闭包创建工厂
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&mut Resolver<'_>, &Parameters) -> Result<Instance, ContainerError>
            + Send
            + Sync
            + 'static,
    {
        Concrete::Factory(Arc::new(factory))
    }

    /// 非工厂的具体实现统一包装为工厂：
    /// 与抽象同名时直接构建，否则转发解析且不触发事件。
    pub(crate) fn into_factory(self, abstract_id: &str) -> Factory {
        let class = match self {
            Concrete::Factory(factory) => return factory,
            Concrete::Itself => abstract_id.to_string(),
            Concrete::Class(class) => class,
        };

        let abstract_id = abstract_id.to_string();
        Arc::new(move |resolver: &mut Resolver<'_>, parameters: &Parameters| {
            if class == abstract_id {
                resolver.build(&class)
            } else {
                resolver.resolve(&class, parameters.clone(), false)
            }
        })
    }
}

impl From<&str> for Concrete {
    fn from(class: &str) -> Self {
        Concrete::Class(class.to_string())
    }
}

impl From<String> for Concrete {
    fn from(class: String) -> Self {
        Concrete::Class(class)
    }
}

/// 绑定记录
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) concrete: Factory,
    pub(crate) sharing: SharingMode,
}

/// 上下文绑定提供的实现
#[derive(Clone)]
pub enum Implementation {
    /// 解析另一个标识符；用于标量参数时按字面量给出这个名字
    Class(String),
    Factory(Factory),
    /// 字面值
    Value(Instance),
}

impl Implementation {
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn(&mut Resolver<'_>, &Parameters) -> Result<Instance, ContainerError>
            + Send
            + Sync
            + 'static,
    {
        Implementation::Factory(Arc::new(factory))
    }

    pub fn value<T: std::any::Any + Send + Sync>(value: T) -> Self {
        Implementation::Value(Instance::new(value))
    }
}

impl From<&str> for Implementation {
    fn from(class: &str) -> Self {
        Implementation::Class(class.to_string())
    }
}

impl From<String> for Implementation {
    fn from(class: String) -> Self {
        Implementation::Class(class)
    }
}

impl From<Instance> for Implementation {
    fn from(value: Instance) -> Self {
        Implementation::Value(value)
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) bindings: HashMap<String, Binding>,
    /// 别名 -> 目标
    pub(crate) aliases: HashMap<String, String>,
    /// 目标 -> 注册过的别名
    pub(crate) abstract_aliases: HashMap<String, Vec<String>>,
    /// 消费者 -> (需要的抽象 -> 实现)
    pub(crate) contextual: HashMap<String, HashMap<String, Implementation>>,
    pub(crate) extenders: HashMap<String, Vec<Extender>>,
    pub(crate) method_bindings: HashMap<String, MethodBinding>,
    pub(crate) resolved: HashSet<String>,
    pub(crate) events: Events,
}

impl Registry {
    /// 沿别名链找到最终标识符
    pub(crate) fn get_alias(&self, name: &str) -> String {
        let mut current = name;
        // 注册时已拒绝成环，步数上限只是兜底
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(current) {
                Some(target) => current = target.as_str(),
                None => break,
            }
        }
        current.to_string()
    }

    pub(crate) fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub(crate) fn alias(&mut self, abstract_id: &str, alias: &str) -> Result<(), ContainerError> {
        if alias == abstract_id {
            return Err(ContainerError::InvalidArgument(format!(
                "[{abstract_id}] is aliased to itself."
            )));
        }
        let mut current = abstract_id;
        loop {
            if current == alias {
                return Err(ContainerError::InvalidArgument(format!(
                    "Aliasing [{alias}] to [{abstract_id}] would create an alias cycle."
                )));
            }
            match self.aliases.get(current) {
                Some(next) => current = next.as_str(),
                None => break,
            }
        }

        self.aliases
            .insert(alias.to_string(), abstract_id.to_string());
        self.abstract_aliases
            .entry(abstract_id.to_string())
            .or_default()
            .push(alias.to_string());
        Ok(())
    }

    /// 删除以该名字为键的别名
    pub(crate) fn remove_alias(&mut self, alias: &str) {
        if let Some(target) = self.aliases.remove(alias) {
            if let Some(aliases) = self.abstract_aliases.get_mut(&target) {
                aliases.retain(|existing| existing != alias);
            }
        }
    }

    pub(crate) fn add_contextual(&mut self, consumer: &str, needs: &str, implementation: Implementation) {
        let needs = self.get_alias(needs);
        self.contextual
            .entry(consumer.to_string())
            .or_default()
            .insert(needs, implementation);
    }

    /// 当前消费者对某个抽象的上下文实现，也会查找指向该抽象的别名
    pub(crate) fn contextual_concrete(&self, consumer: &str, abstract_id: &str) -> Option<Implementation> {
        let overrides = self.contextual.get(consumer)?;
        if let Some(found) = overrides.get(abstract_id) {
            return Some(found.clone());
        }

        self.abstract_aliases
            .get(abstract_id)?
            .iter()
            .find_map(|alias| overrides.get(alias).cloned())
    }

    pub(crate) fn extenders_for(&self, abstract_id: &str) -> Vec<Extender> {
        self.extenders
            .get(&self.get_alias(abstract_id))
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_chain_collapses() {
        let mut registry = Registry::default();
        registry.alias("A", "B").unwrap();
        registry.alias("B", "C").unwrap();

        assert_eq!(registry.get_alias("C"), "A");
        assert_eq!(registry.get_alias("B"), "A");
        assert_eq!(registry.get_alias("A"), "A");
        assert!(registry.is_alias("C"));
        assert!(!registry.is_alias("A"));
    }

    #[test]
    fn test_alias_rejects_self_and_cycles() {
        let mut registry = Registry::default();
        assert!(matches!(
            registry.alias("A", "A"),
            Err(ContainerError::InvalidArgument(_))
        ));

        registry.alias("A", "B").unwrap();
        assert!(registry.alias("B", "A").is_err());
        assert_eq!(registry.get_alias("B"), "A");

        registry.remove_alias("B");
        assert_eq!(registry.get_alias("B"), "B");
        assert!(registry.abstract_aliases["A"].is_empty());
    }

    #[test]
    fn test_contextual_lookup_through_aliases() {
        let mut registry = Registry::default();
        registry.alias("Psr\\Log", "log").unwrap();
        registry.add_contextual("Mailer", "log", Implementation::from("NullLogger"));

        // needs() is stored under the canonical id
        assert!(matches!(
            registry.contextual_concrete("Mailer", "Psr\\Log"),
            Some(Implementation::Class(ref c)) if c == "NullLogger"
        ));
        assert!(registry.contextual_concrete("Queue", "Psr\\Log").is_none());
    }
}
