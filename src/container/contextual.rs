//! 上下文绑定构建器：`when(X).needs(Y).give(Z)`

use super::registry::{Factory, Implementation};
use super::resolver::Resolver;
use super::Container;
use crate::error::ContainerError;
use crate::instance::{Instance, Parameters};

pub struct ContextualBindingBuilder<'c> {
    container: &'c Container,
    concretes: Vec<String>,
    needs: Option<String>,
}

impl<'c> ContextualBindingBuilder<'c> {
    pub(crate) fn new(container: &'c Container, concretes: Vec<String>) -> Self {
        Self {
            container,
            concretes,
            needs: None,
        }
    }

    /// 需要替换的抽象，标量参数使用 `"$name"`
    pub fn needs(mut self, abstract_id: impl Into<String>) -> Self {
        self.needs = Some(abstract_id.into());
        self
    }

    /// 为所有消费者登记同一个实现
    pub fn give(self, implementation: impl Into<Implementation>) -> Result<(), ContainerError> {
        let needs = self.needs.ok_or_else(|| {
            ContainerError::InvalidArgument("Contextual binding requires needs() before give().".to_string())
        })?;
        let implementation = implementation.into();

        let mut registry = self.container.registry.write();
        for concrete in &self.concretes {
            registry.add_contextual(concrete, &needs, implementation.clone());
        }
        tracing::debug!(consumers = ?self.concretes, needs = %needs, "Contextual binding registered");
        Ok(())
    }

    pub fn give_factory<F>(self, factory: F) -> Result<(), ContainerError>
    where
        F: Fn(&mut Resolver<'_>, &Parameters) -> Result<Instance, ContainerError>
            + Send
            + Sync
            + 'static,
    {
        let factory: Factory = std::sync::Arc::new(factory);
        self.give(Implementation::Factory(factory))
    }

    pub fn give_value<T: std::any::Any + Send + Sync>(self, value: T) -> Result<(), ContainerError> {
        self.give(Implementation::value(value))
    }
}
