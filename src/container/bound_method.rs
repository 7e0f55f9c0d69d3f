//! 可调用对象的依赖注入调用
//!
//! 支持的形式：闭包（[`FunctionDescriptor`]）、`(实例, 方法名)`、
//! `"Type@method"`、`"Type::method"`（静态方法）、类型目录中注册的自由函数名，
//! 以及配合默认方法使用的裸类型名。

use std::sync::Arc;

use super::resolver::Resolver;
use crate::error::ContainerError;
use crate::instance::{Arguments, Instance, Parameters};
use crate::reflection::{FunctionDescriptor, MethodKind, Parameter};

const METHOD_DELIMITER: char = '@';
const STATIC_DELIMITER: &str = "::";

/// 可调用对象
#[derive(Clone)]
pub enum Callable {
    Closure(Arc<FunctionDescriptor>),
    /// 已有实例上的方法
    Method(Instance, String),
    /// 字符串形式，在调用时解析
    Target(String),
}

impl Callable {
    /// 带参数描述的匿名闭包
    pub fn closure<F, R>(parameters: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<R, ContainerError> + Send + Sync + 'static,
        R: std::any::Any + Send + Sync,
    {
        Callable::Closure(Arc::new(FunctionDescriptor::new("Closure", parameters, body)))
    }

    pub fn method(instance: Instance, method: impl Into<String>) -> Self {
        Callable::Method(instance, method.into())
    }
}

impl From<&str> for Callable {
    fn from(target: &str) -> Self {
        Callable::Target(target.to_string())
    }
}

impl From<String> for Callable {
    fn from(target: String) -> Self {
        Callable::Target(target)
    }
}

impl From<FunctionDescriptor> for Callable {
    fn from(function: FunctionDescriptor) -> Self {
        Callable::Closure(Arc::new(function))
    }
}

impl From<(Instance, &str)> for Callable {
    fn from((instance, method): (Instance, &str)) -> Self {
        Callable::Method(instance, method.to_string())
    }
}

pub(crate) fn call(
    resolver: &mut Resolver<'_>,
    callable: Callable,
    parameters: Parameters,
    default_method: Option<&str>,
) -> Result<Instance, ContainerError> {
    match callable {
        Callable::Closure(function) => call_function(resolver, &function, parameters),
        Callable::Method(instance, method) => call_method(resolver, instance, &method, parameters),
        Callable::Target(target) => call_target(resolver, &target, parameters, default_method),
    }
}

fn call_target(
    resolver: &mut Resolver<'_>,
    target: &str,
    parameters: Parameters,
    default_method: Option<&str>,
) -> Result<Instance, ContainerError> {
    if let Some((class, method)) = target.split_once(STATIC_DELIMITER) {
        return call_static(resolver, class, method, parameters);
    }

    let (class, method) = match target.split_once(METHOD_DELIMITER) {
        Some((class, method)) => (class, Some(method)),
        None => {
            if default_method.is_none() {
                if let Some(function) = resolver.container().catalog().lookup_function(target) {
                    return call_function(resolver, &function, parameters);
                }
            }
            (target, None)
        }
    };

    let method = method
        .filter(|method| !method.is_empty())
        .or(default_method)
        .filter(|method| !method.is_empty())
        .ok_or_else(|| ContainerError::InvalidArgument("Method not provided.".to_string()))?;

    let instance = resolver.make(class)?;
    call_method(resolver, instance, method, parameters)
}

fn call_method(
    resolver: &mut Resolver<'_>,
    instance: Instance,
    method: &str,
    mut parameters: Parameters,
) -> Result<Instance, ContainerError> {
    let container = resolver.container();
    let class_name = container.catalog().class_name_of(&instance);
    let key = format!("{class_name}{METHOD_DELIMITER}{method}");

    let binding = container.registry.read().method_bindings.get(&key).cloned();
    if let Some(binding) = binding {
        tracing::trace!(method = %key, "Calling bound method");
        return binding(&instance, container);
    }

    let descriptor = container
        .catalog()
        .class_of(&instance)
        .and_then(|class| class.method(method))
        .ok_or_else(|| ContainerError::InvalidArgument(format!("Method [{key}] does not exist.")))?;

    let arguments = resolver.resolve_dependencies(&key, descriptor.parameters(), &mut parameters, true)?;
    match descriptor.kind() {
        MethodKind::Instance(body) => body(&instance, &arguments),
        MethodKind::Static(body) => body(&arguments),
    }
}

fn call_static(
    resolver: &mut Resolver<'_>,
    class: &str,
    method: &str,
    mut parameters: Parameters,
) -> Result<Instance, ContainerError> {
    let key = format!("{class}{STATIC_DELIMITER}{method}");
    let descriptor = resolver
        .container()
        .catalog()
        .lookup(class)
        .ok_or_else(|| ContainerError::NotFound(class.to_string()))?
        .method(method)
        .ok_or_else(|| ContainerError::InvalidArgument(format!("Method [{key}] does not exist.")))?;

    let MethodKind::Static(body) = descriptor.kind() else {
        return Err(ContainerError::InvalidArgument(format!(
            "Method [{key}] is not static."
        )));
    };

    let arguments = resolver.resolve_dependencies(&key, descriptor.parameters(), &mut parameters, true)?;
    body(&arguments)
}

fn call_function(
    resolver: &mut Resolver<'_>,
    function: &FunctionDescriptor,
    mut parameters: Parameters,
) -> Result<Instance, ContainerError> {
    let arguments =
        resolver.resolve_dependencies(function.name(), function.parameters(), &mut parameters, true)?;
    function.invoke(&arguments)
}
