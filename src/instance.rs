//! 类型擦除的实例句柄与参数表
//!
//! 容器以字符串标识符索引服务，解析结果统一用 [`Instance`] 表示；
//! 调用方通过 [`Parameters`] 传入按名称覆盖的参数，构造函数和可调用对象
//! 则从 [`Arguments`] 中取出已解析的实参。

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::error::ContainerError;

/// 类型擦除的共享实例
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl Instance {
    /// 包装一个值
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// 包装一个已经共享的值，不会产生新的分配
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// 存储值的类型ID
    pub fn value_type_id(&self) -> TypeId {
        self.type_id
    }

    /// 存储值的类型名称（用于错误信息）
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// 向下转型为共享引用
    pub fn downcast<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ContainerError> {
        self.value
            .clone()
            .downcast::<T>()
            .map_err(|_| self.mismatch::<T>())
    }

    /// 向下转型并克隆出值，适合 `Arc<dyn Trait>`、字符串、数字等
    pub fn cloned<T: Any + Send + Sync + Clone>(&self) -> Result<T, ContainerError> {
        self.value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| self.mismatch::<T>())
    }

    /// 是否为同一个对象
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.value) as *const (),
            Arc::as_ptr(&other.value) as *const (),
        )
    }

    fn mismatch<T: Any>(&self) -> ContainerError {
        ContainerError::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: self.type_name.to_string(),
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}

/// 调用方提供的参数覆盖表，保持插入顺序
#[derive(Clone, Default, Debug)]
pub struct Parameters {
    entries: Vec<(String, Instance)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式添加一个值
    pub fn with<T: Any + Send + Sync>(self, name: impl Into<String>, value: T) -> Self {
        self.with_instance(name, Instance::new(value))
    }

    /// 链式添加一个已经包装好的实例
    pub fn with_instance(mut self, name: impl Into<String>, value: Instance) -> Self {
        self.insert(name, value);
        self
    }

    /// 插入或替换同名条目
    pub fn insert(&mut self, name: impl Into<String>, value: Instance) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(key, _)| key == name)
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    /// 取出并移除同名条目
    pub fn take(&mut self, name: &str) -> Option<Instance> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }
}

/// 解析完成的实参列表
///
/// 前半部分按声明顺序对应形参，其后追加调用方传入但未被任何形参消费的条目。
#[derive(Clone, Debug)]
pub struct Arguments {
    owner: String,
    entries: Vec<(String, Instance)>,
    declared: usize,
}

impl Arguments {
    pub(crate) fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            entries: Vec::new(),
            declared: 0,
        }
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: Instance) {
        self.entries.push((name.into(), value));
        self.declared += 1;
    }

    pub(crate) fn extend_extras(&mut self, extras: &Parameters) {
        for (name, value) in extras.iter() {
            self.entries.push((name.to_string(), value.clone()));
        }
    }

    /// 所属的类或可调用对象
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// 按形参名称取出实例
    pub fn instance(&self, name: &str) -> Result<&Instance, ContainerError> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                ContainerError::InvalidArgument(format!(
                    "Argument [{name}] was not resolved for {}",
                    self.owner
                ))
            })
    }

    /// 按形参名称取出共享引用
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ContainerError> {
        self.instance(name)?.downcast()
    }

    /// 按形参名称取出克隆值
    pub fn value<T: Any + Send + Sync + Clone>(&self, name: &str) -> Result<T, ContainerError> {
        self.instance(name)?.cloned()
    }

    /// 按位置取出实例（包括追加的额外条目）
    pub fn at(&self, index: usize) -> Option<&Instance> {
        self.entries.get(index).map(|(_, value)| value)
    }

    /// 未被形参消费、原样追加的调用方条目
    pub fn extras(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.entries[self.declared..]
            .iter()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
