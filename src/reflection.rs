//! 反射能力：显式注册的类型目录
//!
//! Rust 没有运行时反射，这里用注册时提供的描述符代替：每个可构建类型声明
//! 自己的构造参数（名称、可选的类型标识、可选的默认值）和构造闭包，
//! 接口类型显式声明为不可实例化。容器只通过 [`TypeCatalog`] 查询这些信息。

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::ContainerError;
use crate::instance::{Arguments, Instance};

/// 构造闭包
pub type Constructor = Arc<dyn Fn(&Arguments) -> Result<Instance, ContainerError> + Send + Sync>;
/// 深拷贝闭包，用于原型模板
pub type CloneFn = Arc<dyn Fn(&Instance) -> Result<Instance, ContainerError> + Send + Sync>;
/// 实例方法体
pub type MethodFn =
    Arc<dyn Fn(&Instance, &Arguments) -> Result<Instance, ContainerError> + Send + Sync>;
/// 自由函数、静态方法或闭包体
pub type FunctionFn = Arc<dyn Fn(&Arguments) -> Result<Instance, ContainerError> + Send + Sync>;

/// 形参描述符
#[derive(Clone, Debug)]
pub struct Parameter {
    name: String,
    class: Option<String>,
    default: Option<Instance>,
}

impl Parameter {
    /// 带类型标识的参数，由容器递归解析
    pub fn typed(name: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: Some(class.into()),
            default: None,
        }
    }

    /// 无类型（标量）参数，只能通过覆盖、上下文绑定或默认值获得
    pub fn primitive(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: None,
            default: None,
        }
    }

    pub fn with_default<T: Any + Send + Sync>(self, value: T) -> Self {
        self.with_default_instance(Instance::new(value))
    }

    pub fn with_default_instance(mut self, value: Instance) -> Self {
        self.default = Some(value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }

    /// 有默认值即为可选
    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

/// 方法体：实例方法需要接收者，静态方法不需要
#[derive(Clone)]
pub enum MethodKind {
    Instance(MethodFn),
    Static(FunctionFn),
}

/// 方法描述符
#[derive(Clone)]
pub struct MethodDescriptor {
    name: String,
    parameters: Vec<Parameter>,
    kind: MethodKind,
}

impl MethodDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn kind(&self) -> &MethodKind {
        &self.kind
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind, MethodKind::Static(_))
    }
}

/// 自由函数或闭包描述符
#[derive(Clone)]
pub struct FunctionDescriptor {
    name: String,
    parameters: Vec<Parameter>,
    body: FunctionFn,
}

impl FunctionDescriptor {
    pub fn new<F, R>(name: impl Into<String>, parameters: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&Arguments) -> Result<R, ContainerError> + Send + Sync + 'static,
        R: Any + Send + Sync,
    {
        Self {
            name: name.into(),
            parameters,
            body: Arc::new(move |args: &Arguments| body(args).map(Instance::new)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn invoke(&self, arguments: &Arguments) -> Result<Instance, ContainerError> {
        (self.body)(arguments)
    }
}

/// 类描述符
#[derive(Clone)]
pub struct ClassDescriptor {
    name: String,
    type_id: Option<TypeId>,
    parameters: Vec<Parameter>,
    constructor: Option<Constructor>,
    implements: Vec<String>,
    clone: Option<CloneFn>,
    methods: HashMap<String, Arc<MethodDescriptor>>,
}

impl ClassDescriptor {
    /// 接口或抽象类型：可以作为回调匹配目标，但不能被构建
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
            parameters: Vec::new(),
            constructor: None,
            implements: Vec::new(),
            clone: None,
            methods: HashMap::new(),
        }
    }

    /// 开始描述一个具体类型
    pub fn of<T: Any + Send + Sync>(name: impl Into<String>) -> ClassBuilder<T> {
        let mut descriptor = Self::interface(name);
        descriptor.type_id = Some(TypeId::of::<T>());
        ClassBuilder {
            descriptor,
            _marker: PhantomData,
        }
    }

    /// 接口继承的父接口
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.implements.push(parent.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn constructor(&self) -> Option<&Constructor> {
        self.constructor.as_ref()
    }

    pub fn is_instantiable(&self) -> bool {
        self.constructor.is_some()
    }

    pub fn implements(&self) -> &[String] {
        &self.implements
    }

    pub fn clone_fn(&self) -> Option<&CloneFn> {
        self.clone.as_ref()
    }

    pub fn method(&self, name: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods.get(name).cloned()
    }
}

/// 带类型信息的类描述构建器
pub struct ClassBuilder<T> {
    descriptor: ClassDescriptor,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
    /// 追加一个构造参数（按声明顺序）
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.descriptor.parameters.push(parameter);
        self
    }

    /// 声明实现的接口或能力
    pub fn implements(mut self, capability: impl Into<String>) -> Self {
        self.descriptor.implements.push(capability.into());
        self
    }

    /// 构造闭包；未提供时该类型不可实例化
    pub fn construct<F>(mut self, constructor: F) -> Self
    where
        F: Fn(&Arguments) -> Result<T, ContainerError> + Send + Sync + 'static,
    {
        self.descriptor.constructor =
            Some(Arc::new(move |args: &Arguments| constructor(args).map(Instance::new)));
        self
    }

    /// 无构造函数的类型：直接使用默认值
    pub fn construct_default(self) -> Self
    where
        T: Default,
    {
        self.construct(|_| Ok(T::default()))
    }

    /// 声明 `Clone` 是深拷贝，允许原型模板克隆
    pub fn cloneable(mut self) -> Self
    where
        T: Clone,
    {
        self.descriptor.clone = Some(Arc::new(|instance: &Instance| {
            Ok(Instance::new(instance.cloned::<T>()?))
        }));
        self
    }

    /// 实例方法
    pub fn method<F, R>(self, name: impl Into<String>, parameters: Vec<Parameter>, body: F) -> Self
    where
        F: Fn(&T, &Arguments) -> Result<R, ContainerError> + Send + Sync + 'static,
        R: Any + Send + Sync,
    {
        let name = name.into();
        let kind = MethodKind::Instance(Arc::new(move |this: &Instance, args: &Arguments| {
            let receiver = this.downcast::<T>()?;
            body(&receiver, args).map(Instance::new)
        }));
        self.add_method(name, parameters, kind)
    }

    /// 静态方法
    pub fn static_method<F, R>(
        self,
        name: impl Into<String>,
        parameters: Vec<Parameter>,
        body: F,
    ) -> Self
    where
        F: Fn(&Arguments) -> Result<R, ContainerError> + Send + Sync + 'static,
        R: Any + Send + Sync,
    {
        let name = name.into();
        let kind = MethodKind::Static(Arc::new(move |args: &Arguments| body(args).map(Instance::new)));
        self.add_method(name, parameters, kind)
    }

    fn add_method(mut self, name: String, parameters: Vec<Parameter>, kind: MethodKind) -> Self {
        let method = MethodDescriptor {
            name: name.clone(),
            parameters,
            kind,
        };
        self.descriptor.methods.insert(name, Arc::new(method));
        self
    }

    pub fn build(self) -> ClassDescriptor {
        self.descriptor
    }
}

impl<T: Any + Send + Sync> From<ClassBuilder<T>> for ClassDescriptor {
    fn from(builder: ClassBuilder<T>) -> Self {
        builder.build()
    }
}

/// 由类型自身提供描述信息
pub trait Injectable: Any + Send + Sync + Sized {
    /// 在容器中的类名
    fn class_name() -> &'static str;

    /// 构造参数，按声明顺序
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    /// 实现的接口或能力
    fn implements() -> Vec<&'static str> {
        Vec::new()
    }

    fn construct(arguments: &Arguments) -> Result<Self, ContainerError>;
}

#[derive(Default)]
struct CatalogInner {
    classes: HashMap<String, Arc<ClassDescriptor>>,
    by_type: HashMap<TypeId, String>,
    functions: HashMap<String, Arc<FunctionDescriptor>>,
}

/// 类型目录
#[derive(Default)]
pub struct TypeCatalog {
    inner: RwLock<CatalogInner>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册（或替换）一个类描述
    pub fn define(&self, class: impl Into<ClassDescriptor>) {
        let class = class.into();
        let mut inner = self.inner.write();
        if let Some(type_id) = class.type_id {
            inner.by_type.insert(type_id, class.name.clone());
        }
        tracing::trace!(class = %class.name, instantiable = class.is_instantiable(), "Class defined");
        inner.classes.insert(class.name.clone(), Arc::new(class));
    }

    /// 声明一个接口
    pub fn interface(&self, name: impl Into<String>) {
        self.define(ClassDescriptor::interface(name));
    }

    /// 注册实现了 [`Injectable`] 的类型
    pub fn register<T: Injectable>(&self) {
        let mut builder = ClassDescriptor::of::<T>(T::class_name()).construct(T::construct);
        for parameter in T::parameters() {
            builder = builder.param(parameter);
        }
        for capability in T::implements() {
            builder = builder.implements(capability);
        }
        self.define(builder);
    }

    /// 注册自由函数
    pub fn function(&self, function: FunctionDescriptor) {
        let mut inner = self.inner.write();
        inner
            .functions
            .insert(function.name.clone(), Arc::new(function));
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.inner.read().classes.get(name).cloned()
    }

    pub fn lookup_function(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.inner.read().functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().classes.contains_key(name)
    }

    /// 实例所属的类
    pub fn class_of(&self, instance: &Instance) -> Option<Arc<ClassDescriptor>> {
        let inner = self.inner.read();
        let name = inner.by_type.get(&instance.value_type_id())?;
        inner.classes.get(name).cloned()
    }

    /// 实例的类名，未注册时退回 Rust 类型名
    pub fn class_name_of(&self, instance: &Instance) -> String {
        self.class_of(instance)
            .map(|class| class.name.clone())
            .unwrap_or_else(|| instance.type_name().to_string())
    }

    /// 实例是否满足给定的类型或能力（沿 `implements` 传递）
    pub fn satisfies(&self, instance: &Instance, capability: &str) -> bool {
        let Some(class) = self.class_of(instance) else {
            return instance.type_name() == capability;
        };

        let mut pending = vec![class.name.clone()];
        let mut visited = HashSet::new();
        while let Some(name) = pending.pop() {
            if name == capability {
                return true;
            }
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(descriptor) = self.lookup(&name) {
                pending.extend(descriptor.implements.iter().cloned());
            }
        }
        false
    }
}
