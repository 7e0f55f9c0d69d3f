//! 容器错误定义

use thiserror::Error;

/// 依赖注入容器错误
#[derive(Debug, Error)]
pub enum ContainerError {
    /// 标识符从未注册，且无法通过任何方式解析
    #[error("No entry was found for [{0}]")]
    NotFound(String),

    /// 目标类型无法实例化（接口、抽象类型等）
    #[error("Target [{concrete}] is not instantiable{}", building(.chain))]
    NotInstantiable {
        concrete: String,
        /// 构建栈，从外到内
        chain: Vec<String>,
    },

    /// 参数既没有类型、上下文绑定、默认值，也没有调用方覆盖
    #[error("Unresolvable dependency resolving [${parameter}] in class {class}")]
    UnresolvableDependency { parameter: String, class: String },

    /// 构建栈中再次出现同一个具体类型
    #[error("Circular dependency detected while building [{concrete}]: {}", .chain.join(" -> "))]
    CircularDependency { concrete: String, chain: Vec<String> },

    /// 嵌套解析超过配置的最大深度
    #[error("Maximum resolution depth {depth} exceeded{}", building(.chain))]
    DepthExceeded { depth: usize, chain: Vec<String> },

    /// 调用参数格式错误
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 实例类型与期望不符
    #[error("Type mismatch: expected '{expected}', found '{actual}'")]
    TypeMismatch { expected: String, actual: String },

    /// 工厂或构造函数自身返回的错误
    #[error("Failed to build [{abstract_id}]: {source}")]
    Factory {
        abstract_id: String,
        #[source]
        source: anyhow::Error,
    },
}

fn building(chain: &[String]) -> String {
    if chain.is_empty() {
        ".".to_string()
    } else {
        format!(" while building [{}].", chain.join(", "))
    }
}

impl ContainerError {
    /// 包装工厂返回的任意错误
    pub fn factory(abstract_id: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        ContainerError::Factory {
            abstract_id: abstract_id.into(),
            source: source.into(),
        }
    }

    /// 可选参数回退到默认值时允许吞掉的解析失败
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            ContainerError::NotFound(_)
                | ContainerError::NotInstantiable { .. }
                | ContainerError::UnresolvableDependency { .. }
        )
    }
}

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid value '{value}' for environment variable {key}")]
    InvalidEnv { key: String, value: String },
}
