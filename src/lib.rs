pub mod config;
pub mod container;
pub mod error;
pub mod instance;
pub mod logging;
pub mod reflection;

// Re-export commonly used items for convenience
pub use config::{ContainerConfig, PrototypeStrategy};
pub use container::{
    Callable, Concrete, Container, ContainerStats, ContextualBindingBuilder, Implementation,
    RequestScope, Resolver, SharingMode,
};
pub use error::{ConfigError, ContainerError};
pub use instance::{Arguments, Instance, Parameters};
pub use reflection::{ClassDescriptor, FunctionDescriptor, Injectable, Parameter, TypeCatalog};
