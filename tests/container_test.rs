//! 容器解析语义的集成测试

use parking_lot::Mutex;
use std::sync::Arc;

use wirebox::{
    Callable, ClassDescriptor, Concrete, Container, ContainerConfig, ContainerError, Implementation,
    Injectable, Instance, Parameter, Parameters, PrototypeStrategy, SharingMode, TypeCatalog,
};

#[derive(Default)]
struct FileLogger;

#[derive(Default)]
struct NullLogger;

struct Service {
    logger: Arc<FileLogger>,
}

/// 持有任意 Logger 实现
struct Mailer {
    logger: Instance,
}

struct Queue {
    logger: Instance,
}

struct Greeter {
    greeting: String,
}

/// 收集构造时未被形参消费的额外条目
struct Envelope {
    to: String,
    headers: Vec<String>,
}

#[derive(Default)]
struct Foo;

struct Clock;

struct Report {
    _clock: Arc<Clock>,
}

struct CycleA;
struct CycleB;

#[derive(Clone)]
struct Buffer {
    items: Vec<u32>,
}

struct Database {
    dsn: String,
}

impl Injectable for Database {
    fn class_name() -> &'static str {
        "Database"
    }

    fn parameters() -> Vec<Parameter> {
        vec![Parameter::primitive("dsn").with_default("sqlite::memory:".to_string())]
    }

    fn construct(arguments: &wirebox::Arguments) -> Result<Self, ContainerError> {
        Ok(Database {
            dsn: arguments.value("dsn")?,
        })
    }
}

fn catalog() -> TypeCatalog {
    let catalog = TypeCatalog::new();
    catalog.interface("Logger");
    catalog.define(
        ClassDescriptor::of::<FileLogger>("FileLogger")
            .implements("Logger")
            .construct_default(),
    );
    catalog.define(
        ClassDescriptor::of::<NullLogger>("NullLogger")
            .implements("Logger")
            .construct_default(),
    );
    catalog.define(
        ClassDescriptor::of::<Service>("Service")
            .param(Parameter::typed("logger", "Logger"))
            .construct(|args| Ok(Service { logger: args.get("logger")? })),
    );
    catalog.define(
        ClassDescriptor::of::<Mailer>("Mailer")
            .param(Parameter::typed("logger", "Logger"))
            .construct(|args| Ok(Mailer { logger: args.instance("logger")?.clone() })),
    );
    catalog.define(
        ClassDescriptor::of::<Queue>("Queue")
            .param(Parameter::typed("logger", "Logger"))
            .construct(|args| Ok(Queue { logger: args.instance("logger")?.clone() })),
    );
    catalog.define(
        ClassDescriptor::of::<Greeter>("Greeter")
            .param(Parameter::primitive("greeting"))
            .construct(|args| Ok(Greeter { greeting: args.value("greeting")? })),
    );
    catalog.define(
        ClassDescriptor::of::<Foo>("Foo")
            .construct_default()
            .method("bar", vec![], |_: &Foo, _| Ok("bar result".to_string()))
            .method("log_with", vec![Parameter::typed("logger", "Logger")], |_: &Foo, args| {
                Ok(args.instance("logger")?.is::<NullLogger>())
            }),
    );
    catalog.define(
        ClassDescriptor::of::<Report>("Report")
            .param(Parameter::typed("clock", "Clock"))
            .construct(|args| Ok(Report { _clock: args.get("clock")? })),
    );
    catalog.define(
        ClassDescriptor::of::<CycleA>("CycleA")
            .param(Parameter::typed("b", "CycleB"))
            .construct(|_| Ok(CycleA)),
    );
    catalog.define(
        ClassDescriptor::of::<CycleB>("CycleB")
            .param(Parameter::typed("a", "CycleA"))
            .construct(|_| Ok(CycleB)),
    );
    catalog.define(
        ClassDescriptor::of::<Buffer>("Buffer")
            .cloneable()
            .construct(|_| Ok(Buffer { items: vec![1, 2, 3] })),
    );
    catalog.define(
        ClassDescriptor::of::<Envelope>("Envelope")
            .param(Parameter::primitive("to"))
            .construct(|args| {
                Ok(Envelope {
                    to: args.value("to")?,
                    headers: args.extras().map(|(name, _)| name.to_string()).collect(),
                })
            }),
    );
    catalog.register::<Database>();
    catalog
}

fn container() -> Container {
    Container::with_catalog(catalog())
}

#[test]
fn test_singleton_returns_identical_instance() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();

    let first = container.make("Logger").unwrap();
    let second = container.make("Logger").unwrap();
    assert!(first.ptr_eq(&second));
    assert!(container.is_singleton("Logger"));
}

#[test]
fn test_prototype_returns_distinct_instances() {
    let container = container();
    container
        .bind("Logger", "FileLogger", SharingMode::Prototype)
        .unwrap();

    let first = container.make("Logger").unwrap();
    let second = container.make("Logger").unwrap();
    assert!(!first.ptr_eq(&second));
    assert!(container.is_prototype("Logger"));
}

#[test]
fn test_alias_chains_collapse() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();
    container.alias("Logger", "log").unwrap();
    container.alias("log", "logger.default").unwrap();

    assert_eq!(container.get_alias("logger.default"), "Logger");
    assert!(container.is_alias("log"));
    assert!(container
        .make("logger.default")
        .unwrap()
        .ptr_eq(&container.make("Logger").unwrap()));
}

#[test]
fn test_self_alias_fails_immediately() {
    let container = container();
    let err = container.alias("Logger", "Logger").unwrap_err();
    assert!(matches!(err, ContainerError::InvalidArgument(_)));
    assert!(!container.is_alias("Logger"));
}

#[test]
fn test_contextual_binding_is_scoped_to_consumer() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();
    container
        .when("Mailer")
        .needs("Logger")
        .give("NullLogger")
        .unwrap();

    let mailer = container.make_as::<Mailer>("Mailer").unwrap();
    let queue = container.make_as::<Queue>("Queue").unwrap();

    assert!(mailer.logger.is::<NullLogger>());
    assert!(queue.logger.is::<FileLogger>());
    assert!(queue.logger.ptr_eq(&container.make("Logger").unwrap()));
}

#[test]
fn test_contextual_binding_for_many_consumers() {
    let container = container();
    container.bind("Logger", "FileLogger", SharingMode::Prototype).unwrap();
    container
        .when_any(["Mailer", "Queue"])
        .needs("Logger")
        .give_factory(|_, _| Ok(Instance::new(NullLogger)))
        .unwrap();

    assert!(container.make_as::<Mailer>("Mailer").unwrap().logger.is::<NullLogger>());
    assert!(container.make_as::<Queue>("Queue").unwrap().logger.is::<NullLogger>());
}

#[test]
fn test_give_without_needs_is_rejected() {
    let container = container();
    let err = container.when("Mailer").give("NullLogger").unwrap_err();
    assert!(matches!(err, ContainerError::InvalidArgument(_)));
}

#[test]
fn test_unbound_required_dependency_and_override() {
    let container = container();

    let err = container.make("Report").unwrap_err();
    assert!(matches!(
        err,
        ContainerError::UnresolvableDependency { ref parameter, ref class }
            if parameter == "clock" && class == "Report"
    ));

    let report = container
        .make_with("Report", Parameters::new().with("clock", Clock))
        .unwrap();
    assert!(report.is::<Report>());
}

#[test]
fn test_primitive_parameters() {
    let container = container();
    let err = container.make("Greeter").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unresolvable dependency resolving [$greeting] in class Greeter"
    );

    container
        .when("Greeter")
        .needs("$greeting")
        .give_value("hello".to_string())
        .unwrap();
    assert_eq!(container.make_as::<Greeter>("Greeter").unwrap().greeting, "hello");

    // 非工厂的类名实现对标量按字面量使用
    container.add_contextual_binding("Greeter", "$greeting", Implementation::from("howdy"));
    assert_eq!(container.make_as::<Greeter>("Greeter").unwrap().greeting, "howdy");

    let db = container.make_as::<Database>("Database").unwrap();
    assert_eq!(db.dsn, "sqlite::memory:");
}

#[test]
fn test_parameters_bypass_shared_cache() {
    let container = container();
    container.singleton("Greeter", Concrete::Itself).unwrap();

    let hi = container
        .make_with("Greeter", Parameters::new().with("greeting", "hi".to_string()))
        .unwrap();
    let yo = container
        .make_with("Greeter", Parameters::new().with("greeting", "yo".to_string()))
        .unwrap();

    assert!(!hi.ptr_eq(&yo));
    assert_eq!(yo.downcast::<Greeter>().unwrap().greeting, "yo");
    assert!(container.resolved("Greeter"));
    // 带参数的结果没有被缓存
    assert!(container.make("Greeter").is_err());
}

#[test]
fn test_call_constructs_owner_and_invokes_method() {
    let container = container();
    let result = container.call("Foo@bar", Parameters::new()).unwrap();
    assert_eq!(result.cloned::<String>().unwrap(), "bar result");

    let err = container.call("Foo", Parameters::new()).unwrap_err();
    assert!(matches!(err, ContainerError::InvalidArgument(_)));
}

#[test]
fn test_call_overrides_by_name_and_class() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();

    let by_class = container
        .call(
            "Foo@log_with",
            Parameters::new().with("Logger", NullLogger),
        )
        .unwrap();
    assert!(by_class.cloned::<bool>().unwrap());

    let resolved = container.call("Foo@log_with", Parameters::new()).unwrap();
    assert!(!resolved.cloned::<bool>().unwrap());

    let closure = Callable::closure(vec![Parameter::primitive("a")], |args| {
        let extras: Vec<String> = args.extras().map(|(name, _)| name.to_string()).collect();
        Ok((args.value::<u32>("a")?, extras))
    });
    let result = container
        .call(closure, Parameters::new().with("a", 1u32).with("b", 2u32))
        .unwrap();
    let (a, extras) = result.cloned::<(u32, Vec<String>)>().unwrap();
    assert_eq!(a, 1);
    assert_eq!(extras, vec!["b".to_string()]);
}

#[test]
fn test_method_binding_intercepts_call() {
    let container = container();
    container.bind_method("Foo@bar", |_, _| Ok(Instance::new("intercepted".to_string())));

    assert!(container.has_method_binding("Foo@bar"));
    let result = container.call("Foo@bar", Parameters::new()).unwrap();
    assert_eq!(result.cloned::<String>().unwrap(), "intercepted");

    let instance = container.make("Foo").unwrap();
    let result = container.call((instance, "bar"), Parameters::new()).unwrap();
    assert_eq!(result.cloned::<String>().unwrap(), "intercepted");
}

#[test]
fn test_flush_forgets_singletons_and_bindings() {
    let container = container();
    container.singleton("FileLogger", Concrete::Itself).unwrap();
    let before = container.make("FileLogger").unwrap();

    container.flush();
    assert!(!container.bound("FileLogger"));
    assert!(!container.resolved("FileLogger"));

    container.singleton("FileLogger", Concrete::Itself).unwrap();
    let after = container.make("FileLogger").unwrap();
    assert!(!after.ptr_eq(&before));
}

#[test]
fn test_end_to_end_shared_logger() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();
    container
        .bind("Service", Concrete::Itself, SharingMode::Prototype)
        .unwrap();

    let first = container.make_as::<Service>("Service").unwrap();
    let second = container.make_as::<Service>("Service").unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first.logger, &second.logger));
}

#[test]
fn test_not_instantiable_reports_chain() {
    let container = container();
    let err = container.make("Service").unwrap_err();

    assert!(matches!(
        err,
        ContainerError::NotInstantiable { ref concrete, ref chain }
            if concrete == "Logger" && chain == &vec!["Service".to_string()]
    ));
    assert_eq!(
        err.to_string(),
        "Target [Logger] is not instantiable while building [Service]."
    );
}

#[test]
fn test_circular_dependency_fails_fast() {
    let container = container();
    let err = container.make("CycleA").unwrap_err();

    match err {
        ContainerError::CircularDependency { concrete, chain } => {
            assert_eq!(concrete, "CycleA");
            assert_eq!(chain, vec!["CycleA", "CycleB", "CycleA"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_get_distinguishes_unknown_from_failed() {
    let container = container();
    assert!(matches!(
        container.get("Missing"),
        Err(ContainerError::NotFound(ref id)) if id == "Missing"
    ));

    container
        .bind("Broken", "Logger", SharingMode::Prototype)
        .unwrap();
    assert!(container.has("Broken"));
    assert!(matches!(
        container.get("Broken"),
        Err(ContainerError::NotInstantiable { .. })
    ));

    assert!(container.get("FileLogger").unwrap().is::<FileLogger>());
}

#[test]
fn test_request_scoped_instances() {
    let container = container();
    container.request_scoped("Logger", "FileLogger").unwrap();

    let first = container.make("Logger").unwrap();
    assert!(first.ptr_eq(&container.make("Logger").unwrap()));
    assert!(container.is_request_scoped("Logger"));

    let scope = container.request_scope("job-1");
    let scoped = scope.make("Logger").unwrap();
    assert!(!scoped.ptr_eq(&first));
    assert!(scoped.ptr_eq(&scope.make("Logger").unwrap()));
    assert!(scope.is_cached("Logger"));

    container.end_request();
    assert!(!container.make("Logger").unwrap().ptr_eq(&first));
    assert!(scope.make("Logger").unwrap().ptr_eq(&scoped));
}

#[test]
fn test_callbacks_fire_in_tiers() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let log = order.clone();
    container.after_resolving_any(move |_, _| log.lock().push("after-any"));
    let log = order.clone();
    container.after_resolving("Logger", move |_, _| log.lock().push("after-logger"));
    let log = order.clone();
    container.resolving("Logger", move |_, _| log.lock().push("resolving-logger"));
    let log = order.clone();
    container.resolving_any(move |_, _| log.lock().push("resolving-any"));

    container.make("Logger").unwrap();
    assert_eq!(
        *order.lock(),
        vec!["resolving-any", "resolving-logger", "after-any", "after-logger"]
    );

    // 命中单例缓存不再触发回调
    container.make("Logger").unwrap();
    assert_eq!(order.lock().len(), 4);
}

#[test]
fn test_typed_callbacks_match_capabilities() {
    let container = container();
    let hits = Arc::new(Mutex::new(Vec::new()));
    let log = hits.clone();
    container.resolving("Logger", move |instance, c| {
        log.lock().push(c.catalog().class_name_of(instance));
    });

    container.make("NullLogger").unwrap();
    container.make("Foo").unwrap();
    assert_eq!(*hits.lock(), vec!["NullLogger".to_string()]);
}

#[test]
fn test_extenders_apply_in_order() {
    let container = container();
    container
        .bind(
            "message",
            Concrete::factory(|_, _| Ok(Instance::new("msg".to_string()))),
            SharingMode::Prototype,
        )
        .unwrap();

    for suffix in ["!", "?"] {
        container
            .extend("message", move |instance, _| {
                Ok(Instance::new(format!("{}{}", instance.cloned::<String>()?, suffix)))
            })
            .unwrap();
    }

    assert_eq!(container.make("message").unwrap().cloned::<String>().unwrap(), "msg!?");
}

#[test]
fn test_rebinding_notifies_with_new_instance() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();
    container.make("Logger").unwrap();

    let swapped = Arc::new(Mutex::new(None));
    let seen = swapped.clone();
    container.rebinding("Logger", move |_, instance| {
        *seen.lock() = Some(instance.is::<NullLogger>());
    });

    container.singleton("Logger", "NullLogger").unwrap();
    assert_eq!(*swapped.lock(), Some(true));
}

#[test]
fn test_bind_if_absent_keeps_first_binding() {
    let container = container();
    assert!(container.bind_if_absent("Logger", "FileLogger", SharingMode::Singleton).unwrap());
    assert!(!container.bind_if_absent("Logger", "NullLogger", SharingMode::Singleton).unwrap());

    assert!(container.make("Logger").unwrap().is::<FileLogger>());
}

#[test]
fn test_prototype_template_cloning() {
    let config = ContainerConfig {
        prototype_strategy: PrototypeStrategy::CloneTemplate,
        ..Default::default()
    };
    let container = Container::from_parts(catalog(), config);

    let first = container.make("Buffer").unwrap();
    let second = container.make("Buffer").unwrap();
    let third = container.make("Buffer").unwrap();

    assert!(!first.ptr_eq(&second));
    assert!(!second.ptr_eq(&third));
    assert_eq!(third.downcast::<Buffer>().unwrap().items, vec![1, 2, 3]);

    let stats = container.stats();
    assert_eq!(stats.builds, 1);
    assert_eq!(stats.prototype_clones, 2);

    // 没有注册深拷贝的类型仍然每次重新构建
    container.make("FileLogger").unwrap();
    container.make("FileLogger").unwrap();
    assert_eq!(container.stats().builds, 3);
}

#[test]
fn test_rebind_invalidates_live_request_scopes() {
    let container = container();
    container.request_scoped("Logger", "FileLogger").unwrap();

    let scope = container.request_scope("job-rebind");
    assert!(scope.make("Logger").unwrap().is::<FileLogger>());

    container.request_scoped("Logger", "NullLogger").unwrap();
    assert!(!scope.is_cached("Logger"));
    assert!(scope.make("Logger").unwrap().is::<NullLogger>());
}

#[test]
fn test_flush_clears_live_request_scopes() {
    let container = container();
    container.request_scoped("Logger", "FileLogger").unwrap();

    let scope = container.request_scope("job-flush");
    scope.make("Logger").unwrap();

    container.flush();
    assert!(!container.bound("Logger"));
    assert!(!scope.is_cached("Logger"));
    assert!(matches!(
        scope.make("Logger"),
        Err(ContainerError::NotInstantiable { ref concrete, .. }) if concrete == "Logger"
    ));
}

#[test]
fn test_instance_replaces_value_cached_in_live_scope() {
    let container = container();
    container.request_scoped("Logger", "FileLogger").unwrap();

    let scope = container.request_scope("job-instance");
    assert!(scope.make("Logger").unwrap().is::<FileLogger>());

    container.instance("Logger", Instance::new(NullLogger)).unwrap();
    assert!(!scope.is_cached("Logger"));
    assert!(scope.make("Logger").unwrap().is::<NullLogger>());
}

#[test]
fn test_extend_reaches_live_request_scopes() {
    let container = container();
    container
        .request_scoped(
            "greeting",
            Concrete::factory(|_, _| Ok(Instance::new("hi".to_string()))),
        )
        .unwrap();

    let scope = container.request_scope("job-extend");
    assert_eq!(scope.make("greeting").unwrap().cloned::<String>().unwrap(), "hi");

    container
        .extend("greeting", |instance, _| {
            Ok(Instance::new(format!("{}!", instance.cloned::<String>()?)))
        })
        .unwrap();
    assert_eq!(scope.make("greeting").unwrap().cloned::<String>().unwrap(), "hi!");
}

#[test]
fn test_bind_drops_alias_with_same_name() {
    let container = container();
    container.singleton("Logger", "FileLogger").unwrap();
    container.alias("Logger", "log").unwrap();
    assert!(container.make("log").unwrap().is::<FileLogger>());

    container.bind("log", "NullLogger", SharingMode::Prototype).unwrap();
    assert!(!container.is_alias("log"));
    assert_eq!(container.get_alias("log"), "log");
    assert!(container.make("log").unwrap().is::<NullLogger>());
    assert!(container.make("Logger").unwrap().is::<FileLogger>());
}

#[test]
fn test_constructor_receives_unconsumed_overrides() {
    let container = container();
    let envelope = container
        .make_with(
            "Envelope",
            Parameters::new()
                .with("to", "ops@example.com".to_string())
                .with("x-trace", 7u64)
                .with("x-retry", true),
        )
        .unwrap();

    let envelope = envelope.downcast::<Envelope>().unwrap();
    assert_eq!(envelope.to, "ops@example.com");
    assert_eq!(envelope.headers, vec!["x-trace".to_string(), "x-retry".to_string()]);
}
