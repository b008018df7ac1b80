use std::sync::Arc;

use dashmap::DashMap;
use mbeans_core::{ObjectName, Value};

use crate::error::catch_fault;
use crate::mbean::Candidate;
use crate::traits::{ClassHandle, InstantiationError, Instantiator};

type Factory =
    dyn Fn(&[Value], &[String]) -> Result<Candidate, InstantiationError> + Send + Sync;

/// Table-driven [`Instantiator`]: each known class name maps to a factory
/// closure that receives the constructor arguments and signature.
///
/// Nothing is loaded dynamically; a class is "found" iff a factory was
/// registered for it. The loader name is recorded on the handle but does not
/// change resolution.
#[derive(Default)]
pub struct FactoryInstantiator {
    factories: DashMap<String, Arc<Factory>>,
}

impl FactoryInstantiator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory for `class_name`.
    pub fn register<F>(&self, class_name: impl Into<String>, factory: F)
    where
        F: Fn(&[Value], &[String]) -> Result<Candidate, InstantiationError> + Send + Sync + 'static,
    {
        self.factories.insert(class_name.into(), Arc::new(factory));
    }

    #[must_use]
    pub fn knows(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }
}

impl Instantiator for FactoryInstantiator {
    fn load_class(
        &self,
        class_name: &str,
        loader: Option<&ObjectName>,
    ) -> Result<ClassHandle, InstantiationError> {
        if !self.knows(class_name) {
            return Err(InstantiationError::ClassNotFound {
                class_name: class_name.to_string(),
            });
        }
        Ok(ClassHandle {
            class_name: class_name.to_string(),
            loader: loader.cloned(),
        })
    }

    fn instantiate(
        &self,
        class: &ClassHandle,
        args: &[Value],
        signature: &[String],
    ) -> Result<Candidate, InstantiationError> {
        if args.len() != signature.len() {
            return Err(InstantiationError::Reflection {
                class_name: class.class_name.clone(),
                reason: format!(
                    "{} arguments for a signature of {} types",
                    args.len(),
                    signature.len()
                ),
            });
        }
        let factory = self
            .factories
            .get(&class.class_name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| InstantiationError::ClassNotFound {
                class_name: class.class_name.clone(),
            })?;
        catch_fault(|| factory(args, signature)).map_err(|source| InstantiationError::Fault {
            class_name: class.class_name.clone(),
            source,
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestBean;

    fn instantiator() -> FactoryInstantiator {
        let instantiator = FactoryInstantiator::new();
        instantiator.register("test.Counter", |args, _sig| match args {
            [] => Ok(Candidate::dynamic(TestBean::new("test.Counter"))),
            _ => Err(InstantiationError::Reflection {
                class_name: "test.Counter".to_string(),
                reason: "no constructor with arguments".to_string(),
            }),
        });
        instantiator.register("test.Broken", |_, _| panic!("constructor bug"));
        instantiator
    }

    #[test]
    fn loads_and_instantiates_known_class() {
        let instantiator = instantiator();
        let loader = ObjectName::parse("d:type=Loader").unwrap();
        let class = instantiator
            .load_class("test.Counter", Some(&loader))
            .unwrap();
        assert_eq!(class.loader, Some(loader));
        let candidate = instantiator.instantiate(&class, &[], &[]).unwrap();
        assert!(matches!(candidate, Candidate::Dynamic(_)));
    }

    #[test]
    fn unknown_class_is_not_found() {
        assert!(matches!(
            instantiator().load_class("test.Missing", None),
            Err(InstantiationError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn signature_mismatch_is_reflection_error() {
        let instantiator = instantiator();
        let class = instantiator.load_class("test.Counter", None).unwrap();
        assert!(matches!(
            instantiator.instantiate(&class, &[Value::Int(1)], &[]),
            Err(InstantiationError::Reflection { .. })
        ));
        assert!(matches!(
            instantiator.instantiate(&class, &[Value::Int(1)], &["long".to_string()]),
            Err(InstantiationError::Reflection { .. })
        ));
    }

    #[test]
    fn panicking_constructor_is_fault() {
        let instantiator = instantiator();
        let class = instantiator.load_class("test.Broken", None).unwrap();
        assert!(matches!(
            instantiator.instantiate(&class, &[], &[]),
            Err(InstantiationError::Fault { .. })
        ));
    }
}
