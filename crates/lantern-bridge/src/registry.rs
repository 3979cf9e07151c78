//! Capability registry: maps host types to their composed operation tables.
//!
//! The registry is built once from a [`RegistryBuilder`] and frozen. Resolution
//! is memoized per runtime type, so every proxy of a given type shares the same
//! [`ComposedTable`].

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::capability::{CapabilityDescriptor, ComposedTable, OperationTable};
use crate::error::BridgeError;
use crate::host_type::{HostType, HostTypeKey};

/// Collects capability descriptors during startup.
#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: Vec<CapabilityDescriptor>,
    names: HashSet<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor. A duplicate name is rejected without affecting
    /// descriptors that were already registered.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> Result<(), BridgeError> {
        if !self.names.insert(descriptor.name().to_string()) {
            warn!(target: "bridge", "Rejected duplicate capability '{}'", descriptor.name());
            return Err(BridgeError::DuplicateCapability {
                name: descriptor.name().to_string(),
            });
        }

        debug!(
            target: "bridge",
            "Registered capability '{}' for {} ({} operation(s){})",
            descriptor.name(),
            descriptor.target().name,
            descriptor.operations().len(),
            if descriptor.is_primary() { ", primary" } else { "" }
        );
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Register several descriptors, collecting every failure instead of
    /// stopping at the first one.
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = CapabilityDescriptor>,
    ) -> Vec<BridgeError> {
        descriptors
            .into_iter()
            .filter_map(|d| self.register(d).err())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Freeze the registry. No descriptors can be added afterwards.
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            descriptors: self.descriptors,
            resolved: RefCell::new(HashMap::new()),
        }
    }
}

/// Frozen set of capability descriptors plus the per-type resolution cache.
#[derive(Debug)]
pub struct CapabilityRegistry {
    descriptors: Vec<CapabilityDescriptor>,
    resolved: RefCell<HashMap<HostTypeKey, Rc<ComposedTable>>>,
}

impl CapabilityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn descriptors(&self) -> &[CapabilityDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    /// Number of host types resolved so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved.borrow().len()
    }

    /// Descriptors applicable to `ty`, least specific first. Descriptors at the
    /// same distance keep their registration order.
    pub fn applicable(&self, ty: &'static HostType) -> Vec<&CapabilityDescriptor> {
        let mut found: Vec<(usize, &CapabilityDescriptor)> = self
            .descriptors
            .iter()
            .filter_map(|d| ty.distance_to(d.target()).map(|dist| (dist, d)))
            .collect();

        // Stable sort: farthest ancestor first so the runtime type's own
        // descriptors merge last and win.
        found.sort_by(|a, b| b.0.cmp(&a.0));
        found.into_iter().map(|(_, d)| d).collect()
    }

    /// Composed operation table for `ty`.
    ///
    /// A failed resolution is not cached; the registry is unchanged.
    pub fn resolve(&self, ty: &'static HostType) -> Result<Rc<ComposedTable>, BridgeError> {
        let key = HostTypeKey(ty);
        if let Some(table) = self.resolved.borrow().get(&key) {
            return Ok(table.clone());
        }

        let table = Rc::new(self.compose(ty)?);
        debug!(
            target: "bridge",
            "Resolved {} as '{}' with capabilities [{}] and {} operation(s)",
            ty.name,
            table.type_name,
            table.capabilities.join(", "),
            table.operations.len()
        );
        self.resolved.borrow_mut().insert(key, table.clone());
        Ok(table)
    }

    fn compose(&self, ty: &'static HostType) -> Result<ComposedTable, BridgeError> {
        let applicable = self.applicable(ty);

        let primaries: Vec<String> = applicable
            .iter()
            .filter(|d| d.is_primary())
            .map(|d| d.name().to_string())
            .collect();
        if primaries.len() != 1 {
            return Err(BridgeError::AmbiguousPrimary {
                type_name: ty.name.to_string(),
                primaries,
            });
        }

        let mut operations = OperationTable::new();
        for descriptor in &applicable {
            operations.merge_from(descriptor.operations());
        }
        for descriptor in &applicable {
            if let Some(hook) = descriptor.hook() {
                hook(&mut operations);
            }
        }

        Ok(ComposedTable {
            host_type: ty,
            type_name: primaries.into_iter().next().unwrap_or_default(),
            capabilities: applicable.iter().map(|d| d.name().to_string()).collect(),
            operations,
        })
    }
}

thread_local! {
    static PROCESS_REGISTRY: RefCell<Option<Rc<CapabilityRegistry>>> = const { RefCell::new(None) };
}

/// Install the process-wide registry for the guest thread.
pub fn install_global(registry: CapabilityRegistry) -> Result<Rc<CapabilityRegistry>, BridgeError> {
    PROCESS_REGISTRY.with(|slot| {
        let mut slot = slot.borrow_mut();
        if slot.is_some() {
            return Err(BridgeError::RegistryAlreadyInstalled);
        }
        let registry = Rc::new(registry);
        *slot = Some(registry.clone());
        Ok(registry)
    })
}

/// The installed process-wide registry, if any.
pub fn global_registry() -> Option<Rc<CapabilityRegistry>> {
    PROCESS_REGISTRY.with(|slot| slot.borrow().clone())
}

/// Remove the process-wide registry. Runtimes already holding it keep working.
pub fn teardown_global() -> Option<Rc<CapabilityRegistry>> {
    PROCESS_REGISTRY.with(|slot| slot.borrow_mut().take())
}

#[cfg(test)]
mod tests {
    use super::*;

    static BASE: HostType = HostType::new("Base");
    static DERIVED: HostType = HostType {
        name: "Derived",
        parent: Some(&BASE),
        interfaces: &[],
    };
    static LONELY: HostType = HostType::new("Lonely");

    fn noop(name: &str, target: &'static HostType) -> CapabilityDescriptor {
        CapabilityDescriptor::new(name, target).operation("noop", |_, _, ()| Ok(()))
    }

    #[test]
    fn test_duplicate_names_are_rejected_but_others_register() {
        let mut builder = RegistryBuilder::new();
        let errors = builder.register_all([
            noop("a", &BASE),
            noop("a", &DERIVED),
            noop("b", &DERIVED).primary(),
        ]);

        assert_eq!(
            errors,
            vec![BridgeError::DuplicateCapability {
                name: "a".to_string()
            }]
        );
        assert_eq!(builder.len(), 2);
    }

    #[test]
    fn test_applicable_orders_least_specific_first() {
        let mut builder = RegistryBuilder::new();
        builder.register(noop("derived", &DERIVED).primary()).unwrap();
        builder.register(noop("base", &BASE)).unwrap();
        let registry = builder.build();

        let names: Vec<_> = registry
            .applicable(&DERIVED)
            .iter()
            .map(|d| d.name().to_string())
            .collect();
        assert_eq!(names, vec!["base", "derived"]);
    }

    #[test]
    fn test_resolve_is_memoized_per_type() {
        let mut builder = RegistryBuilder::new();
        builder.register(noop("derived", &DERIVED).primary()).unwrap();
        let registry = builder.build();

        let first = registry.resolve(&DERIVED).unwrap();
        let second = registry.resolve(&DERIVED).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(registry.resolved_count(), 1);
    }

    #[test]
    fn test_missing_primary_is_ambiguous_and_not_cached() {
        let mut builder = RegistryBuilder::new();
        builder.register(noop("base", &BASE)).unwrap();
        let registry = builder.build();

        let err = registry.resolve(&LONELY).unwrap_err();
        assert_eq!(
            err,
            BridgeError::AmbiguousPrimary {
                type_name: "Lonely".to_string(),
                primaries: vec![],
            }
        );
        assert_eq!(registry.resolved_count(), 0);
    }

    #[test]
    fn test_two_primaries_report_both_names() {
        let mut builder = RegistryBuilder::new();
        builder.register(noop("base", &BASE).primary()).unwrap();
        builder.register(noop("derived", &DERIVED).primary()).unwrap();
        let registry = builder.build();

        match registry.resolve(&DERIVED) {
            Err(BridgeError::AmbiguousPrimary { primaries, .. }) => {
                assert_eq!(primaries, vec!["base", "derived"]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        // The base type alone still resolves.
        assert_eq!(registry.resolve(&BASE).unwrap().type_name(), "base");
    }

    #[test]
    fn test_global_registry_lifecycle() {
        assert!(global_registry().is_none());
        install_global(RegistryBuilder::new().build()).unwrap();
        assert!(global_registry().is_some());
        assert_eq!(
            install_global(RegistryBuilder::new().build()).unwrap_err(),
            BridgeError::RegistryAlreadyInstalled
        );
        assert!(teardown_global().is_some());
        assert!(global_registry().is_none());
    }
}
