//! Read-only table mapping class identifiers to constructors.
//!
//! The table is built once at startup and never changes afterwards. It drives
//! object creation and supplies the entries for DLL (un)registration.

use crate::guids::{CLR_META_HOST_NAME, CLSID_CLR_META_HOST};
use crate::runtime::{ComObject, RuntimeResolver};
use corshim_shared::{Clsid, Error, RegistrationEntry, Result};
use std::sync::Arc;
use tracing::warn;

/// Creates an instance and returns the requested interface.
pub type Constructor = Box<dyn Fn(&Clsid) -> Result<ComObject> + Send + Sync>;

/// One creatable class.
pub struct ClassFactory {
    pub clsid: Clsid,
    pub name: String,
    constructor: Constructor,
}

impl ClassFactory {
    pub fn create(&self, iid: &Clsid) -> Result<ComObject> {
        (self.constructor)(iid)
    }
}

impl std::fmt::Debug for ClassFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassFactory")
            .field("clsid", &self.clsid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct ClassFactoryTable {
    classes: Vec<ClassFactory>,
}

impl ClassFactoryTable {
    pub fn builder() -> ClassFactoryTableBuilder {
        ClassFactoryTableBuilder::default()
    }

    /// The classes this module exposes: the meta host, created by `resolver`.
    pub fn for_resolver(resolver: Arc<dyn RuntimeResolver>) -> Self {
        Self {
            classes: vec![ClassFactory {
                clsid: CLSID_CLR_META_HOST,
                name: CLR_META_HOST_NAME.to_string(),
                constructor: Box::new(move |iid| resolver.create_meta_host(iid)),
            }],
        }
    }

    pub fn get(&self, clsid: &Clsid) -> Option<&ClassFactory> {
        self.classes.iter().find(|c| c.clsid == *clsid)
    }

    /// Create `clsid` and return its `iid` interface.
    pub fn create_instance(&self, clsid: &Clsid, iid: &Clsid) -> Result<ComObject> {
        match self.get(clsid) {
            Some(class) => class.create(iid),
            None => {
                warn!(%clsid, "Class not implemented");
                Err(Error::ClassNotAvailable(*clsid))
            }
        }
    }

    /// Registration entries in table order.
    pub fn registration_entries(&self) -> Vec<RegistrationEntry> {
        self.classes
            .iter()
            .map(|c| RegistrationEntry::new(c.clsid, c.name.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassFactory> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[derive(Default)]
pub struct ClassFactoryTableBuilder {
    classes: Vec<ClassFactory>,
}

impl ClassFactoryTableBuilder {
    pub fn register<F>(mut self, clsid: Clsid, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&Clsid) -> Result<ComObject> + Send + Sync + 'static,
    {
        self.classes.push(ClassFactory {
            clsid,
            name: name.into(),
            constructor: Box::new(constructor),
        });
        self
    }

    /// Finish the table. Each class may appear only once.
    pub fn build(self) -> Result<ClassFactoryTable> {
        for (i, class) in self.classes.iter().enumerate() {
            if self.classes[..i].iter().any(|c| c.clsid == class.clsid) {
                return Err(Error::Config(format!(
                    "class {} registered twice",
                    class.clsid
                )));
            }
        }
        Ok(ClassFactoryTable {
            classes: self.classes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guids::IID_ICLR_META_HOST;
    use crate::runtime::{NoRuntimeResolver, RuntimeInfo, RuntimeRequest};

    struct MetaHostOnly;

    impl RuntimeResolver for MetaHostOnly {
        fn get_runtime_info(&self, _request: &RuntimeRequest) -> Result<Box<dyn RuntimeInfo>> {
            Err(Error::RuntimeNotFound)
        }

        fn create_meta_host(&self, iid: &Clsid) -> Result<ComObject> {
            Ok(Box::new(*iid))
        }
    }

    #[test]
    fn test_meta_host_is_created_through_resolver() {
        let table = ClassFactoryTable::for_resolver(Arc::new(MetaHostOnly));
        let object = table
            .create_instance(&CLSID_CLR_META_HOST, &IID_ICLR_META_HOST)
            .unwrap();
        assert_eq!(*object.downcast::<Clsid>().unwrap(), IID_ICLR_META_HOST);
    }

    #[test]
    fn test_unknown_class_is_not_available() {
        let table = ClassFactoryTable::for_resolver(Arc::new(NoRuntimeResolver));
        let err = table
            .create_instance(&Clsid::from_u128(42), &IID_ICLR_META_HOST)
            .unwrap_err();
        assert!(matches!(err, Error::ClassNotAvailable(_)));
    }

    #[test]
    fn test_builder_keeps_order_and_rejects_duplicates() {
        let a = Clsid::from_u128(1);
        let b = Clsid::from_u128(2);
        let table = ClassFactoryTable::builder()
            .register(a, "A", |_| Ok(Box::new(1u32) as ComObject))
            .register(b, "B", |_| Ok(Box::new(2u32) as ComObject))
            .build()
            .unwrap();

        let entries = table.registration_entries();
        assert_eq!(entries[0], RegistrationEntry::new(a, "A"));
        assert_eq!(entries[1], RegistrationEntry::new(b, "B"));

        let err = ClassFactoryTable::builder()
            .register(a, "A", |_| Ok(Box::new(()) as ComObject))
            .register(a, "A again", |_| Ok(Box::new(()) as ComObject))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
