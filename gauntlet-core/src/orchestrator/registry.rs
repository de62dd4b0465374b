use std::sync::Arc;

use ahash::AHashMap;

use super::UnitDescriptor;
use crate::{Error, Result};

/// Units keyed by name, kept in registration order.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: Vec<Arc<UnitDescriptor>>,
    index: AHashMap<String, usize>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, unit: UnitDescriptor) -> Result<()> {
        if self.index.contains_key(unit.name()) {
            return Err(Error::DuplicateUnit(unit.name().to_string()));
        }
        self.index.insert(unit.name().to_string(), self.units.len());
        self.units.push(Arc::new(unit));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<UnitDescriptor>> {
        self.index.get(name).map(|&i| &self.units[i])
    }

    pub fn units(&self) -> &[Arc<UnitDescriptor>] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str) -> UnitDescriptor {
        UnitDescriptor::new(name, || async { Ok(()) })
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut reg = UnitRegistry::new();
        assert!(reg.register(unit("a")).is_ok());
        assert!(matches!(
            reg.register(unit("a")),
            Err(Error::DuplicateUnit(name)) if name == "a"
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn keeps_registration_order() {
        let mut reg = UnitRegistry::new();
        for name in ["c", "a", "b"] {
            assert!(reg.register(unit(name)).is_ok());
        }
        let names: Vec<_> = reg.units().iter().map(|u| u.name()).collect();
        assert_eq!(names, ["c", "a", "b"]);
        assert!(reg.get("a").is_some());
        assert!(reg.get("z").is_none());
    }
}
