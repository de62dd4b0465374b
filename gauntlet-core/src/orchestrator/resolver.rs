use std::sync::Arc;

use ahash::AHashMap;

use super::UnitDescriptor;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

/// Orders units so that every dependency precedes its dependents.
///
/// Depth-first: each unit's dependencies are visited (in declaration order)
/// before the unit itself is appended. Units with no ordering constraint keep
/// their input order. Fails on unknown dependencies and on cycles.
pub fn resolve(units: &[Arc<UnitDescriptor>]) -> Result<Vec<Arc<UnitDescriptor>>> {
    let index: AHashMap<&str, usize> = units
        .iter()
        .enumerate()
        .map(|(i, u)| (u.name(), i))
        .collect();

    let mut resolver = Resolver {
        units,
        index,
        marks: vec![Mark::Unvisited; units.len()],
        stack: Vec::new(),
        order: Vec::with_capacity(units.len()),
    };
    for i in 0..units.len() {
        resolver.visit(i)?;
    }
    Ok(resolver.order)
}

struct Resolver<'a> {
    units: &'a [Arc<UnitDescriptor>],
    index: AHashMap<&'a str, usize>,
    marks: Vec<Mark>,
    stack: Vec<usize>,
    order: Vec<Arc<UnitDescriptor>>,
}

impl Resolver<'_> {
    fn visit(&mut self, i: usize) -> Result<()> {
        match self.marks[i] {
            Mark::Done => return Ok(()),
            Mark::Visiting => return Err(self.cycle_at(i)),
            Mark::Unvisited => {}
        }

        self.marks[i] = Mark::Visiting;
        self.stack.push(i);

        let units = self.units;
        let unit = &units[i];
        for dep in unit.dependencies() {
            let Some(&j) = self.index.get(dep.as_str()) else {
                return Err(Error::UnknownDependency {
                    unit: unit.name().to_string(),
                    dependency: dep.clone(),
                });
            };
            self.visit(j)?;
        }

        self.stack.pop();
        self.marks[i] = Mark::Done;
        self.order.push(Arc::clone(unit));
        Ok(())
    }

    fn cycle_at(&self, i: usize) -> Error {
        let start = self.stack.iter().position(|&s| s == i).unwrap_or(0);
        let mut path: Vec<String> = self.stack[start..]
            .iter()
            .map(|&s| self.units[s].name().to_string())
            .collect();
        path.push(self.units[i].name().to_string());

        Error::CircularDependency {
            unit: self.units[i].name().to_string(),
            path,
        }
    }
}
