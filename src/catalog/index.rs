//! Indexed, immutable view of one program's tables and learns.
//!
//! The catalog is assembled once from parser output and never mutated
//! afterwards, so lookups take `&self` and need no locking. Assembly is strict
//! about duplicate ids and names and about dependencies that point nowhere.

use crate::catalog::info::{LearnId, TableId};
use crate::catalog::names::{Lookup, NameIndex};
use crate::catalog::table::{Learn, Table};
use crate::error::{Result, TdiError};
use crate::learn::LearnBackend;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// A `depends_on` entry before resolution: a table id or a table name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DependencyRef {
    Id(TableId),
    Name(String),
}

#[derive(Debug)]
pub struct Catalog {
    program_name: String,
    tables: Vec<Table>,
    table_names: NameIndex,
    table_ids: BTreeMap<TableId, usize>,
    learns: Vec<Learn>,
    learn_names: NameIndex,
    learn_ids: BTreeMap<LearnId, usize>,
    optimized_out: BTreeSet<String>,
}

impl Catalog {
    /// Index tables and learns, resolve dependencies and fill in aliases.
    pub(crate) fn assemble(
        program_name: &str,
        tables: Vec<(Table, Vec<DependencyRef>)>,
        learns: Vec<Learn>,
        optimized_out: BTreeSet<String>,
    ) -> Result<Self> {
        let (mut tables, pending): (Vec<Table>, Vec<Vec<DependencyRef>>) =
            tables.into_iter().unzip();

        let table_ids = index_ids(tables.iter().map(|t| (t.id(), t.name())), "table")?;
        check_unique_names(tables.iter().map(Table::name), "table")?;
        let table_names = NameIndex::build(tables.iter().enumerate().map(|(i, t)| (t.name(), i)));

        let learn_ids = index_ids(learns.iter().map(|l| (l.id(), l.name())), "learn")?;
        check_unique_names(learns.iter().map(Learn::name), "learn")?;
        let learn_names = NameIndex::build(learns.iter().enumerate().map(|(i, l)| (l.name(), i)));

        let mut depends_on: Vec<BTreeSet<TableId>> = Vec::with_capacity(tables.len());
        for (slot, refs) in pending.iter().enumerate() {
            let mut resolved = BTreeSet::new();
            for dep in refs {
                let target = resolve_dependency(dep, &table_names, &table_ids)
                    .map_err(|err| err.context(format!("table '{}'", tables[slot].name())))?;
                resolved.insert(tables[target].id());
            }
            depends_on.push(resolved);
        }

        let mut dependents: BTreeMap<TableId, BTreeSet<TableId>> = BTreeMap::new();
        for (slot, deps) in depends_on.iter().enumerate() {
            for dep in deps {
                dependents
                    .entry(*dep)
                    .or_default()
                    .insert(tables[slot].id());
            }
        }

        for (slot, (table, deps)) in tables.iter_mut().zip(depends_on).enumerate() {
            let info = table.info_mut();
            info.dependents = dependents.remove(&info.id).unwrap_or_default();
            info.depends_on = deps;
            info.aliases = table_names.aliases_of(slot);
        }
        let mut learns = learns;
        for (slot, learn) in learns.iter_mut().enumerate() {
            learn.info_mut().aliases = learn_names.aliases_of(slot);
        }

        debug!(
            program = program_name,
            tables = tables.len(),
            learns = learns.len(),
            "catalog assembled"
        );
        Ok(Self {
            program_name: program_name.to_string(),
            tables,
            table_names,
            table_ids,
            learns,
            learn_names,
            learn_ids,
            optimized_out,
        })
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    /// All tables in schema order.
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub(crate) fn set_learn_backend(&mut self, backend: Option<Arc<dyn LearnBackend>>) {
        for learn in &mut self.learns {
            learn.set_backend(backend.clone());
        }
    }

    pub fn learns(&self) -> &[Learn] {
        &self.learns
    }

    /// Look up a table by its full name or an unambiguous suffix of it.
    pub fn table_from_name(&self, name: &str) -> Result<&Table> {
        match self.table_names.resolve(name) {
            Lookup::Found(slot) => Ok(&self.tables[slot]),
            Lookup::Ambiguous => {
                warn!(program = %self.program_name, name, "ambiguous table name");
                Err(TdiError::invalid_argument(format!(
                    "table name '{name}' is ambiguous in program '{}'",
                    self.program_name
                )))
            }
            Lookup::Missing if self.optimized_out.contains(name) => {
                Err(TdiError::invalid_argument(format!(
                    "table '{name}' was optimized out of program '{}'",
                    self.program_name
                )))
            }
            Lookup::Missing => Err(TdiError::not_found(format!(
                "table '{name}' not found in program '{}'",
                self.program_name
            ))),
        }
    }

    pub fn table_from_id(&self, id: TableId) -> Result<&Table> {
        self.table_ids
            .get(&id)
            .map(|slot| &self.tables[*slot])
            .ok_or_else(|| {
                TdiError::not_found(format!(
                    "table id {id} not found in program '{}'",
                    self.program_name
                ))
            })
    }

    pub fn learn_from_name(&self, name: &str) -> Result<&Learn> {
        match self.learn_names.resolve(name) {
            Lookup::Found(slot) => Ok(&self.learns[slot]),
            Lookup::Ambiguous => Err(TdiError::invalid_argument(format!(
                "learn name '{name}' is ambiguous in program '{}'",
                self.program_name
            ))),
            Lookup::Missing => Err(TdiError::not_found(format!(
                "learn '{name}' not found in program '{}'",
                self.program_name
            ))),
        }
    }

    pub fn learn_from_id(&self, id: LearnId) -> Result<&Learn> {
        self.learn_ids
            .get(&id)
            .map(|slot| &self.learns[*slot])
            .ok_or_else(|| {
                TdiError::not_found(format!(
                    "learn id {id} not found in program '{}'",
                    self.program_name
                ))
            })
    }

    pub fn is_optimized_out(&self, name: &str) -> bool {
        self.optimized_out.contains(name)
    }

    pub fn optimized_out_tables(&self) -> impl Iterator<Item = &str> {
        self.optimized_out.iter().map(String::as_str)
    }

    /// Tables that must have entries before `id` can reference them.
    pub fn tables_this_table_depends_on(&self, id: TableId) -> Result<Vec<&Table>> {
        let table = self.table_from_id(id)?;
        table
            .info()
            .depends_on
            .iter()
            .map(|dep| self.table_from_id(*dep))
            .collect()
    }

    /// Tables whose entries reference `id`.
    pub fn tables_dependent_on_this_table(&self, id: TableId) -> Result<Vec<&Table>> {
        let table = self.table_from_id(id)?;
        table
            .info()
            .dependents
            .iter()
            .map(|dep| self.table_from_id(*dep))
            .collect()
    }

    /// Every table ordered so each one comes after the tables it depends on.
    /// Ties are broken by ascending id.
    pub fn write_order(&self) -> Result<Vec<&Table>> {
        let mut pending: BTreeMap<TableId, usize> = self
            .tables
            .iter()
            .map(|t| (t.id(), t.info().depends_on.len()))
            .collect();
        let mut ready: BTreeSet<TableId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut order = Vec::with_capacity(self.tables.len());
        while let Some(id) = ready.pop_first() {
            pending.remove(&id);
            let table = self.table_from_id(id)?;
            for dependent in &table.info().dependents {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
            order.push(table);
        }
        if !pending.is_empty() {
            let names: Vec<&str> = pending
                .keys()
                .filter_map(|id| self.table_from_id(*id).ok())
                .map(Table::name)
                .collect();
            return Err(TdiError::invalid_argument(format!(
                "dependency cycle among tables {names:?}"
            )));
        }
        Ok(order)
    }
}

fn index_ids<'a>(
    entries: impl Iterator<Item = (u32, &'a str)>,
    what: &str,
) -> Result<BTreeMap<u32, usize>> {
    let mut map: BTreeMap<u32, (usize, &str)> = BTreeMap::new();
    for (slot, (id, name)) in entries.enumerate() {
        if let Some((_, existing)) = map.get(&id) {
            return Err(TdiError::already_exists(format!(
                "{what} id {id} is used by both '{existing}' and '{name}'"
            )));
        }
        map.insert(id, (slot, name));
    }
    Ok(map.into_iter().map(|(id, (slot, _))| (id, slot)).collect())
}

fn check_unique_names<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(TdiError::already_exists(format!(
                "{what} '{name}' is declared more than once"
            )));
        }
    }
    Ok(())
}

fn resolve_dependency(
    dep: &DependencyRef,
    names: &NameIndex,
    ids: &BTreeMap<TableId, usize>,
) -> Result<usize> {
    match dep {
        DependencyRef::Id(id) => ids
            .get(id)
            .copied()
            .ok_or_else(|| TdiError::not_found(format!("depends on unknown table id {id}"))),
        DependencyRef::Name(name) => match names.resolve(name) {
            Lookup::Found(slot) => Ok(slot),
            Lookup::Ambiguous => Err(TdiError::invalid_argument(format!(
                "depends on ambiguous table name '{name}'"
            ))),
            Lookup::Missing => Err(TdiError::not_found(format!(
                "depends on unknown table '{name}'"
            ))),
        },
    }
}
