//! In-memory resource tree.
//!
//! `MemoryStore` behaves like the remote store as far as the control layer
//! can observe: rows keep insertion order, ids are generated on create, and a
//! few server-side behaviours are reproduced:
//!
//! - a network row starts with an empty `subnets` list
//! - creating a subnet appends its id to the owning network's `subnets`, and
//!   deleting it removes the id again; a subnet naming an unknown network is
//!   rejected
//! - singleton kinds (the fabric attachment) are updated in place by `set`
//!
//! Tests can make any primitive fail for a type tag with [`MemoryStore::reject`]
//! and inspect traffic with [`MemoryStore::calls`].

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use vnet_core::ResourceKind;

use crate::error::{Result, StoreError};
use crate::types::{Fields, Resource, Scope};
use crate::{StoreDeleter, StoreReader, StoreWriter};

/// A store primitive, used to target faults and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `walk`
    Walk,
    /// `get`
    Get,
    /// `set`
    Set,
    /// `delete`
    Delete,
}

#[derive(Debug)]
struct Fault {
    op: Operation,
    kind: ResourceKind,
    message: String,
    remaining: Option<usize>,
}

type TableKey = (Scope, ResourceKind);

/// In-memory implementation of the store capabilities.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<TableKey, Vec<Resource>>>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<HashMap<(Operation, ResourceKind), usize>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `op` on `kind` fail with `StoreError::Rejected(message)`.
    pub fn reject(&self, op: Operation, kind: ResourceKind, message: impl Into<String>) {
        self.faults.lock().push(Fault {
            op,
            kind,
            message: message.into(),
            remaining: None,
        });
    }

    /// Make the next `op` on `kind` fail once.
    pub fn reject_once(&self, op: Operation, kind: ResourceKind, message: impl Into<String>) {
        self.faults.lock().push(Fault {
            op,
            kind,
            message: message.into(),
            remaining: Some(1),
        });
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Number of times `op` was invoked for `kind`, including rejected calls.
    #[must_use]
    pub fn calls(&self, op: Operation, kind: ResourceKind) -> usize {
        self.calls.lock().get(&(op, kind)).copied().unwrap_or(0)
    }

    /// Number of rows of `kind` under `scope`.
    #[must_use]
    pub fn count(&self, scope: &Scope, kind: ResourceKind) -> usize {
        self.tables
            .read()
            .get(&(scope.clone(), kind))
            .map_or(0, Vec::len)
    }

    fn enter(&self, op: Operation, kind: ResourceKind) -> Result<()> {
        *self.calls.lock().entry((op, kind)).or_insert(0) += 1;

        let mut faults = self.faults.lock();
        let Some(index) = faults.iter().position(|f| f.op == op && f.kind == kind) else {
            return Ok(());
        };

        let message = faults[index].message.clone();
        if let Some(remaining) = faults[index].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                faults.remove(index);
            }
        }
        Err(StoreError::Rejected(message))
    }

    fn strip_keys(mut fields: Fields) -> (Option<String>, Fields) {
        fields.remove("tid");
        let id = match fields.remove("id") {
            Some(Value::String(id)) => Some(id),
            _ => None,
        };
        (id, fields)
    }

    fn matches(resource: &Resource, selector: &Fields) -> bool {
        selector.iter().all(|(key, expected)| match key.as_str() {
            "tid" => true,
            "id" => expected.as_str() == Some(resource.id.as_str()),
            _ => resource.fields.get(key) == Some(expected),
        })
    }

    /// Keep the owning network's `subnets` list in step with subnet rows.
    fn link_subnet(
        tables: &mut HashMap<TableKey, Vec<Resource>>,
        scope: &Scope,
        subnet: &Resource,
    ) -> Result<()> {
        let Some(network_id) = subnet.str_field("network_id") else {
            return Ok(());
        };
        let network = tables
            .get_mut(&(scope.clone(), ResourceKind::Network))
            .and_then(|rows| rows.iter_mut().find(|row| row.id == network_id))
            .ok_or_else(|| StoreError::Rejected(format!("network {network_id} does not exist")))?;

        let subnets = network
            .fields
            .entry("subnets")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(ids) = subnets {
            ids.push(Value::String(subnet.id.clone()));
        }
        Ok(())
    }

    fn unlink_subnet(
        tables: &mut HashMap<TableKey, Vec<Resource>>,
        scope: &Scope,
        subnet: &Resource,
    ) {
        let Some(network_id) = subnet.str_field("network_id") else {
            return;
        };
        let network = tables
            .get_mut(&(scope.clone(), ResourceKind::Network))
            .and_then(|rows| rows.iter_mut().find(|row| row.id == network_id));
        if let Some(Value::Array(ids)) = network.and_then(|n| n.fields.get_mut("subnets")) {
            ids.retain(|id| id.as_str() != Some(subnet.id.as_str()));
        }
    }
}

#[async_trait]
impl StoreReader for MemoryStore {
    async fn walk(&self, scope: &Scope, kind: ResourceKind) -> Result<Vec<Resource>> {
        self.enter(Operation::Walk, kind)?;
        Ok(self
            .tables
            .read()
            .get(&(scope.clone(), kind))
            .cloned()
            .unwrap_or_default())
    }

    async fn get(&self, scope: &Scope, kind: ResourceKind, id: &str) -> Result<Option<Resource>> {
        self.enter(Operation::Get, kind)?;
        Ok(self
            .tables
            .read()
            .get(&(scope.clone(), kind))
            .and_then(|rows| rows.iter().find(|row| row.id == id))
            .cloned())
    }
}

#[async_trait]
impl StoreWriter for MemoryStore {
    async fn set(&self, scope: &Scope, kind: ResourceKind, fields: Fields) -> Result<Resource> {
        self.enter(Operation::Set, kind)?;

        let (id, fields) = Self::strip_keys(fields);
        let mut tables = self.tables.write();
        let rows = tables.entry((scope.clone(), kind)).or_default();

        let existing = match &id {
            Some(id) => Some(
                rows.iter()
                    .position(|row| &row.id == id)
                    .ok_or(StoreError::NotFound)?,
            ),
            None if kind.is_singleton() && !rows.is_empty() => Some(0),
            None => None,
        };

        if let Some(index) = existing {
            let row = &mut rows[index];
            row.fields.extend(fields);
            return Ok(row.clone());
        }

        let mut fields = fields;
        if kind == ResourceKind::Network {
            fields
                .entry("subnets")
                .or_insert_with(|| Value::Array(Vec::new()));
        }
        let created = Resource::new(kind, uuid::Uuid::new_v4().to_string(), fields);

        if kind == ResourceKind::Subnet {
            Self::link_subnet(&mut tables, scope, &created)?;
        }
        tables
            .entry((scope.clone(), kind))
            .or_default()
            .push(created.clone());

        Ok(created)
    }
}

#[async_trait]
impl StoreDeleter for MemoryStore {
    async fn delete(&self, scope: &Scope, kind: ResourceKind, selector: Fields) -> Result<()> {
        self.enter(Operation::Delete, kind)?;

        let mut tables = self.tables.write();
        let rows = tables.entry((scope.clone(), kind)).or_default();

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(rows)
            .into_iter()
            .partition(|row| Self::matches(row, &selector));
        *rows = kept;

        if removed.is_empty() {
            return Err(StoreError::NotFound);
        }
        if kind == ResourceKind::Subnet {
            for subnet in &removed {
                Self::unlink_subnet(&mut tables, scope, subnet);
            }
        }
        Ok(())
    }
}
