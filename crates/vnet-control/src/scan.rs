//! Linear-scan lookups shared by every component.
//!
//! The store offers no queries beyond "list children of a type tag", so each
//! lookup is one `walk` followed by a scan in store order. When names repeat,
//! the first match wins.

use vnet_store::{Resource, Scope, StoreReader};

use crate::error::{ControlError, Result};
use crate::model::Record;

/// Decode one row into its entity.
pub(crate) fn decode<R: Record>(resource: &Resource) -> Result<R> {
    resource.decode().map_err(|e| ControlError::Decode {
        kind: R::KIND,
        id: resource.id.clone(),
        reason: e.to_string(),
    })
}

/// List every record of `R`'s kind under `scope`.
pub(crate) async fn list<R, S>(store: &S, scope: &Scope) -> Result<Vec<R>>
where
    R: Record,
    S: StoreReader + ?Sized,
{
    store
        .walk(scope, R::KIND)
        .await?
        .iter()
        .map(decode)
        .collect()
}

/// Find a record by id.
pub(crate) async fn by_id<R, S>(store: &S, scope: &Scope, id: &str) -> Result<Option<R>>
where
    R: Record,
    S: StoreReader + ?Sized,
{
    let rows = store.walk(scope, R::KIND).await?;
    rows.iter()
        .find(|row| row.id == id)
        .map(decode)
        .transpose()
}

/// Find the first record with this name.
pub(crate) async fn by_name<R, S>(store: &S, scope: &Scope, name: &str) -> Result<Option<R>>
where
    R: Record,
    S: StoreReader + ?Sized,
{
    let rows = store.walk(scope, R::KIND).await?;
    rows.iter()
        .find(|row| row.str_field("name") == Some(name))
        .map(decode)
        .transpose()
}

/// First record of `R`'s kind, if any.
pub(crate) async fn first<R, S>(store: &S, scope: &Scope) -> Result<Option<R>>
where
    R: Record,
    S: StoreReader + ?Sized,
{
    let rows = store.walk(scope, R::KIND).await?;
    rows.first().map(decode).transpose()
}
