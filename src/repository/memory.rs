use std::collections::BTreeMap;

use tracing::debug;

use super::{Condition, Entity, Filter, Pk, Repository, UNSET_PK};
use crate::error::{Error, Result};

/// Repository that keeps its entries in process memory.
///
/// Keys come from a counter starting at 1 and are never reused, so key order
/// is insertion order.
#[derive(Debug, Clone)]
pub struct MemoryRepository<T> {
    container: BTreeMap<Pk, T>,
    counter: Pk,
}

impl<T> MemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            container: BTreeMap::new(),
            counter: UNSET_PK,
        }
    }

    pub fn len(&self) -> usize {
        self.container.len()
    }

    pub fn is_empty(&self) -> bool {
        self.container.is_empty()
    }
}

impl<T> Default for MemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Collects entries that already carry their keys, e.g. a snapshot of
/// another repository. New keys continue after the largest one.
impl<T: Entity> FromIterator<T> for MemoryRepository<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let container = iter
            .into_iter()
            .map(|obj| (obj.pk(), obj))
            .collect::<BTreeMap<_, _>>();
        let counter = container
            .keys()
            .next_back()
            .map_or(UNSET_PK, |&pk| pk.max(UNSET_PK));
        Self { container, counter }
    }
}

fn satisfies<T: Entity>(obj: &T, conditions: &[Condition<'_>]) -> bool {
    conditions.iter().all(|condition| {
        obj.field(condition.field)
            .map(|stored| stored.with_affinity(condition.affinity))
            .as_ref()
            == Some(&condition.value)
    })
}

impl<T: Entity> Repository<T> for MemoryRepository<T> {
    fn add(&mut self, obj: T) -> Result<T> {
        if obj.pk() != UNSET_PK {
            return Err(Error::PkAlreadySet {
                entity: T::TABLE,
                pk: obj.pk(),
            });
        }
        self.counter += 1;
        let pk = self.counter;
        let obj = obj.with_pk(pk);
        self.container.insert(pk, obj.clone());
        debug!(table = T::TABLE, pk, "added entry in memory");
        Ok(obj)
    }

    fn get(&self, pk: Pk) -> Result<Option<T>> {
        Ok(self.container.get(&pk).cloned())
    }

    fn get_all_where(&self, filter: Option<&Filter>) -> Result<Vec<T>> {
        let Some(filter) = filter.filter(|filter| !filter.is_empty()) else {
            return Ok(self.container.values().cloned().collect());
        };
        let conditions = filter.resolve::<T>()?;
        Ok(self
            .container
            .values()
            .filter(|obj| satisfies(*obj, &conditions))
            .cloned()
            .collect())
    }

    fn update(&mut self, obj: &T) -> Result<()> {
        let pk = obj.pk();
        if pk == UNSET_PK {
            return Err(Error::PkUnset { entity: T::TABLE });
        }
        let Some(slot) = self.container.get_mut(&pk) else {
            return Err(Error::NotFound {
                entity: T::TABLE,
                pk,
            });
        };
        *slot = obj.clone();
        debug!(table = T::TABLE, pk, "updated entry in memory");
        Ok(())
    }

    fn delete(&mut self, pk: Pk) -> Result<()> {
        if self.container.remove(&pk).is_none() {
            return Err(Error::NotFound {
                entity: T::TABLE,
                pk,
            });
        }
        debug!(table = T::TABLE, pk, "deleted entry in memory");
        Ok(())
    }
}
