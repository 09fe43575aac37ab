//! Expense categories and the traversals over their parent links.

use std::collections::{HashMap, HashSet};

use rusqlite::Row;

use crate::error::{Error, Result};
use crate::repository::sqlite::FromRow;
use crate::repository::{Column, Entity, FieldValue, Pk, Repository, UNSET_PK};

/// Expense category. A category without a parent is a root; several roots
/// may coexist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub parent: Option<Pk>,
    pub pk: Pk,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            pk: UNSET_PK,
        }
    }

    pub fn with_parent(name: impl Into<String>, parent: Pk) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new(name)
        }
    }

    /// The direct parent, or `None` for a root or a parent that no longer
    /// exists.
    pub fn get_parent<R>(&self, repo: &R) -> Result<Option<Category>>
    where
        R: Repository<Category> + ?Sized,
    {
        match self.parent {
            Some(parent) => repo.get(parent),
            None => Ok(None),
        }
    }

    /// Walks up the hierarchy lazily, nearest parent first, one lookup per
    /// step. The category itself is not included.
    pub fn get_all_parents<'r, R>(&self, repo: &'r R) -> Ancestors<'r, R>
    where
        R: Repository<Category> + ?Sized,
    {
        let mut seen = HashSet::new();
        if self.pk != UNSET_PK {
            seen.insert(self.pk);
        }
        Ancestors {
            repo,
            next: self.parent,
            seen,
        }
    }

    /// Names from the root down to this category.
    pub fn path<R>(&self, repo: &R) -> Result<Vec<String>>
    where
        R: Repository<Category> + ?Sized,
    {
        let mut names = vec![self.name.clone()];
        for parent in self.get_all_parents(repo) {
            names.push(parent?.name);
        }
        names.reverse();
        Ok(names)
    }

    /// Every category below this one, at any depth, in depth-first pre-order.
    ///
    /// Loads the whole category set once. Sibling order follows the
    /// repository's listing order. Fails with [`Error::CategoryCycle`] when
    /// the walk comes back to a category it already listed.
    pub fn get_subcategories<R>(&self, repo: &R) -> Result<Vec<Category>>
    where
        R: Repository<Category> + ?Sized,
    {
        let mut children: HashMap<Option<Pk>, Vec<Category>> = HashMap::new();
        for category in repo.get_all()? {
            children.entry(category.parent).or_default().push(category);
        }

        let mut out = Vec::new();
        let mut visited = HashSet::from([self.pk]);
        let mut stack = children
            .remove(&Some(self.pk))
            .unwrap_or_default()
            .into_iter()
            .rev()
            .collect::<Vec<_>>();
        while let Some(category) = stack.pop() {
            if !visited.insert(category.pk) {
                return Err(Error::CategoryCycle(category.pk));
            }
            if let Some(below) = children.remove(&Some(category.pk)) {
                stack.extend(below.into_iter().rev());
            }
            out.push(category);
        }
        Ok(out)
    }

    /// Creates and stores a hierarchy from `(name, parent name)` pairs.
    ///
    /// Parents must come before their children. A repeated name shadows the
    /// earlier category of that name for later lookups.
    pub fn create_from_tree<R>(
        tree: &[(&str, Option<&str>)],
        repo: &mut R,
    ) -> Result<Vec<Category>>
    where
        R: Repository<Category> + ?Sized,
    {
        let mut by_name: HashMap<&str, Pk> = HashMap::new();
        let mut created = Vec::with_capacity(tree.len());
        for &(name, parent) in tree {
            let parent = match parent {
                Some(parent) => Some(
                    *by_name
                        .get(parent)
                        .ok_or_else(|| Error::UnknownParent(parent.to_string()))?,
                ),
                None => None,
            };
            let category = repo.add(Category {
                parent,
                ..Category::new(name)
            })?;
            by_name.insert(name, category.pk);
            created.push(category);
        }
        Ok(created)
    }
}

/// Lazy walk from a category up to its root. See [`Category::get_all_parents`].
///
/// Stops early when a parent id points at a category that no longer exists,
/// and yields [`Error::CategoryCycle`] once if an id repeats.
pub struct Ancestors<'r, R: ?Sized> {
    repo: &'r R,
    next: Option<Pk>,
    seen: HashSet<Pk>,
}

impl<R> Iterator for Ancestors<'_, R>
where
    R: Repository<Category> + ?Sized,
{
    type Item = Result<Category>;

    fn next(&mut self) -> Option<Self::Item> {
        let pk = self.next.take()?;
        if !self.seen.insert(pk) {
            return Some(Err(Error::CategoryCycle(pk)));
        }
        match self.repo.get(pk) {
            Ok(Some(parent)) => {
                self.next = parent.parent;
                Some(Ok(parent))
            }
            Ok(None) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

impl Entity for Category {
    const TABLE: &'static str = "category";
    const COLUMNS: &'static [Column] = &[
        Column::new("name", "TEXT NOT NULL"),
        Column::new("parent", "INTEGER"),
    ];

    fn pk(&self) -> Pk {
        self.pk
    }

    fn with_pk(self, pk: Pk) -> Self {
        Self { pk, ..self }
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![self.name.as_str().into(), self.parent.into()]
    }
}

impl FromRow for Category {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Category {
            pk: row.get("id")?,
            name: row.get("name")?,
            parent: row.get("parent")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::db::open_pool;
    use crate::repository::{Filter, MemoryRepository, SqliteRepository};

    fn names(categories: &[Category]) -> BTreeSet<&str> {
        categories.iter().map(|c| c.name.as_str()).collect()
    }

    fn chain(repo: &mut impl Repository<Category>, depth: usize) -> Category {
        let mut parent = None;
        let mut last = None;
        for i in 0..depth {
            let category = repo
                .add(Category {
                    parent,
                    ..Category::new(i.to_string())
                })
                .unwrap();
            parent = Some(category.pk);
            last = Some(category);
        }
        last.unwrap()
    }

    #[test]
    fn create_object() {
        let category = Category::new("name");
        assert_eq!(category.name, "name");
        assert_eq!(category.pk, UNSET_PK);
        assert_eq!(category.parent, None);

        let category = Category::with_parent("name", 1).with_pk(2);
        assert_eq!(category.parent, Some(1));
        assert_eq!(category.pk, 2);
    }

    #[test]
    fn get_parent() {
        let mut repo = MemoryRepository::<Category>::new();
        let parent = repo.add(Category::new("parent")).unwrap();
        let child = repo.add(Category::with_parent("name", parent.pk)).unwrap();

        assert_eq!(child.get_parent(&repo).unwrap(), Some(parent.clone()));
        assert_eq!(parent.get_parent(&repo).unwrap(), None);
    }

    #[test]
    fn get_all_parents_nearest_first() {
        let mut repo = MemoryRepository::<Category>::new();
        let leaf = chain(&mut repo, 5);

        let parents = leaf
            .get_all_parents(&repo)
            .map(|parent| parent.map(|c| c.name))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(parents, ["3", "2", "1", "0"]);
    }

    #[test]
    fn get_all_parents_is_lazy() {
        let mut repo = MemoryRepository::<Category>::new();
        let leaf = chain(&mut repo, 5);

        let mut parents = leaf.get_all_parents(&repo);
        assert_eq!(parents.next().unwrap().unwrap().name, "3");
        assert_eq!(parents.next().unwrap().unwrap().name, "2");
    }

    #[test]
    fn get_all_parents_of_root_is_empty() {
        let mut repo = MemoryRepository::<Category>::new();
        let root = repo.add(Category::new("root")).unwrap();
        assert_eq!(root.get_all_parents(&repo).count(), 0);
    }

    #[test]
    fn get_all_parents_stops_at_deleted_parent() {
        let mut repo = MemoryRepository::<Category>::new();
        let leaf = chain(&mut repo, 3);
        repo.delete(1).unwrap();

        let parents = leaf
            .get_all_parents(&repo)
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(names(&parents), BTreeSet::from(["1"]));
    }

    #[test]
    fn get_all_parents_reports_cycles() {
        let mut repo = MemoryRepository::<Category>::new();
        let a = repo.add(Category::new("a")).unwrap();
        let b = repo.add(Category::with_parent("b", a.pk)).unwrap();
        repo.update(&Category {
            parent: Some(b.pk),
            ..a.clone()
        })
        .unwrap();

        let mut parents = b.get_all_parents(&repo);
        assert_eq!(parents.next().unwrap().unwrap().name, "a");
        assert!(matches!(
            parents.next(),
            Some(Err(Error::CategoryCycle(pk))) if pk == b.pk
        ));
        assert!(parents.next().is_none());
    }

    #[test]
    fn path_is_root_first() {
        let mut repo = MemoryRepository::<Category>::new();
        let leaf = chain(&mut repo, 3);
        assert_eq!(leaf.path(&repo).unwrap(), ["0", "1", "2"]);
        assert_eq!(Category::new("alone").path(&repo).unwrap(), ["alone"]);
    }

    #[test]
    fn get_subcategories_of_chain() {
        let mut repo = MemoryRepository::<Category>::new();
        chain(&mut repo, 5);
        let root = repo
            .get_all_where(Some(&Filter::new().eq("name", "0")))
            .unwrap()
            .remove(0);

        let below = root.get_subcategories(&repo).unwrap();
        assert_eq!(names(&below), BTreeSet::from(["1", "2", "3", "4"]));
    }

    #[test]
    fn get_subcategories_of_branching_tree() {
        let mut repo = MemoryRepository::<Category>::new();
        let root = repo.add(Category::new("0")).unwrap();
        repo.add(Category::with_parent("1", root.pk)).unwrap();
        let two = repo.add(Category::with_parent("2", root.pk)).unwrap();
        repo.add(Category::with_parent("3", two.pk)).unwrap();
        repo.add(Category::with_parent("4", two.pk)).unwrap();
        repo.add(Category::new("other root")).unwrap();

        let below = root.get_subcategories(&repo).unwrap();
        assert_eq!(below.len(), 4);
        assert_eq!(names(&below), BTreeSet::from(["1", "2", "3", "4"]));

        let below_two = two.get_subcategories(&repo).unwrap();
        assert_eq!(names(&below_two), BTreeSet::from(["3", "4"]));
    }

    #[test]
    fn get_subcategories_is_pre_order() {
        let mut repo = MemoryRepository::<Category>::new();
        let root = repo.add(Category::new("root")).unwrap();
        let a = repo.add(Category::with_parent("a", root.pk)).unwrap();
        repo.add(Category::with_parent("b", root.pk)).unwrap();
        repo.add(Category::with_parent("a1", a.pk)).unwrap();

        let order = root
            .get_subcategories(&repo)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();
        assert_eq!(order, ["a", "a1", "b"]);
    }

    #[test]
    fn get_subcategories_reports_cycles() {
        let mut repo = MemoryRepository::<Category>::new();
        let root = repo.add(Category::new("root")).unwrap();
        let a = repo.add(Category::with_parent("a", root.pk)).unwrap();
        let b = repo.add(Category::with_parent("b", a.pk)).unwrap();
        repo.update(&Category {
            parent: Some(b.pk),
            ..a.clone()
        })
        .unwrap();

        assert!(matches!(
            a.get_subcategories(&repo),
            Err(Error::CategoryCycle(pk)) if pk == a.pk
        ));
        assert!(matches!(
            b.get_subcategories(&repo),
            Err(Error::CategoryCycle(pk)) if pk == b.pk
        ));
        // the cycle is detached from root once a points at b
        assert!(root.get_subcategories(&repo).unwrap().is_empty());
    }

    #[test]
    fn unsaved_category_has_no_subcategories() {
        let mut repo = MemoryRepository::<Category>::new();
        repo.add(Category::new("root")).unwrap();
        assert!(Category::new("draft").get_subcategories(&repo).unwrap().is_empty());
    }

    #[test]
    fn create_from_tree() {
        let mut repo = MemoryRepository::<Category>::new();
        let tree = [("parent", None), ("1", Some("parent")), ("2", Some("1"))];
        let created = Category::create_from_tree(&tree, &mut repo).unwrap();
        assert_eq!(created.len(), tree.len());

        let find = |name: &str| created.iter().find(|c| c.name == name).unwrap();
        let parent = find("parent");
        assert_eq!(parent.parent, None);
        assert_eq!(find("1").parent, Some(parent.pk));
        assert_eq!(find("2").parent, Some(find("1").pk));
        assert_eq!(repo.get_all().unwrap(), created);
    }

    #[test]
    fn create_from_tree_error() {
        let mut repo = MemoryRepository::<Category>::new();
        let tree = [("1", Some("parent")), ("parent", None)];
        let err = Category::create_from_tree(&tree, &mut repo).unwrap_err();
        assert!(matches!(err, Error::UnknownParent(ref name) if name == "parent"));
        assert!(repo.is_empty());
    }

    #[test]
    fn hierarchy_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_pool(&dir.path().join("books.sqlite")).unwrap();
        let mut repo = SqliteRepository::<Category>::new(pool).unwrap();

        let tree = [
            ("food", None),
            ("meat", Some("food")),
            ("beef", Some("meat")),
            ("dairy", Some("food")),
            ("books", None),
        ];
        let created = Category::create_from_tree(&tree, &mut repo).unwrap();
        let food = &created[0];
        let beef = &created[2];

        let parents = beef
            .get_all_parents(&repo)
            .map(|parent| parent.map(|c| c.name))
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(parents, ["meat", "food"]);

        let below = food.get_subcategories(&repo).unwrap();
        assert_eq!(names(&below), BTreeSet::from(["meat", "beef", "dairy"]));
    }
}
