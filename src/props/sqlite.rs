//! SQLite backed [`PropertyStore`].
//!
//! One table, `{prefix}properties`, with the natural key
//! (userid, propertypath, propertyname) enforced by a unique index so
//! writes can be done as a single upsert.
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use rusqlite::{params, params_from_iter, Connection};

use crate::errors::{PropError, PropResult};
use crate::props::{PropertyChange, PropertyMap, PropertyRecord, PropertyStore};
use crate::util::is_same_or_below;

// Stay well below SQLITE_MAX_VARIABLE_NUMBER for IN (...) lists.
const MAX_IN_PARAMS: usize = 500;
const NO_NAMES: &[String] = &[];

lazy_static! {
    static ref RE_TABLE_PREFIX: Regex = Regex::new(r"^[A-Za-z0-9_]*$").unwrap();
}

/// Options for [`SqliteStore`].
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Prepended to the table name, for sharing a database with other
    /// applications. Only `[A-Za-z0-9_]` is allowed.
    pub table_prefix: String,
}

impl StoreOptions {
    pub fn table_prefix(self, prefix: impl Into<String>) -> Self {
        let mut this = self;
        this.table_prefix = prefix.into();
        this
    }
}

// SQL text, built once per store because the table name is configurable.
struct Statements {
    select: String,
    upsert: String,
    delete_one: String,
    delete_path: String,
    delete_tree: String,
    move_tree: String,
    records: String,
}

impl Statements {
    fn new(table: &str) -> Statements {
        Statements {
            select: format!(
                "SELECT propertyname, propertyvalue FROM {table} \
                 WHERE userid = ? AND propertypath = ?"
            ),
            upsert: format!(
                "INSERT INTO {table} (userid, propertypath, propertyname, propertyvalue) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT (userid, propertypath, propertyname) \
                 DO UPDATE SET propertyvalue = excluded.propertyvalue"
            ),
            delete_one: format!(
                "DELETE FROM {table} \
                 WHERE userid = ?1 AND propertypath = ?2 AND propertyname = ?3"
            ),
            delete_path: format!("DELETE FROM {table} WHERE userid = ?1 AND propertypath = ?2"),
            delete_tree: format!(
                "DELETE FROM {table} WHERE userid = ?1 \
                 AND (propertypath = ?2 OR substr(propertypath, 1, ?3) = ?4)"
            ),
            move_tree: format!(
                "UPDATE {table} SET propertypath = ?1 || substr(propertypath, ?2) \
                 WHERE userid = ?3 \
                 AND (propertypath = ?4 OR substr(propertypath, 1, ?5) = ?6)"
            ),
            records: format!(
                "SELECT propertypath, propertyname, propertyvalue FROM {table} \
                 WHERE userid = ?1 ORDER BY propertypath, propertyname"
            ),
        }
    }
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: String,
    sql: Statements,
}

impl SqliteStore {
    /// Open (and create if needed) a property database on disk.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> PropResult<SqliteStore> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(Duration::from_secs(5))?;
        SqliteStore::init(conn, options)
    }

    /// Private in-memory database, gone when the store is dropped.
    pub fn open_in_memory(options: StoreOptions) -> PropResult<SqliteStore> {
        SqliteStore::init(Connection::open_in_memory()?, options)
    }

    fn init(conn: Connection, options: StoreOptions) -> PropResult<SqliteStore> {
        if !RE_TABLE_PREFIX.is_match(&options.table_prefix) {
            return Err(PropError::InvalidTablePrefix(options.table_prefix));
        }
        let table = format!("{}properties", options.table_prefix);
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                userid TEXT NOT NULL,
                propertypath TEXT NOT NULL,
                propertyname TEXT NOT NULL,
                propertyvalue TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS {table}_key
                ON {table} (userid, propertypath, propertyname);"
        ))?;
        debug!("property store ready, table {}", table);

        Ok(SqliteStore {
            conn: Mutex::new(conn),
            sql: Statements::new(&table),
            table,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Every property row of one user, ordered by path and name.
    pub fn records(&self, user: &str) -> PropResult<Vec<PropertyRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&self.sql.records)?;
        let rows = stmt.query_map(params![user], |row| {
            Ok(PropertyRecord {
                user_id: user.to_string(),
                path: row.get(0)?,
                name: row.get(1)?,
                value: row.get(2)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }
}

// "/a" -> ("/a/", 3). Lengths are in characters, like SQLite's substr().
fn subtree_prefix(path: &str) -> (String, i64) {
    let prefix = if path == "/" {
        path.to_string()
    } else {
        format!("{}/", path)
    };
    let len = prefix.chars().count() as i64;
    (prefix, len)
}

impl PropertyStore for SqliteStore {
    fn select(&self, user: &str, path: &str, names: Option<&[String]>) -> PropResult<PropertyMap> {
        let conn = self.conn.lock();
        let mut props = PropertyMap::new();

        let chunks: Vec<&[String]> = match names {
            None => vec![NO_NAMES],
            Some([]) => return Ok(props),
            Some(names) => names.chunks(MAX_IN_PARAMS).collect(),
        };
        for chunk in chunks {
            let mut sql = self.sql.select.clone();
            if !chunk.is_empty() {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                sql.push_str(&format!(" AND propertyname IN ({})", placeholders));
            }
            let args = [user, path]
                .into_iter()
                .chain(chunk.iter().map(|n| n.as_str()));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (name, value) = row?;
                props.insert(name, value);
            }
        }
        trace!("select {} {}: {} properties", user, path, props.len());
        Ok(props)
    }

    fn apply(&self, user: &str, path: &str, changes: &[PropertyChange]) -> PropResult<()> {
        let mut conn = self.conn.lock();
        // Dropping the transaction without commit rolls it back, so an
        // early return on any statement error undoes the whole batch.
        let tx = conn.transaction()?;
        {
            let mut upsert = tx.prepare(&self.sql.upsert)?;
            let mut delete = tx.prepare(&self.sql.delete_one)?;
            for change in changes {
                match &change.value {
                    Some(value) => {
                        upsert.execute(params![user, path, change.name, value])?;
                    }
                    None => {
                        delete.execute(params![user, path, change.name])?;
                    }
                }
            }
        }
        tx.commit()?;
        debug!("applied {} property changes to {} {}", changes.len(), user, path);
        Ok(())
    }

    fn delete_path(&self, user: &str, path: &str) -> PropResult<usize> {
        let conn = self.conn.lock();
        let n = conn.execute(&self.sql.delete_path, params![user, path])?;
        debug!("deleted {} properties of {} {}", n, user, path);
        Ok(n)
    }

    fn move_path(&self, user: &str, from: &str, to: &str) -> PropResult<usize> {
        // The root cannot move, and a tree cannot move into itself or
        // onto one of its ancestors.
        if from == "/" || is_same_or_below(to, from) || is_same_or_below(from, to) {
            debug!("not moving properties of {} from {} to {}", user, from, to);
            return Ok(0);
        }
        let (from_prefix, from_len) = subtree_prefix(from);
        let (to_prefix, to_len) = subtree_prefix(to);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(&self.sql.delete_tree, params![user, to, to_len, to_prefix])?;
        let n = tx.execute(
            &self.sql.move_tree,
            params![
                to,
                from.chars().count() as i64 + 1,
                user,
                from,
                from_len,
                from_prefix
            ],
        )?;
        tx.commit()?;
        debug!("moved {} properties of {} from {} to {}", n, user, from, to);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory(StoreOptions::default()).unwrap()
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_upsert_and_select() {
        let store = store();
        store
            .apply("u1", "/doc.txt", &[PropertyChange::set("color", "red")])
            .unwrap();
        store
            .apply("u1", "/doc.txt", &[PropertyChange::set("color", "blue")])
            .unwrap();

        let props = store.select("u1", "/doc.txt", None).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["color"], "blue");
        assert_eq!(store.records("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_select_filtered() {
        let store = store();
        let changes = [
            PropertyChange::set("a", "1"),
            PropertyChange::set("b", "2"),
            PropertyChange::set("c", "3"),
        ];
        store.apply("u1", "/x", &changes).unwrap();

        let props = store.select("u1", "/x", Some(&names(&["a", "c", "zz"]))).unwrap();
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(store.select("u1", "/x", Some(&[])).unwrap().is_empty());
    }

    #[test]
    fn test_select_many_names() {
        let store = store();
        let changes: Vec<_> = (0..1200)
            .map(|i| PropertyChange::set(format!("p{}", i), i.to_string()))
            .collect();
        store.apply("u1", "/big", &changes).unwrap();

        let wanted: Vec<String> = changes.iter().map(|c| c.name.clone()).collect();
        let props = store.select("u1", "/big", Some(&wanted)).unwrap();
        assert_eq!(props.len(), 1200);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let store = store();
        store
            .apply("u1", "/x", &[PropertyChange::remove("nothing")])
            .unwrap();
        assert!(store.records("u1").unwrap().is_empty());
    }

    #[test]
    fn test_batch_is_atomic() {
        let store = store();
        store
            .apply("u1", "/x", &[PropertyChange::set("keep", "old")])
            .unwrap();
        store
            .conn
            .lock()
            .execute_batch(
                "CREATE TRIGGER refuse_boom BEFORE INSERT ON properties \
                 WHEN NEW.propertyname = 'boom' \
                 BEGIN SELECT RAISE(ABORT, 'boom refused'); END;",
            )
            .unwrap();

        let res = store.apply(
            "u1",
            "/x",
            &[
                PropertyChange::set("keep", "new"),
                PropertyChange::set("first", "1"),
                PropertyChange::set("boom", "!"),
            ],
        );
        assert!(matches!(res, Err(PropError::Db(_))));

        let props = store.select("u1", "/x", None).unwrap();
        assert_eq!(props.len(), 1);
        assert_eq!(props["keep"], "old");
    }

    #[test]
    fn test_move_tree() {
        let store = store();
        let set = |path: &str, name: &str| {
            store
                .apply("u1", path, &[PropertyChange::set(name, "v")])
                .unwrap();
        };
        set("/dir", "a");
        set("/dir/file", "b");
        set("/dir/sub/deep", "c");
        set("/dirt", "d");

        assert_eq!(store.move_path("u1", "/dir", "/moved").unwrap(), 3);

        let paths: Vec<String> = store
            .records("u1")
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(
            paths,
            vec!["/dirt", "/moved", "/moved/file", "/moved/sub/deep"]
        );
    }

    #[test]
    fn test_move_replaces_destination() {
        let store = store();
        store
            .apply("u1", "/a", &[PropertyChange::set("color", "red")])
            .unwrap();
        store
            .apply("u1", "/b", &[PropertyChange::set("color", "green")])
            .unwrap();
        store
            .apply("u1", "/b/child", &[PropertyChange::set("x", "y")])
            .unwrap();

        store.move_path("u1", "/a", "/b").unwrap();
        let records = store.records("u1").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/b");
        assert_eq!(records[0].value, "red");
    }

    #[test]
    fn test_move_refuses_overlapping_paths() {
        let store = store();
        store
            .apply("u1", "/a", &[PropertyChange::set("color", "red")])
            .unwrap();
        store
            .apply("u1", "/x", &[PropertyChange::set("color", "blue")])
            .unwrap();

        assert_eq!(store.move_path("u1", "/a", "/a").unwrap(), 0);
        assert_eq!(store.move_path("u1", "/a", "/a/b").unwrap(), 0);
        assert_eq!(store.move_path("u1", "/a", "/").unwrap(), 0);
        assert_eq!(store.move_path("u1", "/", "/b").unwrap(), 0);

        let paths: Vec<String> = store
            .records("u1")
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["/a", "/x"]);
    }

    #[test]
    fn test_users_are_isolated() {
        let store = store();
        store
            .apply("u1", "/doc.txt", &[PropertyChange::set("color", "red")])
            .unwrap();
        store
            .apply("u2", "/doc.txt", &[PropertyChange::set("color", "blue")])
            .unwrap();

        store.move_path("u1", "/doc.txt", "/archive/doc.txt").unwrap();
        assert_eq!(store.select("u2", "/doc.txt", None).unwrap()["color"], "blue");

        assert_eq!(store.delete_path("u2", "/doc.txt").unwrap(), 1);
        assert_eq!(
            store.select("u1", "/archive/doc.txt", None).unwrap()["color"],
            "red"
        );
    }

    #[test]
    fn test_table_prefix() {
        let store = SqliteStore::open_in_memory(StoreOptions::default().table_prefix("oc_")).unwrap();
        assert_eq!(store.table(), "oc_properties");

        let res = SqliteStore::open_in_memory(StoreOptions::default().table_prefix("x; DROP"));
        assert!(matches!(res, Err(PropError::InvalidTablePrefix(_))));
    }
}
