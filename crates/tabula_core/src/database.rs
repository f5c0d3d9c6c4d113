//! The database handle and its record operations.

use crate::config::Config;
use crate::counter;
use crate::crypto::CryptoManager;
use crate::error::{CoreError, CoreResult};
use crate::index::{index_key, IndexEntry, IndexLog, SecondaryIndex};
use crate::path::{parse_record_file_name, PathResolver, Table};
use crate::query::{evaluate, Where};
use crate::resource::{short_name, Resource};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tabula_codec::{decode_record, encode_record, from_cbor, from_value, to_value, Value};
use tabula_storage::{FileBackend, StorageBackend};
use tracing::error;

/// An open tabula directory.
///
/// Records of a [`Resource`] type live in `<base>/<Model>/`, one file per
/// record named by its zero-padded ID. Indexed fields are tracked in an
/// in-memory [`SecondaryIndex`] backed by the append-only `.idxlog`.
///
/// A single mutex serializes every operation across all models. The
/// counter and the index are only touched while it is held.
///
/// # Example
///
/// ```rust,no_run
/// use serde::{Deserialize, Serialize};
/// use tabula_core::{Config, Database, Resource, Value, Where};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct User {
///     id: i64,
///     name: String,
///     age: u32,
/// }
///
/// impl Resource for User {
///     fn model() -> String {
///         "User".into()
///     }
///     fn id(&self) -> i64 {
///         self.id
///     }
///     fn set_id(&mut self, id: i64) {
///         self.id = id;
///     }
///     fn indexed_fields(&self) -> Vec<(&'static str, Value)> {
///         vec![("Name", Value::from(&self.name)), ("Age", Value::from(self.age))]
///     }
/// }
///
/// let db = Database::open(Config::new("/tmp/tabula"))?;
///
/// let mut ann = User { name: "Ann".into(), age: 30, ..User::default() };
/// let id = db.create(&mut ann)?;
///
/// let found: User = db.find(&[Where::new("Age", "30")])?;
/// assert_eq!(found.id, id);
/// # Ok::<(), tabula_core::CoreError>(())
/// ```
pub struct Database {
    config: Config,
    paths: PathResolver,
    backend: Box<dyn StorageBackend>,
    crypto: Option<CryptoManager>,
    index_log: IndexLog,
    index: Mutex<SecondaryIndex>,
}

/// Collects what one operation did and reports it when it ends.
struct Trace {
    op: &'static str,
    model: String,
    id: i64,
    path: Option<PathBuf>,
    resource: Option<String>,
    index_updates: Vec<String>,
}

impl Trace {
    fn new(op: &'static str, model: impl Into<String>) -> Self {
        Self {
            op,
            model: model.into(),
            id: 0,
            path: None,
            resource: None,
            index_updates: Vec::new(),
        }
    }

    fn record(&mut self, entries: &[IndexEntry]) {
        self.index_updates.extend(entries.iter().map(ToString::to_string));
    }

    fn finish<T>(self, verbose: bool, result: CoreResult<T>) -> CoreResult<T> {
        let error = result.as_ref().err().map(ToString::to_string);
        macro_rules! emit {
            ($level:ident) => {
                tracing::$level!(
                    op = self.op,
                    model = %self.model,
                    id = self.id,
                    path = ?self.path,
                    resource = self.resource.as_deref(),
                    index_updates = ?self.index_updates,
                    error = error.as_deref(),
                    "operation"
                )
            };
        }
        if verbose {
            emit!(info);
        } else {
            emit!(debug);
        }
        result
    }
}

impl Database {
    /// Opens the directory described by `config` on the local file system.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unusable configuration,
    /// `EncryptionNotEnabled` if encryption is requested but compiled out,
    /// and `IndexLogCorruption` if the index log cannot be replayed.
    pub fn open(config: Config) -> CoreResult<Self> {
        Self::open_with_backend(config, Box::new(FileBackend::new()))
    }

    /// Opens a database over an arbitrary storage backend.
    pub fn open_with_backend(config: Config, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        config.validate()?;

        let crypto = match (config.encrypted, config.passphrase.as_deref()) {
            (true, Some(passphrase)) => Some(CryptoManager::from_passphrase(passphrase)?),
            _ => None,
        };

        let paths = PathResolver::new(&config.path);
        backend.create_dir_all(paths.base())?;

        let index_log = IndexLog::new(paths.index_log());
        let index = index_log.replay(backend.as_ref())?;

        Ok(Self {
            config,
            paths,
            backend,
            crypto,
            index_log,
            index: Mutex::new(index),
        })
    }

    /// Returns the configuration this database was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the base directory.
    pub fn base(&self) -> &Path {
        self.paths.base()
    }

    /// Stores a new record and assigns it the next ID of its model.
    ///
    /// The record file is written before the counter, and the counter
    /// before the index log.
    pub fn create<R: Resource>(&self, resource: &mut R) -> CoreResult<i64> {
        let mut index = self.index.lock();
        let mut trace = Trace::new("create", R::model());
        let result = self.create_locked(&mut index, resource, &mut trace);
        trace.resource = Some(format!("{resource:?}"));
        trace.finish(self.config.log, result)
    }

    fn create_locked<R: Resource>(
        &self,
        index: &mut SecondaryIndex,
        resource: &mut R,
        trace: &mut Trace,
    ) -> CoreResult<i64> {
        let table = self.paths.table(&trace.model);
        counter::ensure_metadata_dir(self.backend.as_ref(), &table)?;

        let id = counter::read(self.backend.as_ref(), &table)? + 1;
        resource.set_id(id);
        trace.id = id;

        let path = table.record(id)?;
        trace.path = Some(path.clone());
        let sealed = self.seal(&encode_record(resource)?)?;
        self.backend.write(&path, &sealed)?;
        counter::write(self.backend.as_ref(), &table, id)?;

        // A reset counter hands out IDs that may still be indexed.
        self.reindex(index, resource, id, trace)?;
        Ok(id)
    }

    /// Reads the record with `id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidId` for IDs below 1, `TableNotFound` if the model
    /// has no table, `ResourceNotFound` if the record is absent and
    /// `DecryptionFailed` if the record cannot be opened.
    pub fn read<R: Resource>(&self, id: i64) -> CoreResult<R> {
        let _index = self.index.lock();
        let mut trace = Trace::new("read", R::model());
        trace.id = id;
        let table = self.paths.table(&trace.model);
        let result = self.load::<R>(&table, &trace.model, id);
        trace.path = table.record(id).ok();
        if let Ok(record) = &result {
            trace.resource = Some(format!("{record:?}"));
        }
        trace.finish(self.config.log, result)
    }

    /// Reads every record of a model in ascending ID order.
    pub fn read_all<R: Resource>(&self) -> CoreResult<Vec<R>> {
        let mut records = Vec::new();
        self.read_all_with(|record: R| records.push(record))?;
        Ok(records)
    }

    /// Passes every record of a model to `callback`, in ascending ID order.
    ///
    /// Stops at the first record that cannot be read. The callback runs
    /// while the database lock is held and must not call back into the
    /// database.
    pub fn read_all_with<R: Resource>(&self, mut callback: impl FnMut(R)) -> CoreResult<()> {
        let _index = self.index.lock();
        let mut trace = Trace::new("read_all", R::model());
        let table = self.paths.table(&trace.model);
        trace.path = Some(table.dir().to_path_buf());

        let result = self.list_ids(&table).and_then(|ids| {
            for id in ids {
                trace.id = id;
                callback(self.load::<R>(&table, &trace.model, id)?);
            }
            Ok(())
        });
        trace.finish(self.config.log, result)
    }

    /// Returns the first record matching `clauses`.
    ///
    /// Which record comes first among several matches is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `MissingClauses` for an empty clause list and `NoMatch`
    /// when no record matches.
    pub fn find<R: Resource>(&self, clauses: &[Where]) -> CoreResult<R> {
        let index = self.index.lock();
        let mut trace = Trace::new("find", R::model());
        let table = self.paths.table(&trace.model);

        let result = evaluate(&index, &trace.model, clauses, true).and_then(|ids| {
            let id = ids.first().copied().ok_or_else(|| CoreError::no_match(&trace.model))?;
            trace.id = id;
            trace.path = table.record(id).ok();
            self.load::<R>(&table, &trace.model, id)
        });
        if let Ok(record) = &result {
            trace.resource = Some(format!("{record:?}"));
        }
        trace.finish(self.config.log, result)
    }

    /// Returns every record matching `clauses`.
    pub fn find_all<R: Resource>(&self, clauses: &[Where]) -> CoreResult<Vec<R>> {
        let mut records = Vec::new();
        self.find_all_with(clauses, |record: R| records.push(record))?;
        Ok(records)
    }

    /// Passes every record matching `clauses` to `callback`.
    ///
    /// Like [`read_all_with`](Self::read_all_with), the callback runs under
    /// the database lock.
    pub fn find_all_with<R: Resource>(
        &self,
        clauses: &[Where],
        mut callback: impl FnMut(R),
    ) -> CoreResult<()> {
        let index = self.index.lock();
        let mut trace = Trace::new("find_all", R::model());
        let table = self.paths.table(&trace.model);
        trace.path = Some(table.dir().to_path_buf());

        let result = evaluate(&index, &trace.model, clauses, false).and_then(|ids| {
            for id in ids {
                trace.id = id;
                callback(self.load::<R>(&table, &trace.model, id)?);
            }
            Ok(())
        });
        trace.finish(self.config.log, result)
    }

    /// Overwrites an existing record with `resource`.
    ///
    /// Index keys that changed are removed and the new ones added.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no record with the resource's ID exists.
    pub fn replace<R: Resource>(&self, resource: &R) -> CoreResult<()> {
        let mut index = self.index.lock();
        let mut trace = Trace::new("replace", R::model());
        trace.id = resource.id();
        trace.resource = Some(format!("{resource:?}"));
        let result = self.replace_locked(&mut index, resource, resource.id(), &mut trace);
        trace.finish(self.config.log, result)
    }

    fn replace_locked<R: Resource>(
        &self,
        index: &mut SecondaryIndex,
        resource: &R,
        id: i64,
        trace: &mut Trace,
    ) -> CoreResult<()> {
        let table = self.paths.table(&trace.model);
        let path = table.record(id)?;
        trace.path = Some(path.clone());
        if !self.backend.exists(&path)? {
            return Err(CoreError::resource_not_found(&trace.model, id));
        }

        let sealed = self.seal(&encode_record(resource)?)?;
        self.backend.write(&path, &sealed)?;
        self.reindex(index, resource, id, trace)
    }

    /// Overwrites the fields of record `id` that `patch` sets.
    ///
    /// Fields of `patch` that are zero or equal to the field of
    /// `R::default()` keep their stored value, so a patch built with
    /// `..R::default()` only changes what it names. The record keeps `id`
    /// whatever ID `patch` carries. Returns the merged record.
    pub fn update<R: Resource>(&self, patch: &R, id: i64) -> CoreResult<R> {
        let mut index = self.index.lock();
        let mut trace = Trace::new("update", R::model());
        trace.id = id;
        let result = self.update_locked(&mut index, patch, id, &mut trace);
        if let Ok(record) = &result {
            trace.resource = Some(format!("{record:?}"));
        }
        trace.finish(self.config.log, result)
    }

    fn update_locked<R: Resource>(
        &self,
        index: &mut SecondaryIndex,
        patch: &R,
        id: i64,
        trace: &mut Trace,
    ) -> CoreResult<R> {
        let table = self.paths.table(&trace.model);
        let stored: R = self.load(&table, &trace.model, id)?;

        let merged = to_value(&stored)?.merge_patch(&to_value(patch)?, &to_value(&R::default())?);
        let mut record: R = from_value(&merged)?;
        record.set_id(id);

        self.replace_locked(index, &record, id, trace)?;
        Ok(record)
    }

    /// Deletes the record `resource` refers to, by its ID.
    pub fn delete<R: Resource>(&self, resource: &R) -> CoreResult<()> {
        self.delete_by_id::<R>(resource.id())
    }

    /// Deletes record `id` and removes it from the index.
    pub fn delete_by_id<R: Resource>(&self, id: i64) -> CoreResult<()> {
        let mut index = self.index.lock();
        let mut trace = Trace::new("delete", R::model());
        trace.id = id;
        let table = self.paths.table(&trace.model);
        let result = self.delete_locked(&mut index, &table, id, &mut trace);
        trace.finish(self.config.log, result)
    }

    fn delete_locked(
        &self,
        index: &mut SecondaryIndex,
        table: &Table,
        id: i64,
        trace: &mut Trace,
    ) -> CoreResult<()> {
        let path = table.record(id)?;
        trace.path = Some(path.clone());
        if !self.backend.is_dir(table.dir())? {
            return Err(CoreError::TableNotFound {
                path: table.dir().to_path_buf(),
            });
        }
        match self.backend.remove(&path) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                return Err(CoreError::resource_not_found(&trace.model, id))
            }
            Err(e) => return Err(e.into()),
        }

        let entries: Vec<IndexEntry> = index
            .keys_for(&trace.model, id)
            .iter()
            .map(|key| IndexEntry::remove(key.as_str(), id))
            .collect();
        self.commit_index(index, &entries, trace)
    }

    /// Deletes every record of a model. Returns how many were deleted.
    ///
    /// The counter is left as is.
    pub fn delete_all<R: Resource>(&self) -> CoreResult<usize> {
        let mut index = self.index.lock();
        let mut trace = Trace::new("delete_all", R::model());
        let table = self.paths.table(&trace.model);
        trace.path = Some(table.dir().to_path_buf());

        let result = self.list_ids(&table).and_then(|ids| {
            for &id in &ids {
                trace.id = id;
                self.delete_locked(&mut index, &table, id, &mut trace)?;
            }
            Ok(ids.len())
        });
        trace.path = Some(table.dir().to_path_buf());
        trace.finish(self.config.log, result)
    }

    /// Resets the counter of a model to zero.
    ///
    /// Stored records are left in place; the next `create` reuses ID 1,
    /// overwrites whatever is stored there and replaces its index keys.
    pub fn reset_counter<R: Resource>(&self) -> CoreResult<()> {
        let _index = self.index.lock();
        let mut trace = Trace::new("reset_counter", R::model());
        let table = self.paths.table(&trace.model);
        trace.path = Some(table.counter());

        let result = counter::ensure_metadata_dir(self.backend.as_ref(), &table)
            .and_then(|()| counter::write(self.backend.as_ref(), &table, 0));
        trace.finish(self.config.log, result)
    }

    /// Returns the current counter of a model: the last ID handed out.
    pub fn counter<R: Resource>(&self) -> CoreResult<i64> {
        let _index = self.index.lock();
        let table = self.paths.table(&R::model());
        counter::read(self.backend.as_ref(), &table)
    }

    /// Reads the record of type `O` that owns `resource`.
    ///
    /// The owner ID comes from the `(name, id)` pair of
    /// [`Resource::owner_ids`] whose name is the short type name of `O`.
    ///
    /// # Errors
    ///
    /// Returns `OwnerNotFound` if `resource` has no ID for that owner type.
    pub fn get_owner<R: Resource, O: Resource>(&self, resource: &R) -> CoreResult<O> {
        let owner_model = O::model();
        let owner = short_name(&owner_model);
        let id = resource
            .owner_ids()
            .into_iter()
            .find(|(name, _)| *name == owner)
            .map(|(_, id)| id)
            .ok_or_else(|| CoreError::OwnerNotFound {
                model: R::model(),
                owner: owner.to_string(),
            })?;
        self.read::<O>(id)
    }

    /// Returns the decrypted envelope of record `id` in `table_dir`.
    ///
    /// # Panics
    ///
    /// Panics if `table_dir` lies outside the base directory.
    pub fn read_raw(&self, table_dir: &Path, id: i64) -> CoreResult<Vec<u8>> {
        let _index = self.index.lock();
        let table = self.paths.table_at(table_dir);
        let model = table_model(&table);
        let mut trace = Trace::new("read_raw", model.as_str());
        trace.id = id;
        trace.path = table.record(id).ok();
        let result = self.load_raw(&table, &model, id);
        trace.finish(self.config.log, result)
    }

    /// Decodes record `id` in `table_dir` without knowing its type.
    pub fn read_value(&self, table_dir: &Path, id: i64) -> CoreResult<Value> {
        Ok(from_cbor(&self.read_raw(table_dir, id)?)?)
    }

    /// Lists the record IDs stored in `table_dir`, ascending.
    ///
    /// Entries whose names are not record IDs are skipped.
    pub fn list_record_ids(&self, table_dir: &Path) -> CoreResult<Vec<i64>> {
        let _index = self.index.lock();
        let table = self.paths.table_at(table_dir);
        self.list_ids(&table)
    }

    /// Rewrites the index log as one entry per live index entry.
    ///
    /// Returns the number of entries written.
    pub fn compact_index_log(&self) -> CoreResult<usize> {
        let index = self.index.lock();
        let mut trace = Trace::new("compact_index_log", "");
        trace.path = Some(self.index_log.path().to_path_buf());
        let result = self.index_log.compact(self.backend.as_ref(), &index);
        trace.finish(self.config.log, result)
    }

    /// Returns the IDs indexed under `field = value` for a model.
    pub fn indexed_ids<R: Resource>(&self, field: &str, value: impl Into<Value>) -> Vec<i64> {
        let index = self.index.lock();
        index.ids(&index_key(&R::model(), field, &value.into())).to_vec()
    }

    fn load<R: Resource>(&self, table: &Table, model: &str, id: i64) -> CoreResult<R> {
        let bytes = self.load_raw(table, model, id)?;
        Ok(decode_record(&bytes)?)
    }

    fn load_raw(&self, table: &Table, model: &str, id: i64) -> CoreResult<Vec<u8>> {
        let path = table.record(id)?;
        if !self.backend.is_dir(table.dir())? {
            return Err(CoreError::TableNotFound {
                path: table.dir().to_path_buf(),
            });
        }
        let sealed = match self.backend.read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Err(CoreError::resource_not_found(model, id)),
            Err(e) => return Err(e.into()),
        };
        self.open_sealed(sealed)
    }

    fn list_ids(&self, table: &Table) -> CoreResult<Vec<i64>> {
        if !self.backend.is_dir(table.dir())? {
            return Err(CoreError::TableNotFound {
                path: table.dir().to_path_buf(),
            });
        }
        let mut ids: Vec<i64> = self
            .backend
            .list(table.dir())?
            .into_iter()
            .filter(|entry| !entry.is_dir)
            .filter_map(|entry| parse_record_file_name(&entry.name))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn seal(&self, bytes: &[u8]) -> CoreResult<Vec<u8>> {
        match &self.crypto {
            Some(crypto) => crypto.encrypt(bytes),
            None => Ok(bytes.to_vec()),
        }
    }

    fn open_sealed(&self, bytes: Vec<u8>) -> CoreResult<Vec<u8>> {
        match &self.crypto {
            Some(crypto) => crypto.decrypt(&bytes),
            None => Ok(bytes),
        }
    }

    /// Brings the index keys of record `id` in line with `resource`.
    fn reindex<R: Resource>(
        &self,
        index: &mut SecondaryIndex,
        resource: &R,
        id: i64,
        trace: &mut Trace,
    ) -> CoreResult<()> {
        let old = index.keys_for(&trace.model, id).to_vec();
        let new = indexed_keys(&trace.model, resource);

        let mut entries: Vec<IndexEntry> = old
            .iter()
            .filter(|key| !new.contains(key))
            .map(|key| IndexEntry::remove(key.as_str(), id))
            .collect();
        entries.extend(
            new.into_iter()
                .filter(|key| !old.contains(key))
                .map(|key| IndexEntry::add(key, id)),
        );
        self.commit_index(index, &entries, trace)
    }

    /// Logs `entries` and then applies them in memory.
    fn commit_index(
        &self,
        index: &mut SecondaryIndex,
        entries: &[IndexEntry],
        trace: &mut Trace,
    ) -> CoreResult<()> {
        if let Err(e) = self.index_log.append(self.backend.as_ref(), entries) {
            error!(path = %self.index_log.path().display(), error = %e, "index log append failed");
            return Err(e);
        }
        for entry in entries {
            index.apply(entry);
        }
        trace.record(entries);
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("encrypted", &self.crypto.is_some())
            .field("indexed_keys", &self.index.try_lock().map(|index| index.len()))
            .finish_non_exhaustive()
    }
}

/// Index keys of the indexed fields of `resource`, duplicates dropped.
fn indexed_keys<R: Resource>(model: &str, resource: &R) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for (field, value) in resource.indexed_fields() {
        let key = index_key(model, field, &value);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Model name of a table given by path: its directory name.
fn table_model(table: &Table) -> String {
    table
        .dir()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
