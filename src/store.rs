//! Whole-file JSON persistence.
//!
//! Every collection lives in one JSON array file. Reads materialize the full
//! list and never fail: a missing or unreadable file is an empty collection.
//! Writes replace the whole file through a sibling temp file and a rename.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::error::{EduError, EduResult};

/// An entity stored in a [`Collection`].
pub trait Record: Serialize + DeserializeOwned + Clone {
    const ENTITY: &'static str;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> JsonFile {
        JsonFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates parent directories and writes `initial` if the file is absent.
    pub fn ensure(&self, initial: &str) -> EduResult<()> {
        if self.path.is_file() {
            return Ok(());
        }
        write_atomic(&self.path, initial.as_bytes())
    }

    pub fn load<T: DeserializeOwned>(&self) -> Vec<T> {
        self.load_value::<Vec<T>>()
    }

    pub fn save<T: Serialize>(&self, items: &[T]) -> EduResult<()> {
        self.save_value(items)
    }

    pub fn load_value<T: DeserializeOwned + Default>(&self) -> T {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!("Unable to read {}: {}", self.path.display(), e);
                return T::default();
            }
        };
        if text.trim().is_empty() {
            return T::default();
        }
        match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    "Ignoring corrupt data file {}: {}",
                    self.path.display(),
                    e
                );
                T::default()
            }
        }
    }

    pub fn save_value<T: Serialize + ?Sized>(&self, value: &T) -> EduResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        write_atomic(&self.path, &bytes)
    }
}

/// Writes `bytes` next to `path` and renames the result over it.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> EduResult<()> {
    let wrap = |source| EduError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(wrap)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".writing");
    let tmp = PathBuf::from(tmp_name);

    let written = std::fs::File::create(&tmp).and_then(|mut f| {
        f.write_all(bytes)?;
        f.sync_all()
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(wrap(e));
    }

    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        wrap(e)
    })
}

/// A typed view over one JSON array file.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    file: JsonFile,
    _marker: PhantomData<T>,
}

impl<T: Record> Collection<T> {
    pub fn open(path: impl Into<PathBuf>) -> EduResult<Collection<T>> {
        let file = JsonFile::new(path);
        file.ensure("[]")?;
        Ok(Collection {
            file,
            _marker: PhantomData,
        })
    }

    pub fn all(&self) -> Vec<T> {
        self.file.load()
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.all().into_iter().find(|it| it.id() == id)
    }

    pub fn filter(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        self.all().into_iter().filter(|it| pred(it)).collect()
    }

    pub fn insert(&self, item: T) -> EduResult<T> {
        let mut items = self.all();
        items.push(item.clone());
        self.file.save(&items)?;
        Ok(item)
    }

    /// Loads everything, lets `f` see the full list before the new item is
    /// built, then appends and saves.
    pub fn insert_with(&self, f: impl FnOnce(&[T]) -> EduResult<T>) -> EduResult<T> {
        let mut items = self.all();
        let item = f(&items)?;
        items.push(item.clone());
        self.file.save(&items)?;
        Ok(item)
    }

    /// Swaps in `item` for the stored record with the same id and returns the
    /// previous one. Unknown ids write nothing.
    pub fn replace(&self, item: T) -> EduResult<Option<T>> {
        let mut items = self.all();
        let Some(slot) = items.iter_mut().find(|it| it.id() == item.id()) else {
            return Ok(None);
        };
        let previous = std::mem::replace(slot, item);
        self.file.save(&items)?;
        Ok(Some(previous))
    }

    /// Applies `f` to the record with `id` and saves. `Ok(None)` if absent;
    /// nothing is written when `f` fails.
    pub fn modify<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut T) -> EduResult<R>,
    ) -> EduResult<Option<R>> {
        let mut items = self.all();
        let Some(slot) = items.iter_mut().find(|it| it.id() == id) else {
            return Ok(None);
        };
        let out = f(slot)?;
        self.file.save(&items)?;
        Ok(Some(out))
    }

    /// Removes the record with `id`. Unknown ids leave the file untouched.
    pub fn remove(&self, id: &str) -> EduResult<bool> {
        let mut items = self.all();
        let before = items.len();
        items.retain(|it| it.id() != id);
        if items.len() == before {
            return Ok(false);
        }
        self.file.save(&items)?;
        Ok(true)
    }
}
