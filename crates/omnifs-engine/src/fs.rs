//! File and directory operations.
//!
//! Every function validates all of its preconditions before touching any
//! state, so a failed operation leaves the container exactly as it was
//! (block allocation inside a payload write is the one place that needs an
//! explicit rollback, and the store handles it).

use crate::error::{EngineError, Result};
use crate::path;
use crate::unix_now;
use omnifs_container::{EntryType, OmniStore};
use omnifs_protocol::{DirEntry, EntryKind, EntryMetadata, StoreStats};

fn kind_of(entry_type: EntryType) -> EntryKind {
    match entry_type {
        EntryType::File => EntryKind::File,
        EntryType::Directory => EntryKind::Directory,
    }
}

/// Resolves `path` and requires a file.
fn resolve_file(store: &OmniStore, p: &str) -> Result<u32> {
    let index = path::resolve(store, p)?;
    let entry = store
        .metadata()
        .get(index)
        .ok_or_else(|| EngineError::NotFound(p.to_string()))?;
    if entry.entry_type != EntryType::File {
        return Err(EngineError::InvalidOperation(format!(
            "{p} is not a file"
        )));
    }
    Ok(index)
}

/// Resolves `path` and requires a directory.
fn resolve_dir(store: &OmniStore, p: &str) -> Result<u32> {
    let index = path::resolve(store, p)?;
    let entry = store
        .metadata()
        .get(index)
        .ok_or_else(|| EngineError::NotFound(p.to_string()))?;
    if entry.entry_type != EntryType::Directory {
        return Err(EngineError::InvalidOperation(format!(
            "{p} is not a directory"
        )));
    }
    Ok(index)
}

/// Creates a file, optionally writing an initial payload.
pub fn file_create(store: &mut OmniStore, p: &str, data: &[u8], owner_id: u32) -> Result<()> {
    let (parent_index, name) = path::resolve_parent(store, p)?;
    if store.metadata().find_child(parent_index, &name).is_some() {
        return Err(EngineError::FileExists(p.to_string()));
    }

    let index = store
        .metadata_mut()
        .allocate(EntryType::File, parent_index, &name, owner_id, unix_now())?;

    if data.is_empty() {
        store.persist_metadata()?;
    } else if let Err(e) = store.write_file_data(index, data) {
        // The entry was never visible on disk with a payload; drop it.
        store.metadata_mut().free(index);
        store.persist_metadata()?;
        return Err(e.into());
    }
    Ok(())
}

/// Reads a file's whole payload.
pub fn file_read(store: &mut OmniStore, p: &str) -> Result<Vec<u8>> {
    let index = resolve_file(store, p)?;
    Ok(store.read_file_data(index)?)
}

/// Overwrites `data.len()` bytes at `offset`, extending the file when the
/// write reaches past its end. A gap between the old end and `offset` is
/// zero-filled.
pub fn file_edit(store: &mut OmniStore, p: &str, data: &[u8], offset: u64) -> Result<()> {
    let index = resolve_file(store, p)?;
    let mut content = store.read_file_data(index)?;

    let offset = usize::try_from(offset)
        .map_err(|_| EngineError::InvalidOperation(format!("offset {offset} out of range")))?;
    let end = offset
        .checked_add(data.len())
        .ok_or_else(|| EngineError::InvalidOperation("edit range overflows".to_string()))?;

    if end > content.len() {
        content.resize(end, 0);
    }
    content[offset..end].copy_from_slice(data);

    store.write_file_data(index, &content)?;
    Ok(())
}

/// Deletes a file, releasing its chain and entry.
pub fn file_delete(store: &mut OmniStore, p: &str) -> Result<()> {
    let index = resolve_file(store, p)?;
    let start_block = store
        .metadata()
        .get(index)
        .map(|e| e.start_block)
        .unwrap_or(0);
    if start_block != 0 {
        store.free_chain(start_block)?;
    }
    store.metadata_mut().free(index);
    store.persist_metadata()?;
    store.persist_bitmap()?;
    Ok(())
}

/// Drops a file's payload, keeping the entry.
pub fn file_truncate(store: &mut OmniStore, p: &str) -> Result<()> {
    let index = resolve_file(store, p)?;
    store.write_file_data(index, &[])?;
    Ok(())
}

/// Renames an entry in place. The new path must name the same parent
/// directory as the old one; moving between directories is not supported.
pub fn file_rename(store: &mut OmniStore, old_path: &str, new_path: &str) -> Result<()> {
    path::validate(old_path)?;
    let index = path::resolve(store, old_path)?;
    if index == path::ROOT_INDEX {
        return Err(EngineError::InvalidOperation(
            "the root directory cannot be renamed".to_string(),
        ));
    }

    let (new_parent, new_name) = path::resolve_parent(store, new_path)?;
    let old_parent = store
        .metadata()
        .get(index)
        .map(|e| e.parent_index)
        .ok_or_else(|| EngineError::NotFound(old_path.to_string()))?;
    if new_parent != old_parent {
        return Err(EngineError::InvalidPath(format!(
            "rename cannot move {old_path} to a different directory"
        )));
    }
    if let Some(existing) = store.metadata().find_child(new_parent, &new_name) {
        if existing != index {
            return Err(EngineError::FileExists(new_path.to_string()));
        }
    }

    let now = unix_now();
    let entry = store
        .metadata_mut()
        .get_mut(index)
        .ok_or_else(|| EngineError::NotFound(old_path.to_string()))?;
    entry.name = new_name;
    entry.modified_time = now;
    store.persist_metadata()?;
    Ok(())
}

/// Reports whether a path resolves to any entry.
pub fn file_exists(store: &OmniStore, p: &str) -> Result<bool> {
    match path::resolve(store, p) {
        Ok(_) => Ok(true),
        Err(EngineError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Creates a directory.
pub fn dir_create(store: &mut OmniStore, p: &str, owner_id: u32) -> Result<()> {
    let (parent_index, name) = path::resolve_parent(store, p)?;
    if store.metadata().find_child(parent_index, &name).is_some() {
        return Err(EngineError::FileExists(p.to_string()));
    }
    store.metadata_mut().allocate(
        EntryType::Directory,
        parent_index,
        &name,
        owner_id,
        unix_now(),
    )?;
    store.persist_metadata()?;
    Ok(())
}

/// Lists a directory's children in stable slot order.
pub fn dir_list(store: &OmniStore, p: &str) -> Result<Vec<DirEntry>> {
    let index = resolve_dir(store, p)?;
    let entries = store
        .metadata()
        .children(index)
        .into_iter()
        .filter_map(|child| {
            let entry = store.metadata().get(child)?;
            Some(DirEntry {
                name: entry.name.clone(),
                kind: kind_of(entry.entry_type),
                size: entry.total_size,
                permissions: entry.permissions,
                created_time: entry.created_time,
                modified_time: entry.modified_time,
            })
        })
        .collect();
    Ok(entries)
}

/// Deletes an empty directory.
pub fn dir_delete(store: &mut OmniStore, p: &str) -> Result<()> {
    let index = resolve_dir(store, p)?;
    if index == path::ROOT_INDEX {
        return Err(EngineError::InvalidOperation(
            "the root directory cannot be deleted".to_string(),
        ));
    }
    if !store.metadata().children(index).is_empty() {
        return Err(EngineError::DirectoryNotEmpty(p.to_string()));
    }
    store.metadata_mut().free(index);
    store.persist_metadata()?;
    Ok(())
}

/// Reports whether a path resolves to a directory.
pub fn dir_exists(store: &OmniStore, p: &str) -> Result<bool> {
    match path::resolve(store, p) {
        Ok(index) => Ok(store
            .metadata()
            .get(index)
            .map(|e| e.entry_type == EntryType::Directory)
            .unwrap_or(false)),
        Err(EngineError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Returns a copy of an entry's metadata.
pub fn get_metadata(store: &OmniStore, p: &str) -> Result<EntryMetadata> {
    let index = path::resolve(store, p)?;
    let entry = store
        .metadata()
        .get(index)
        .ok_or_else(|| EngineError::NotFound(p.to_string()))?;
    Ok(EntryMetadata {
        name: entry.name.clone(),
        kind: kind_of(entry.entry_type),
        size: entry.total_size,
        permissions: entry.permissions,
        owner_id: entry.owner_id,
        created_time: entry.created_time,
        modified_time: entry.modified_time,
    })
}

/// Stores permission bits on an entry.
pub fn set_permissions(store: &mut OmniStore, p: &str, mode: u32) -> Result<()> {
    let index = path::resolve(store, p)?;
    let now = unix_now();
    let entry = store
        .metadata_mut()
        .get_mut(index)
        .ok_or_else(|| EngineError::NotFound(p.to_string()))?;
    entry.permissions = mode;
    entry.modified_time = now;
    store.persist_metadata()?;
    Ok(())
}

/// Snapshot of store-level statistics.
pub fn stats(store: &OmniStore) -> StoreStats {
    let usage = store.usage();
    let (files, directories) = store.metadata().counts();
    StoreStats {
        total_files: files,
        total_directories: directories,
        total_size: usage.total_size,
        block_size: usage.block_size,
        used_blocks: u64::from(usage.used_blocks),
        free_blocks: u64::from(usage.free_blocks),
        used_bytes: u64::from(usage.used_blocks) * u64::from(usage.block_size),
        free_bytes: u64::from(usage.free_blocks) * u64::from(usage.block_size),
    }
}
