// kernel/src/task/cwd.rs
//! Per-task current-working-directory resolution, grounded against the
//! filesystem's `VfsManager::metadata`. The original design calls for a
//! refcounted `find_and_ref`/`fsnode_deref` filesystem node lookup, but this
//! codebase's VFS has no such API (`fs::vfs::VfsManager` only exposes
//! `metadata`/`open`/etc. by path) - `metadata` is used instead to check
//! existence and directory-ness, and there is no live reference to release.

use alloc::string::String;

use crate::errors::KernelError;
use crate::fs::vfs::{self, NodeType};
use crate::task::error::TaskResult;
use crate::task::path::Path;
use crate::task::task_structs::TaskId;

/// Parses `text`, combining it with the task's cwd if relative, and
/// normalizes the result. Does not touch the filesystem.
pub fn cwd_resolve(task_id: TaskId, text: &str) -> TaskResult<Path> {
    let input = Path::create(text);
    let resolved = if input.is_relative() {
        let base = crate::task::registry::with_task(task_id, |task| task.cwd_lock().lock().clone())
            .ok_or(KernelError::TaskError(crate::errors::TaskError::NoSuchTask))?;
        Path::combine(&Path::create(&base), &input)
    } else {
        input
    };
    Ok(resolved.normalize())
}

/// Resolves `text`, verifies it names a directory, and swaps it into the
/// task's cwd. `NotFound` if the path doesn't exist, `NotADirectory` if it
/// names something other than a directory.
pub fn set_cwd(task_id: TaskId, text: &str) -> TaskResult<()> {
    let resolved = cwd_resolve(task_id, text)?;

    let manager = vfs::get_vfs_manager().ok_or(KernelError::NotInitialized)?;
    // Deliberately collapse whatever filesystem-specific error `metadata`
    // returns (missing node, unmounted fs, ...) onto the NO_SUCH_FILE_OR_DIRECTORY
    // kind this operation's taxonomy names, rather than leaking backend detail.
    let metadata = manager.metadata(resolved.as_str()).map_err(|_| KernelError::NotFound)?;
    if metadata.node_type != NodeType::Directory {
        return Err(KernelError::NotADirectory);
    }

    crate::task::registry::with_task(task_id, |task| {
        *task.cwd_lock().lock() = resolved.as_str().into();
    }).ok_or(KernelError::TaskError(crate::errors::TaskError::NoSuchTask))?;
    Ok(())
}

/// Copies the task's cwd into `buffer`, truncating silently if it doesn't
/// fit (see DESIGN.md - this matches the original's unspecified truncation
/// policy rather than inventing an overflow error).
pub fn get_cwd(task_id: TaskId, buffer: &mut [u8]) -> TaskResult<usize> {
    let cwd: String = crate::task::registry::with_task(task_id, |task| task.cwd_lock().lock().clone())
        .ok_or(KernelError::TaskError(crate::errors::TaskError::NoSuchTask))?;

    let bytes = cwd.as_bytes();
    let n = bytes.len().min(buffer.len());
    buffer[..n].copy_from_slice(&bytes[..n]);
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn relative_path_resolves_against_task_cwd() {
        let id = crate::task::registry::register_bootstrap("cwd-probe-relative");
        crate::task::registry::with_task(id, |task| *task.cwd_lock().lock() = "/home/user".into());
        let resolved = cwd_resolve(id, "docs/../notes").unwrap();
        assert_eq!(resolved.as_str(), "/home/user/notes");
    }

    #[test_case]
    fn absolute_path_ignores_task_cwd() {
        let id = crate::task::registry::register_bootstrap("cwd-probe-absolute");
        crate::task::registry::with_task(id, |task| *task.cwd_lock().lock() = "/home/user".into());
        let resolved = cwd_resolve(id, "/etc/hosts").unwrap();
        assert_eq!(resolved.as_str(), "/etc/hosts");
    }

    #[test_case]
    fn get_cwd_truncates_into_a_short_buffer() {
        let id = crate::task::registry::register_bootstrap("cwd-probe-truncate");
        crate::task::registry::with_task(id, |task| *task.cwd_lock().lock() = "/home/user".into());
        let mut buf = [0u8; 5];
        let n = get_cwd(id, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"/home");
    }

    #[test_case]
    fn set_cwd_on_a_missing_path_is_not_found() {
        let id = crate::task::registry::register_bootstrap("cwd-probe-missing");
        let result = set_cwd(id, "/no/such/path/at/all");
        assert!(matches!(result, Err(KernelError::NotFound)));
    }
}
