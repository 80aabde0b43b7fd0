// kernel/src/task/error.rs
//! Task-subsystem result alias and the small conversions between
//! `blocker::BlockerResult` and the kernel's general error taxonomy.

use crate::errors::{KernelError, TaskError};
use crate::task::blocker::BlockerResult;

/// Every task operation returns a value through this alias rather than a
/// bare error code - failures are always propagated by value, never thrown.
pub type TaskResult<T> = Result<T, KernelError>;

/// Maps a blocker's terminal result onto the kernel error taxonomy for
/// callers (like `wait`) that have no further use for a non-`Unblocked`
/// result beyond reporting it as a failure.
pub fn blocker_result_to_kernel_error(result: BlockerResult) -> Option<KernelError> {
    match result {
        BlockerResult::Unblocked => None,
        BlockerResult::Timeout => Some(KernelError::TaskError(TaskError::Timeout)),
        BlockerResult::Cancelled => Some(KernelError::TaskError(TaskError::InvalidTaskState)),
    }
}
