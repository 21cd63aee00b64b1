use std::path::PathBuf;

use crate::file_backed::FileBackedFrameStore;
use crate::frame_store::FrameStore;
use crate::shared_memory_store::SharedMemoryFrameStore;

/// Selects a [`FrameStore`] implementation once, at startup, by probing
/// whether the host actually supports POSIX shared memory — rather than
/// assuming support from the target OS alone, since sandboxes and some CI
/// containers disable it outright.
pub fn select_frame_store(fallback_dir: impl Into<PathBuf>) -> Box<dyn FrameStore> {
    if SharedMemoryFrameStore::is_supported() {
        tracing::debug!("selected shared-memory frame store");
        Box::new(SharedMemoryFrameStore::new())
    } else {
        tracing::debug!("shared memory unsupported on this host, falling back to file-backed frame store");
        Box::new(FileBackedFrameStore::new(fallback_dir))
    }
}
