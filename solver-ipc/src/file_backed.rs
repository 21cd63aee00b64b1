use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use uuid::Uuid;

use crate::error::{IpcError, IpcResult};
use crate::frame_store::FrameStore;

const MESSAGE_NAME_PREFIX: &str = "msg_";

struct TrackedFile {
    path: PathBuf,
    file: File,
}

/// Frame store backed by ordinary temp files. Always supported, used as the
/// fallback when the host doesn't support POSIX shared memory (or as the
/// forced choice in tests, where determinism matters more than speed).
pub struct FileBackedFrameStore {
    dir: PathBuf,
    frames: HashMap<String, TrackedFile>,
}

impl FileBackedFrameStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileBackedFrameStore {
            dir: dir.into(),
            frames: HashMap::new(),
        }
    }

    pub fn is_supported() -> bool {
        true
    }

    fn path_for(&self, frame_id: &str) -> PathBuf {
        self.dir.join(frame_id)
    }
}

impl FrameStore for FileBackedFrameStore {
    fn create_empty(&mut self, size: usize) -> IpcResult<String> {
        std::fs::create_dir_all(&self.dir)?;
        let frame_id = format!("{MESSAGE_NAME_PREFIX}{}", Uuid::new_v4().simple());
        let path = self.path_for(&frame_id);
        let file = OpenOptions::new().read(true).write(true).create_new(true).open(&path)?;
        file.set_len(size as u64)?;
        self.frames.insert(frame_id.clone(), TrackedFile { path, file });
        Ok(frame_id)
    }

    fn load(&mut self, frame_id: &str) -> IpcResult<Vec<u8>> {
        if !self.frames.contains_key(frame_id) {
            let path = self.path_for(frame_id);
            let file = OpenOptions::new().read(true).write(true).open(&path)?;
            self.frames.insert(frame_id.to_string(), TrackedFile { path, file });
        }
        let tracked = self.frames.get_mut(frame_id).expect("just inserted");
        tracked.file.seek(SeekFrom::Start(0))?;
        let mut buf = Vec::new();
        tracked.file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn save(&mut self, frame_id: &str, bytes: &[u8]) -> IpcResult<()> {
        let tracked = self
            .frames
            .get_mut(frame_id)
            .ok_or_else(|| IpcError::NotFound(frame_id.to_string()))?;
        tracked.file.seek(SeekFrom::Start(0))?;
        tracked.file.write_all(bytes)?;
        tracked.file.set_len(bytes.len() as u64)?;
        // The frame id is meaningless to a reader until the bytes backing it
        // are actually on disk, so this must happen before `save` returns.
        tracked.file.sync_data()?;
        Ok(())
    }

    fn release(&mut self, frame_id: &str) -> IpcResult<()> {
        self.frames
            .remove(frame_id)
            .map(|_| ())
            .ok_or_else(|| IpcError::NotFound(frame_id.to_string()))
    }

    fn destroy(&mut self, frame_id: &str) -> IpcResult<()> {
        let tracked = self
            .frames
            .remove(frame_id)
            .ok_or_else(|| IpcError::NotFound(frame_id.to_string()))?;
        std::fs::remove_file(&tracked.path)?;
        Ok(())
    }

    fn memory_usage(&self) -> usize {
        self.frames
            .values()
            .filter_map(|t| t.file.metadata().ok())
            .map(|m| m.len() as usize)
            .sum()
    }

    fn release_all(&mut self) -> IpcResult<()> {
        self.frames.clear();
        Ok(())
    }

    fn destroy_all(&mut self) -> IpcResult<()> {
        for (_, tracked) in self.frames.drain() {
            std::fs::remove_file(&tracked.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_is_visible_to_a_fresh_load_before_the_id_is_used_elsewhere() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBackedFrameStore::new(dir.path());
        let id = store.create_empty(0).unwrap();
        store.save(&id, b"solved spot bytes").unwrap();
        assert_eq!(store.load(&id).unwrap(), b"solved spot bytes");
    }

    #[test]
    fn destroy_removes_backing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBackedFrameStore::new(dir.path());
        let id = store.create_empty(8).unwrap();
        let path = store.path_for(&id);
        assert!(path.exists());
        store.destroy(&id).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn memory_usage_tracks_saved_frame_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileBackedFrameStore::new(dir.path());
        let a = store.create_empty(0).unwrap();
        store.save(&a, b"12345").unwrap();
        let b = store.create_empty(0).unwrap();
        store.save(&b, b"1234567890").unwrap();
        assert_eq!(store.memory_usage(), 15);
    }
}
