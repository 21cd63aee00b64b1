use std::collections::HashMap;

use shared_memory::{Shmem, ShmemConf, ShmemError};
use uuid::Uuid;

use crate::error::{IpcError, IpcResult};
use crate::frame_store::FrameStore;

fn map_shmem_err(err: ShmemError) -> IpcError {
    IpcError::SharedMemory(err.to_string())
}

struct TrackedSegment {
    shmem: Shmem,
    len: usize,
}

/// Frame store backed by raw POSIX shared memory (`shm_open`/`mmap` under
/// the hood via the `shared_memory` crate). Segment lifetime is managed
/// explicitly through `release`/`destroy` rather than relying on any
/// process-exit tracker: the parent unlinks a segment exactly when it calls
/// `destroy`, never implicitly.
pub struct SharedMemoryFrameStore {
    segments: HashMap<String, TrackedSegment>,
}

impl Default for SharedMemoryFrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryFrameStore {
    pub fn new() -> Self {
        SharedMemoryFrameStore {
            segments: HashMap::new(),
        }
    }

    /// Create-and-unlink a throwaway segment to confirm the host kernel
    /// actually supports POSIX shared memory before the supervisor commits
    /// to using it for the whole run.
    pub fn is_supported() -> bool {
        let os_id = format!("solver-ipc-probe-{}", Uuid::new_v4().simple());
        match ShmemConf::new().size(4096).os_id(&os_id).create() {
            Ok(shmem) => {
                drop(shmem);
                true
            }
            Err(_) => false,
        }
    }
}

impl FrameStore for SharedMemoryFrameStore {
    fn create_empty(&mut self, size: usize) -> IpcResult<String> {
        let frame_id = format!("shm_{}", Uuid::new_v4().simple());
        let shmem = ShmemConf::new()
            .size(size.max(1))
            .os_id(&frame_id)
            .create()
            .map_err(map_shmem_err)?;
        self.segments.insert(frame_id.clone(), TrackedSegment { shmem, len: size });
        Ok(frame_id)
    }

    fn load(&mut self, frame_id: &str) -> IpcResult<Vec<u8>> {
        if !self.segments.contains_key(frame_id) {
            let shmem = ShmemConf::new().os_id(frame_id).open().map_err(map_shmem_err)?;
            let len = shmem.len();
            self.segments.insert(frame_id.to_string(), TrackedSegment { shmem, len });
        }
        let segment = self.segments.get(frame_id).expect("just inserted");
        let slice = unsafe { segment.shmem.as_slice() };
        Ok(slice[..segment.len].to_vec())
    }

    fn save(&mut self, frame_id: &str, bytes: &[u8]) -> IpcResult<()> {
        let segment = self
            .segments
            .get_mut(frame_id)
            .ok_or_else(|| IpcError::NotFound(frame_id.to_string()))?;
        if bytes.len() > segment.shmem.len() {
            return Err(IpcError::SharedMemory(format!(
                "frame {frame_id} is too small for a {}-byte write",
                bytes.len()
            )));
        }
        let slice = unsafe { segment.shmem.as_slice_mut() };
        slice[..bytes.len()].copy_from_slice(bytes);
        segment.len = bytes.len();
        Ok(())
    }

    fn release(&mut self, frame_id: &str) -> IpcResult<()> {
        let mut segment = self
            .segments
            .remove(frame_id)
            .ok_or_else(|| IpcError::NotFound(frame_id.to_string()))?;
        // Closing our mapping without unlinking the OS object: another
        // holder of this frame id may still need it.
        segment.shmem.set_owner(false);
        Ok(())
    }

    fn destroy(&mut self, frame_id: &str) -> IpcResult<()> {
        let mut segment = self
            .segments
            .remove(frame_id)
            .ok_or_else(|| IpcError::NotFound(frame_id.to_string()))?;
        segment.shmem.set_owner(true);
        drop(segment.shmem);
        Ok(())
    }

    fn memory_usage(&self) -> usize {
        self.segments.values().map(|s| s.len).sum()
    }

    fn release_all(&mut self) -> IpcResult<()> {
        for (_, mut segment) in self.segments.drain() {
            segment.shmem.set_owner(false);
        }
        Ok(())
    }

    fn destroy_all(&mut self) -> IpcResult<()> {
        for (_, mut segment) in self.segments.drain() {
            segment.shmem.set_owner(true);
            drop(segment.shmem);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_round_trip_when_supported() {
        if !SharedMemoryFrameStore::is_supported() {
            return;
        }
        let mut store = SharedMemoryFrameStore::new();
        let id = store.create_empty(64).unwrap();
        store.save(&id, b"shared frame bytes").unwrap();
        assert_eq!(store.load(&id).unwrap(), b"shared frame bytes");
    }

    #[test]
    fn destroy_unlinks_segment_so_a_second_open_fails() {
        if !SharedMemoryFrameStore::is_supported() {
            return;
        }
        let mut store = SharedMemoryFrameStore::new();
        let id = store.create_empty(16).unwrap();
        store.destroy(&id).unwrap();
        let mut other = SharedMemoryFrameStore::new();
        assert!(other.load(&id).is_err());
    }
}
