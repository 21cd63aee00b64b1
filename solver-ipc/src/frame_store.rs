use crate::error::IpcResult;

/// A backend that allocates, fills, and reclaims fixed-size byte frames
/// exchanged between the supervisor and a solver child process. Two
/// implementations exist — shared memory and a plain-file fallback — so the
/// supervisor can pick whichever the host OS actually supports at startup
/// and use either one through this one interface.
pub trait FrameStore: Send {
    /// Allocate a new frame of `size` bytes and return an opaque id for it.
    fn create_empty(&mut self, size: usize) -> IpcResult<String>;

    /// Read the full contents of a frame.
    fn load(&mut self, frame_id: &str) -> IpcResult<Vec<u8>>;

    /// Overwrite a frame's contents. Implementations must make the write
    /// durable before returning so a frame id handed to a consumer always
    /// resolves to the bytes just saved.
    fn save(&mut self, frame_id: &str, bytes: &[u8]) -> IpcResult<()>;

    /// Close this process's local handle to a frame without destroying the
    /// underlying storage.
    fn release(&mut self, frame_id: &str) -> IpcResult<()>;

    /// Close and permanently reclaim a frame's storage.
    fn destroy(&mut self, frame_id: &str) -> IpcResult<()>;

    /// Bytes currently held open by this store.
    fn memory_usage(&self) -> usize;

    fn release_all(&mut self) -> IpcResult<()>;

    fn destroy_all(&mut self) -> IpcResult<()>;
}
