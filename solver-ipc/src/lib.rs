//! Frame allocator for bytes passed between the supervisor and a solver
//! child process. Two interchangeable backends exist: POSIX shared memory
//! (preferred) and a plain-file fallback, selected once via a capability
//! probe at startup.

pub mod error;
pub mod file_backed;
pub mod frame_store;
pub mod probe;
pub mod shared_memory_store;

pub use error::{IpcError, IpcResult};
pub use file_backed::FileBackedFrameStore;
pub use frame_store::FrameStore;
pub use probe::select_frame_store;
pub use shared_memory_store::SharedMemoryFrameStore;
