//! Rust-native building blocks for driving an external poker-solver process
//!
//! `solver-util` is a thin facade over the member crates that implement the
//! three core subsystems: the wire codec for solved-spot trees, the
//! content-addressed blob and tree stores, the shared-memory/file IPC frame
//! allocator, and the solver-process supervisor itself. This crate provides
//! no logic of its own — it only re-exports the workspace's member crates
//! under one surface.

#[doc(inline)]
pub use solver_wire as wire;

#[doc(inline)]
pub use solver_ipc as ipc;

#[doc(inline)]
pub use solver_supervisor as supervisor;

pub mod storage {
    //! Content-addressed persistence for blobs and solved-spot trees

    #[doc(inline)]
    pub use solver_blobstore as blobstore;

    #[doc(inline)]
    pub use solver_tree_store as tree_store;
}
