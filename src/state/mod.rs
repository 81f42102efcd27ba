pub mod block_store;

pub use block_store::{create_shared_block_store, BlockStore, SharedBlockStore};
