mod core;
mod ops;

pub use core::CollectionHandle;
pub use ops::CallContext;
