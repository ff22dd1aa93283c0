//! User repository implementations.

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "json")]
pub use json::JsonUserRepository;

#[cfg(feature = "memory")]
pub use memory::MemoryUserRepository;
