/// Persistence gateway trait and its backends.
pub mod game_store;
/// Database model definitions.
pub mod models;
/// Storage abstraction layer for backend-agnostic errors.
pub mod storage;
