/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Room, script, progress and issue persistence backends.
pub mod store;
