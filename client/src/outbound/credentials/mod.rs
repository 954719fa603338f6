//! Credential cache adapters backed by the local filesystem.

mod file_store;

pub use file_store::{CREDENTIALS_FILE_NAME, FileCredentialStore};
