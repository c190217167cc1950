//! Attachment capture: classify inbound media, optionally persist the bytes.
//!
//! Classification is pure. Persistence is best-effort: a failed download
//! leaves the descriptor without a local path and never fails the caller.

pub mod capture;
pub mod error;
pub mod mime;
pub mod store;

pub use {
    capture::{AttachmentDescriptor, CaptureSettings, MediaCapture, classify},
    error::{Error, Result},
    store::{MediaStore, storage_path},
};
