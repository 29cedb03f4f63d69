//! End-to-end store operations built on the layout, mapper, copy engine and
//! retry orchestrator.

pub mod archive;
pub mod artifact;
pub mod extract;
pub mod load;
pub mod save;
pub mod verify;

pub use archive::{export_archive, import_archive, ExportOptions};
pub use artifact::add_file;
pub use extract::{extract, ExtractOptions};
pub use load::{load_artifacts, load_into};
pub use save::{save_artifact, save_from};
pub use verify::{
    verify_signature, KeylessIdentity, SignatureVerifier, VerificationMethod, VerificationRequest,
    VerifyOptions,
};
