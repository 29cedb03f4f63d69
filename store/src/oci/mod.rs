//! OCI data model and registry access.
//!
//! ```text
//! store/
//! ├── oci-layout           (OCI layout marker)
//! ├── index.json           (image index, one entry per reference)
//! └── blobs/
//!     └── sha256/
//!         ├── <manifest>   (artifact manifest)
//!         ├── <config>     (artifact configuration)
//!         └── <layers>     (content)
//! ```

pub mod descriptor;
pub mod digest;
pub mod reference;
pub mod registry;

pub use descriptor::{Descriptor, ImageIndex, Manifest, Platform};
pub use digest::Digest;
pub use reference::Reference;
pub use registry::{RegistryAuth, RegistryClient, RegistryRepository};
