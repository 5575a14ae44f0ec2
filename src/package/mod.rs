//! Schema packages
//!
//! A package is a gzip-compressed tar archive:
//!
//! ```text
//! Catalog.dacpac
//!   ├── header.json        # PackageHeader (required)
//!   ├── predeploy.sql      # optional
//!   ├── model/
//!   │   ├── 001_schemas.sql
//!   │   └── 002_tables.sql
//!   └── postdeploy.sql     # optional
//! ```

mod loader;
mod writer;

pub use loader::{LoadedPackage, PackageLoader, Script, ScriptKind};
pub use writer::PackageWriter;

pub(crate) const HEADER_ENTRY: &str = "header.json";
pub(crate) const PREDEPLOY_ENTRY: &str = "predeploy.sql";
pub(crate) const POSTDEPLOY_ENTRY: &str = "postdeploy.sql";
pub(crate) const MODEL_DIR: &str = "model/";
