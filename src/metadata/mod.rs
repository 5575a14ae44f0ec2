//! Package header metadata
//!
//! A package header carries free-form descriptive data grouped into
//! registries keyed by `(category, type)`. Each registry maps metadata
//! names to values:
//!
//! ```text
//! header.json
//!   ├── name / version / description
//!   └── custom_data
//!       ├── (Reference, SqlSchema)          FileName, LogicalName, ...
//!       └── (SqlCmdVariables, SqlCmdVariable) Environment, ...
//! ```

mod custom_data;
mod header;

pub use custom_data::{CustomData, Metadata};
pub use header::{PackageHeader, SchemaReference, FORMAT_VERSION};
