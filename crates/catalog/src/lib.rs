//! Declarative registry of every invokable command.
//!
//! Both the console and the graphical surface resolve commands through the
//! same [`CommandCatalog`], so a command id means the same thing everywhere.

mod builtin;
pub mod catalog;
pub mod definition;
pub mod params;

pub use catalog::{CatalogError, CategorySummary, CommandCatalog};
pub use definition::{Category, CommandDefinition};
pub use params::{validate_parameters, ParamError, ParamKind, ParamValue, ParameterSpec, ValidatedParams};
