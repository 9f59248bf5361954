//! molde is a text-templating engine: compile markup once, render it as many
//! times as needed against hierarchical, dynamically-typed data.
//!
//! The pieces:
//!
//! - [`Template`]: compiled template source. Immutable once compiled, safe
//!   to share across threads and renders.
//! - [`Dataset`] / [`DatasetCollection`]: the data model — a string-keyed
//!   map of [`Value`]s and an ordered sequence of datasets. Both are cheap
//!   shared handles with interior locking.
//! - [`Language`]: a translation table resolved by `##key##` markup.
//! - [`Cache`]: an in-memory store for compiled templates and loaded
//!   language tables.
//!
//! ```
//! use molde::{Dataset, DatasetCollection, Template};
//!
//! let tmpl = Template::compile(
//!     "Hi {{name}}! @@pets:pet@@[[pet]]- {{name}}[[]]",
//! ).unwrap();
//!
//! let data = Dataset::new();
//! data.set("name", "Al");
//! let pets = DatasetCollection::new();
//! pets.push(Dataset::new());
//! pets.push(Dataset::new());
//! data.set("pets", pets);
//!
//! assert_eq!(tmpl.execute(Some(&data)), "Hi Al! - Al- Al");
//! ```
//!
//! Rendering never fails: unresolved lookups degrade to empty output, so a
//! template authored against data that is not there yet still renders.

pub mod cache;
pub mod dataset;
pub mod error;
pub mod language;
pub mod template;
pub mod value;

pub use cache::Cache;
pub use dataset::{Dataset, DatasetCollection, PATH_DELIMITER};
pub use error::{CompileError, LanguageError};
pub use language::Language;
pub use template::{Node, Template};
pub use value::{Lexicon, OpaqueValue, Value};
