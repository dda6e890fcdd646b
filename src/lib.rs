#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod asset_paths;
pub mod builder;
pub mod config;
pub mod edit;
pub mod error;
pub mod markup;
pub mod models;
pub mod rewrite;
pub mod selection;
pub mod sources;

pub use builder::{ImportAssets, ImportAssetsOptions};
pub use error::{FilterError, PreprocessError};
pub use models::{AssetSource, FilterMetadata, Processed, SourceFilter, UrlFilter};
pub use selection::UrlSelection;
pub use sources::{DEFAULT_IMPORT_PREFIX, IGNORE_DIRECTIVE, Sources, default_sources};
