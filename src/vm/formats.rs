//! Output formats for tag streams
//!
//! - `tags`: one tag per line in the compact textual notation
//! - `json`, `yaml`: the tag sequence through serde
//! - `treeviz`: the rebuilt node tree, one line per child

pub mod registry;
pub mod serde_formats;
pub mod tags;
pub mod treeviz;

pub use registry::{FormatError, FormatRegistry, Formatter};
pub use serde_formats::{JsonFormatter, YamlFormatter};
pub use tags::{to_tags_str, TagsFormatter};
pub use treeviz::{to_treeviz_str, TreevizFormatter};
