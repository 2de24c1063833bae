//! A linker for WESL, WGSL extended with modules, imports and conditional compilation.
//!
//! Modules are parsed into a [`ModuleRegistry`], then [`link`] combines a root module with the
//! declarations it needs from the other modules into one WGSL text. The produced [`SrcMap`]
//! points every part of the output back at the text it was written in.

pub mod linker;
pub mod parsed_module;
pub mod parser;
pub mod rewriter;
pub mod src_map;
pub mod warning;

pub use linker::{
    import_resolver::overlap_tail,
    link,
    registry::{GeneratorExport, ModuleKey, ModuleRegistry},
    LinkError, LinkOptions, LinkOutput, SrcLocation,
};
pub use parsed_module::{ModulePath, ParsedModule};
pub use parser::{parse_module, parser_output::ParseError, ParseOptions};
pub use rewriter::{process_conditionals, replace_words, slice_replace, Slice};
pub use src_map::{SourceId, SrcMap};
pub use warning::Warning;
