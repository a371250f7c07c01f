//! Generates typed Rust bindings from the Vulkan XML registry.
//!
//! The pipeline is parse, build (with extension enum values merged in), map type names, emit.
//! [`generate`] runs all of it; the stages are public for callers that need the model itself.
//! Bindings emitted with [`CallStrategy::Direct`] are finished by [`NativeCallRewriter`].

#[cfg(feature = "serialize")]
#[macro_use]
extern crate serde_derive;
#[cfg(feature = "serialize")]
extern crate serde;
extern crate xml;

#[macro_use]
mod parse;
mod c_lexer;
mod emit;
mod merge;
mod model;
mod pretty;
mod rewrite;
mod stub;
mod type_map;
mod types;
mod variants;

use std::io::Read;

pub use c_lexer::{parse_declarator, ArrayLen, Declarator};
pub use emit::{CallStrategy, EmittedBindings, Emitter, GenConfig};
pub use merge::{bitpos_value, merge_enum_values, offset_value};
pub use model::*;
pub use parse::{parse_file, parse_stream};
pub use pretty::{command_method_name, derive_prefix, snake_case, IdentifierPrettifier};
pub use rewrite::{NativeCallRewriter, RewriteReport};
pub use stub::*;
pub use type_map::TypeNameMappings;
pub use types::*;
pub use variants::*;

/// Runs the whole pipeline over the registry document read from `reader`.
pub fn generate<R: Read>(
    reader: R,
    config: &GenConfig,
    variants: &dyn VariantGenerator,
) -> Result<EmittedBindings, FatalError> {
    let raw = parse_stream(reader)?;
    let spec = Specification::build(raw, &config.api)?;
    let types = TypeNameMappings::from_specification(&spec);
    let pretty = IdentifierPrettifier::from_tags(&spec.tags);
    Emitter::new(&spec, &types, &pretty, variants, config).emit()
}
