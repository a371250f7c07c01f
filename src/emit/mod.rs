//! Turns a finished [`Specification`] into Rust source, one unit per definition kind.

mod commands;
mod enums;
mod handles;
mod structures;

use std::collections::HashSet;
use std::path::Path;

use crate::model::{Pointer, Specification, TypeSpec};
use crate::pretty::IdentifierPrettifier;
use crate::stub::{CallConv, StubModule, UNIT_HEADER};
use crate::type_map::TypeNameMappings;
use crate::types::FatalError;
use crate::variants::VariantGenerator;

/// Rust types the primitive mappings produce.
const RUST_PRIMITIVES: &[&str] = &[
    "c_void", "c_char", "c_int", "f32", "f64", "u8", "u16", "u32", "u64", "i8", "i16", "i32",
    "i64", "usize",
];

/// How command wrappers reach the native entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallStrategy {
    /// A typed function-pointer field per command; the wrapper calls through it.
    #[default]
    Indirect,
    /// A raw `<command>_ptr` field per command and a placeholder wrapper marked for the
    /// native-call rewriter.
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenConfig {
    pub strategy: CallStrategy,
    /// Elements restricted to other APIs are dropped.
    pub api: String,
    pub calling_convention: CallConv,
    /// Name of the struct owning the command pointers.
    pub commands_type: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            strategy: CallStrategy::Indirect,
            api: String::from("vulkan"),
            calling_convention: CallConv::System,
            commands_type: String::from("Commands"),
        }
    }
}

/// The generated source units.
#[derive(Debug, Clone)]
pub struct EmittedBindings {
    pub structures: String,
    pub enumerations: String,
    pub handles: String,
    pub unions: String,
    /// The commands-and-constants unit, kept as data for the native-call rewriter.
    pub command_stubs: StubModule,
}

const GLUE: &str = "\
#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals, dead_code, unused_variables)]

pub use core::ffi::{c_char, c_int, c_void, CStr};

mod commands;
mod enumerations;
mod handles;
mod structures;
mod unions;

pub use self::commands::*;
pub use self::enumerations::*;
pub use self::handles::*;
pub use self::structures::*;
pub use self::unions::*;
";

impl EmittedBindings {
    /// Source of the commands-and-constants unit.
    pub fn commands(&self) -> String {
        format!("{}{}", UNIT_HEADER, self.command_stubs.render())
    }

    /// Writes the five units and a `mod.rs` gluing them together into `dir`, which must exist.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), FatalError> {
        let units = [
            ("structures.rs", self.structures.clone()),
            ("enumerations.rs", self.enumerations.clone()),
            ("handles.rs", self.handles.clone()),
            ("unions.rs", self.unions.clone()),
            ("commands.rs", self.commands()),
            ("mod.rs", String::from(GLUE)),
        ];
        for (name, text) in units.iter() {
            std::fs::write(dir.join(name), text)?;
        }
        log::debug!("wrote bindings to {}", dir.display());
        Ok(())
    }
}

pub struct Emitter<'a> {
    spec: &'a Specification,
    types: &'a TypeNameMappings,
    pretty: &'a IdentifierPrettifier,
    variants: &'a dyn VariantGenerator,
    config: &'a GenConfig,
    known: HashSet<&'a str>,
}

impl<'a> Emitter<'a> {
    pub fn new(
        spec: &'a Specification,
        types: &'a TypeNameMappings,
        pretty: &'a IdentifierPrettifier,
        variants: &'a dyn VariantGenerator,
        config: &'a GenConfig,
    ) -> Self {
        let mut known: HashSet<&str> = RUST_PRIMITIVES.iter().copied().collect();
        known.extend(spec.structures.iter().map(|s| s.name.as_str()));
        known.extend(spec.unions.iter().map(|s| s.name.as_str()));
        known.extend(spec.enums.iter().map(|e| e.name.as_str()));
        known.extend(spec.handles.iter().map(|h| h.name.as_str()));
        known.extend(spec.external_types.iter().map(|e| e.name.as_str()));

        Emitter {
            spec,
            types,
            pretty,
            variants,
            config,
            known,
        }
    }

    /// Emits every unit. Any reference to a type, enum or command the model does not define
    /// aborts emission.
    pub fn emit(&self) -> Result<EmittedBindings, FatalError> {
        let bindings = EmittedBindings {
            enumerations: self.emit_enumerations()?,
            structures: self.emit_structures(&self.spec.structures, false)?,
            unions: self.emit_structures(&self.spec.unions, true)?,
            handles: self.emit_handles(),
            command_stubs: self.emit_commands()?,
        };
        log::debug!(
            "emitted {} command wrappers",
            bindings.command_stubs.methods.len()
        );
        Ok(bindings)
    }

    /// Rust spelling of `spec`, as seen from a definition named `owner`.
    fn render_type(&self, spec: &TypeSpec, owner: &str) -> Result<String, FatalError> {
        let mapped = self.types.map_type_spec(spec);
        if !self.known.contains(mapped.name.as_str()) {
            return Err(FatalError::UnresolvedType {
                owner: owner.to_string(),
                name: spec.name.clone(),
            });
        }
        let mut out = String::new();
        for pointer in &mapped.pointers {
            out.push_str(match *pointer {
                Pointer::Const => "*const ",
                Pointer::Mut => "*mut ",
            });
        }
        out.push_str(&mapped.name);
        Ok(out)
    }
}
