use std::collections::HashMap;

use crate::model::{Specification, TypeSpec};

/// C primitive names and the Rust types they are emitted as.
const PRIMITIVES: &[(&str, &str)] = &[
    ("void", "c_void"),
    ("char", "c_char"),
    ("int", "c_int"),
    ("float", "f32"),
    ("double", "f64"),
    ("uint8_t", "u8"),
    ("uint16_t", "u16"),
    ("uint32_t", "u32"),
    ("uint64_t", "u64"),
    ("int8_t", "i8"),
    ("int16_t", "i16"),
    ("int32_t", "i32"),
    ("int64_t", "i64"),
    ("size_t", "usize"),
];

/// Registry type name to emitted type name.
///
/// Built once per generation run and then only queried. `map` is applied to raw registry names;
/// a mapped name is not guaranteed to be a fixed point, so callers must not map twice.
#[derive(Debug, Clone, Default)]
pub struct TypeNameMappings {
    names: HashMap<String, String>,
}

impl TypeNameMappings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primitives() -> Self {
        let mut mappings = Self::new();
        for (from, to) in PRIMITIVES {
            mappings.register(from, to);
        }
        mappings
    }

    /// Primitives, every base type alias mapped to its underlying primitive and every bitmask
    /// typedef mapped to a fixed-width unsigned integer.
    pub fn from_specification(spec: &Specification) -> Self {
        let mut mappings = Self::with_primitives();
        for (alias, underlying) in &spec.base_type_aliases {
            let target = mappings.map(underlying).to_string();
            mappings.register(alias, &target);
        }
        for typedef in &spec.typedefs {
            let target = if mappings.map(&typedef.target) == "u64" {
                "u64"
            } else {
                "u32"
            };
            mappings.register(&typedef.name, target);
        }
        log::debug!("{} type name mappings", mappings.names.len());
        mappings
    }

    /// Adds or replaces a mapping.
    pub fn register(&mut self, from: &str, to: &str) {
        self.names.insert(from.to_string(), to.to_string());
    }

    /// Mapped name, or `name` itself when it has no mapping.
    pub fn map<'a>(&'a self, name: &'a str) -> &'a str {
        self.names.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Mapped name, `None` when it has no mapping.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.names.get(name).map(String::as_str)
    }

    pub fn is_mapped(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// A new spec with the mapped name and the same indirection.
    pub fn map_type_spec(&self, spec: &TypeSpec) -> TypeSpec {
        spec.with_name(self.map(&spec.name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
