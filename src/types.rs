//! Raw per-kind lists read out of the registry document, and the errors shared by every stage.

/// Errors from which generation cannot recover.
///
/// A binding set that is only partially correct is worse than none, so every stage stops at the
/// first of these and no output is produced.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FatalError {
    #[error("document does not contain a <registry> element")]
    MissingRegistryElement,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] xml::reader::Error),

    #[error("malformed registry, {} problem(s): {errors:?}", .errors.len())]
    Malformed { errors: Vec<Error> },

    #[error("`{value}` extends `{extends}`, which is not a known enum")]
    UnresolvedEnum { extends: String, value: String },

    #[error("enum `{name}` is defined more than once")]
    DuplicateEnum { name: String },

    #[error("`{enum_name}::{value}` redeclared as {new}, previously {existing}")]
    ConflictingValue {
        enum_name: String,
        value: String,
        existing: i64,
        new: i64,
    },

    #[error("`{value}` in `{owner}` uses an offset but no extension number is known")]
    MissingExtensionNumber { owner: String, value: String },

    #[error("array size `{constant}` used by `{owner}` is not a known constant")]
    UnresolvedConstant { owner: String, constant: String },

    #[error("type `{name}` used by `{owner}` has no definition")]
    UnresolvedType { owner: String, name: String },

    #[error("command `{name}` required by `{owner}` has no definition")]
    UnresolvedCommand { owner: String, name: String },

    #[error("`{name}` is defined more than once")]
    DuplicateDefinition { name: String },

    #[error("direct-call stub `{method}` on `{owner}` has no backing field `{field}`")]
    MissingBackingField {
        owner: String,
        method: String,
        field: String,
    },

    #[error("stub artifact error: {0}")]
    Artifact(String),
}

/// Problems found while walking the XML. The walker keeps going after each one so that a single
/// run reports everything that is wrong with the document; the collected list is then returned
/// inside [`FatalError::Malformed`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    MissingAttribute {
        xpath: String,
        name: String,
    },
    MissingElement {
        xpath: String,
        name: String,
    },
    UnexpectedAttributeValue {
        xpath: String,
        name: String,
        value: String,
    },
    SchemaViolation {
        xpath: String,
        desc: String,
    },
    MalformedDeclaration {
        xpath: String,
        code: String,
        desc: String,
    },
    Internal {
        desc: &'static str,
    },
}

/// Everything the parser keeps from the registry, one list per definition kind.
///
/// Alias entries never appear in the definition lists; command aliases are recorded separately
/// in `command_aliases` so that require lists naming an alias can still be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRegistry {
    pub tags: Vec<String>,
    pub types: Vec<RawType>,
    pub enums: Vec<RawEnums>,
    pub commands: Vec<RawCommand>,
    pub command_aliases: Vec<(String, String)>,
    pub features: Vec<RawFeature>,
    pub extensions: Vec<RawExtension>,
}

/// A `<type>` element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawType {
    pub name: String,
    pub category: Option<String>,
    pub api: Option<String>,
    pub requires: Option<String>,
    pub parent: Option<String>,
    /// Text of the element with markup stripped, e.g. `typedef VkFlags VkCullModeFlags;`.
    pub code: String,
    /// Text of the first `<type>` child.
    pub type_ref: Option<String>,
    pub members: Vec<RawMember>,
}

/// A struct `<member>`, command `<param>` or command `<proto>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMember {
    pub name: String,
    pub type_name: String,
    /// Declaration text, e.g. `const char* const* ppEnabledLayerNames`.
    pub code: String,
    pub api: Option<String>,
    pub optional: bool,
    pub len: Option<String>,
    pub comment: Option<String>,
}

/// An `<enums>` block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEnums {
    pub name: Option<String>,
    pub kind: Option<String>,
    pub bitwidth: Option<u32>,
    pub values: Vec<RawEnum>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEnum {
    pub name: String,
    pub api: Option<String>,
    pub comment: Option<String>,
    /// The `type` attribute, only present on API constants.
    pub type_name: Option<String>,
    pub extends: Option<String>,
    pub spec: RawEnumSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawEnumSpec {
    /// A bare reference to something defined elsewhere.
    #[default]
    None,
    Value(String),
    Bitpos(u32),
    Offset {
        offset: i64,
        extnumber: Option<i64>,
        negative: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawCommand {
    pub name: String,
    pub api: Option<String>,
    pub proto: RawMember,
    pub params: Vec<RawMember>,
    pub success_codes: Vec<String>,
    pub error_codes: Vec<String>,
}

/// A `<require>` block of a feature or extension.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRequire {
    pub api: Option<String>,
    pub enums: Vec<RawEnum>,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFeature {
    pub name: String,
    pub api: String,
    pub number: String,
    pub requires: Vec<RawRequire>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawExtension {
    pub name: String,
    pub number: Option<i64>,
    pub ext_type: Option<String>,
    pub supported: Option<String>,
    pub requires: Vec<RawRequire>,
}

/// Returns true if an element's `api` attribute (a comma separated list) admits `api`.
/// Elements without the attribute apply to every API.
pub fn api_matches(element_api: Option<&str>, api: &str) -> bool {
    match element_api {
        Some(list) => list.split(',').any(|a| a.trim() == api),
        None => true,
    }
}
