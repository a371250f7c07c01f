//! The resolved model handed to the emitter, and its construction from a [`RawRegistry`].

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::c_lexer::{parse_declarator, ArrayLen, Declarator};
use crate::merge::{self, merge_enum_values};
use crate::pretty::derive_prefix;
use crate::types::*;

/// Mutability of the target of one level of indirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Pointer {
    Const,
    Mut,
}

/// A possibly indirect reference to a named type. Pointers are listed outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TypeSpec {
    pub name: String,
    pub pointers: Vec<Pointer>,
}

impl TypeSpec {
    pub fn new(name: &str) -> Self {
        TypeSpec {
            name: name.to_string(),
            pointers: Vec::new(),
        }
    }

    pub fn pointer_depth(&self) -> usize {
        self.pointers.len()
    }

    /// Same indirection, different target.
    pub fn with_name(&self, name: &str) -> Self {
        TypeSpec {
            name: name.to_string(),
            pointers: self.pointers.clone(),
        }
    }

    pub fn is_void(&self) -> bool {
        self.name == "void" && self.pointers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Parameter {
    pub name: String,
    pub type_spec: TypeSpec,
    pub optional: bool,
    /// Name of the parameter holding this pointer's element count, if any.
    pub len: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CommandDefinition {
    pub name: String,
    pub return_type: TypeSpec,
    pub params: Vec<Parameter>,
    pub success_codes: Vec<String>,
    pub error_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum EnumKind {
    Plain,
    Bitmask,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
    pub bitpos: Option<u32>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EnumDefinition {
    pub name: String,
    pub kind: EnumKind,
    /// 32 or 64. Only bitmasks can be 64 bits wide.
    pub bit_width: u32,
    pub values: Vec<EnumValue>,
}

/// One dimension of a fixed-size array member.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ArraySize {
    pub len: u32,
    /// API constant the size was given by, kept for emission.
    pub constant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct MemberSpec {
    pub name: String,
    pub type_spec: TypeSpec,
    pub optional: bool,
    pub array: Vec<ArraySize>,
    pub bitfield: Option<u32>,
    pub comment: Option<String>,
}

impl MemberSpec {
    /// Number of elements stored in the member, 1 for a scalar.
    pub fn element_count(&self) -> u32 {
        self.array.iter().map(|a| a.len).product()
    }
}

/// A struct or union.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StructureDefinition {
    pub name: String,
    pub members: Vec<MemberSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct HandleDefinition {
    pub name: String,
    pub parent: Option<String>,
    pub dispatchable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Typedef {
    pub name: String,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ExternalKind {
    /// Window-system or other platform header type.
    Platform,
    /// Base type declared as a pointer to something the registry does not describe.
    OpaquePointer,
    FuncPointer,
}

/// A type the registry references but does not describe in enough detail to lay out.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ExternalType {
    pub name: String,
    pub kind: ExternalKind,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ConstValue {
    U32(u32),
    U64(u64),
    USize(u64),
    I32(i32),
    /// Literal text, always containing a decimal point.
    F32(String),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Constant {
    pub name: String,
    pub value: ConstValue,
    pub comment: Option<String>,
}

/// How an enum extension value was given in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ValueEncoding {
    Literal(i64),
    Bitpos(u32),
    Offset {
        ext_number: i64,
        offset: i64,
        negative: bool,
    },
}

impl ValueEncoding {
    pub fn value(&self) -> i64 {
        match *self {
            ValueEncoding::Literal(v) => v,
            ValueEncoding::Bitpos(b) => merge::bitpos_value(b),
            ValueEncoding::Offset {
                ext_number,
                offset,
                negative,
            } => merge::offset_value(ext_number, offset, negative),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EnumExtensionValue {
    pub extends: String,
    pub name: String,
    pub value: i64,
    pub encoding: ValueEncoding,
    pub comment: Option<String>,
}

impl EnumExtensionValue {
    pub fn new(extends: &str, name: &str, encoding: ValueEncoding) -> Self {
        EnumExtensionValue {
            extends: extends.to_string(),
            name: name.to_string(),
            value: encoding.value(),
            encoding,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ExtensionDefinition {
    pub name: String,
    pub number: i64,
    pub ext_type: Option<String>,
    pub constants: Vec<Constant>,
    pub enum_values: Vec<EnumExtensionValue>,
    pub commands: Vec<String>,
}

/// A core version, e.g. `VK_VERSION_1_1`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct FeatureDefinition {
    pub name: String,
    pub number: String,
    pub enum_values: Vec<EnumExtensionValue>,
    pub commands: Vec<String>,
}

/// Everything generation needs, with extension enum values already merged.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Specification {
    pub commands: Vec<CommandDefinition>,
    pub constants: Vec<Constant>,
    pub typedefs: Vec<Typedef>,
    pub enums: Vec<EnumDefinition>,
    pub structures: Vec<StructureDefinition>,
    pub unions: Vec<StructureDefinition>,
    pub handles: Vec<HandleDefinition>,
    pub bitmask_type_names: Vec<String>,
    pub base_type_aliases: BTreeMap<String, String>,
    pub external_types: Vec<ExternalType>,
    pub tags: Vec<String>,
    pub features: Vec<FeatureDefinition>,
    pub extensions: Vec<ExtensionDefinition>,
    /// Alias name to the command it names.
    pub command_aliases: BTreeMap<String, String>,
}

impl Specification {
    /// Builds the model for `api` (e.g. `"vulkan"`). Elements restricted to other APIs are
    /// dropped, extension enum values are merged and bitmasks get their zero member.
    pub fn build(raw: RawRegistry, api: &str) -> Result<Specification, FatalError> {
        let mut builder = Builder {
            api,
            spec: Specification::default(),
            errors: Vec::new(),
            defined: HashSet::new(),
            constant_values: HashMap::new(),
            enum_type_names: Vec::new(),
        };

        builder.spec.tags = raw.tags;
        builder.spec.command_aliases = raw.command_aliases.into_iter().collect();

        for block in raw.enums.iter().filter(|b| is_constants_block(b)) {
            for value in &block.values {
                builder.add_constant(value, None)?;
            }
        }
        for feature in raw.features {
            builder.add_feature(feature)?;
        }
        for extension in raw.extensions {
            builder.add_extension(extension)?;
        }
        builder.add_types(raw.types)?;
        let enums = builder.collect_enums(raw.enums);
        for command in raw.commands {
            builder.add_command(command)?;
        }

        if !builder.errors.is_empty() {
            return Err(FatalError::Malformed {
                errors: builder.errors,
            });
        }

        let mut spec = builder.spec;
        let contributed = spec
            .features
            .iter()
            .flat_map(|f| f.enum_values.iter())
            .chain(spec.extensions.iter().flat_map(|e| e.enum_values.iter()));
        let mut enums = merge_enum_values(enums, contributed)?;
        for e in enums.iter_mut() {
            add_zero_member(e);
        }
        spec.enums = enums;

        log::debug!(
            "built model: {} structures, {} unions, {} enums, {} handles, {} commands, {} constants",
            spec.structures.len(),
            spec.unions.len(),
            spec.enums.len(),
            spec.handles.len(),
            spec.commands.len(),
            spec.constants.len()
        );
        Ok(spec)
    }

    pub fn find_enum(&self, name: &str) -> Option<&EnumDefinition> {
        self.enums.iter().find(|e| e.name == name)
    }

    pub fn find_command(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Follows command aliases until a modelled command is found.
    pub fn resolve_command(&self, name: &str) -> Option<&CommandDefinition> {
        let mut name = name;
        for _ in 0..=self.command_aliases.len() {
            if let Some(command) = self.find_command(name) {
                return Some(command);
            }
            name = self.command_aliases.get(name).map(String::as_str)?;
        }
        None
    }
}

fn is_constants_block(block: &RawEnums) -> bool {
    block.name.as_deref() == Some("API Constants") || block.kind.as_deref() == Some("constants")
}

/// Bitmasks that have no zero-valued member get `<PREFIX>_NONE = 0` in front.
fn add_zero_member(e: &mut EnumDefinition) {
    if e.kind != EnumKind::Bitmask || e.values.iter().any(|v| v.value == 0) {
        return;
    }
    let name = format!("{}_NONE", derive_prefix(&e.name));
    if e.values.iter().any(|v| v.name == name) {
        return;
    }
    e.values.insert(
        0,
        EnumValue {
            name,
            value: 0,
            bitpos: None,
            comment: None,
        },
    );
}

struct Builder<'a> {
    api: &'a str,
    spec: Specification,
    errors: Vec<Error>,
    defined: HashSet<String>,
    constant_values: HashMap<String, ConstValue>,
    enum_type_names: Vec<String>,
}

impl<'a> Builder<'a> {
    fn admits(&self, element_api: &Option<String>) -> bool {
        api_matches(element_api.as_deref(), self.api)
    }

    fn define(&mut self, name: &str) -> Result<(), FatalError> {
        if self.defined.insert(name.to_string()) {
            Ok(())
        } else {
            Err(FatalError::DuplicateDefinition {
                name: name.to_string(),
            })
        }
    }

    /// Registers a plain constant. Returns it when it is new, so extensions can list what they
    /// contribute.
    fn add_constant(
        &mut self,
        raw: &RawEnum,
        owner: Option<&str>,
    ) -> Result<Option<Constant>, FatalError> {
        if !self.admits(&raw.api) {
            return Ok(None);
        }
        let text = match raw.spec {
            RawEnumSpec::Value(ref text) => text,
            _ => return Ok(None),
        };
        let value = match classify_constant(text, raw.type_name.as_deref()) {
            Some(v) => v,
            None => {
                // Values naming another enumerant are references, not definitions.
                log::debug!(
                    "skipping constant {} = {} in {}",
                    raw.name,
                    text,
                    owner.unwrap_or("API Constants")
                );
                return Ok(None);
            }
        };
        if let Some(existing) = self.constant_values.get(&raw.name) {
            if *existing == value {
                return Ok(None);
            }
            return Err(FatalError::DuplicateDefinition {
                name: raw.name.clone(),
            });
        }
        self.constant_values.insert(raw.name.clone(), value.clone());
        let constant = Constant {
            name: raw.name.clone(),
            value,
            comment: raw.comment.clone(),
        };
        self.spec.constants.push(constant.clone());
        Ok(Some(constant))
    }

    /// Splits require blocks into enum extension values, new constants and command names.
    fn collect_requires(
        &mut self,
        owner: &str,
        ext_number: Option<i64>,
        requires: Vec<RawRequire>,
    ) -> Result<(Vec<EnumExtensionValue>, Vec<Constant>, Vec<String>), FatalError> {
        let mut enum_values = Vec::new();
        let mut constants = Vec::new();
        let mut commands = Vec::new();

        for require in requires {
            if !self.admits(&require.api) {
                continue;
            }
            for raw in &require.enums {
                if !self.admits(&raw.api) {
                    continue;
                }
                let extends = match raw.extends {
                    Some(ref extends) => extends,
                    None => {
                        if let Some(c) = self.add_constant(raw, Some(owner))? {
                            constants.push(c);
                        }
                        continue;
                    }
                };
                let encoding = match raw.spec {
                    RawEnumSpec::None => continue,
                    RawEnumSpec::Value(ref text) => match parse_int_literal(text) {
                        Some(v) => ValueEncoding::Literal(v),
                        None => {
                            self.errors.push(Error::UnexpectedAttributeValue {
                                xpath: format!("{}/require/enum[@name='{}']", owner, raw.name),
                                name: String::from("value"),
                                value: text.clone(),
                            });
                            continue;
                        }
                    },
                    RawEnumSpec::Bitpos(b) => ValueEncoding::Bitpos(b),
                    RawEnumSpec::Offset {
                        offset,
                        extnumber,
                        negative,
                    } => match extnumber.or(ext_number) {
                        Some(ext_number) => ValueEncoding::Offset {
                            ext_number,
                            offset,
                            negative,
                        },
                        None => {
                            return Err(FatalError::MissingExtensionNumber {
                                owner: owner.to_string(),
                                value: raw.name.clone(),
                            })
                        }
                    },
                };
                let mut value = EnumExtensionValue::new(extends, &raw.name, encoding);
                value.comment = raw.comment.clone();
                enum_values.push(value);
            }
            commands.extend(require.commands);
        }

        Ok((enum_values, constants, commands))
    }

    fn add_feature(&mut self, feature: RawFeature) -> Result<(), FatalError> {
        if !api_matches(Some(&feature.api), self.api) {
            return Ok(());
        }
        let (enum_values, _, commands) =
            self.collect_requires(&feature.name, None, feature.requires)?;
        self.spec.features.push(FeatureDefinition {
            name: feature.name,
            number: feature.number,
            enum_values,
            commands,
        });
        Ok(())
    }

    fn add_extension(&mut self, extension: RawExtension) -> Result<(), FatalError> {
        if !api_matches(extension.supported.as_deref(), self.api) {
            log::debug!(
                "skipping extension {} (supported: {})",
                extension.name,
                extension.supported.as_deref().unwrap_or("")
            );
            return Ok(());
        }
        let (enum_values, constants, commands) =
            self.collect_requires(&extension.name, extension.number, extension.requires)?;
        self.spec.extensions.push(ExtensionDefinition {
            name: extension.name,
            number: extension.number.unwrap_or(0),
            ext_type: extension.ext_type,
            constants,
            enum_values,
            commands,
        });
        Ok(())
    }

    fn declarator(&mut self, owner: &str, member: &RawMember) -> Option<Declarator> {
        match parse_declarator(&member.code) {
            Ok(d) => Some(d),
            Err(desc) => {
                self.errors.push(Error::MalformedDeclaration {
                    xpath: format!("{}/{}", owner, member.name),
                    code: member.code.clone(),
                    desc,
                });
                None
            }
        }
    }

    fn parameter_pointers(&mut self, owner: &str, param: &RawMember) -> Option<Vec<Pointer>> {
        let decl = self.declarator(owner, param)?;
        match decl.parameter_pointers() {
            Ok(pointers) => Some(pointers),
            Err(desc) => {
                self.errors.push(Error::MalformedDeclaration {
                    xpath: format!("{}/{}", owner, param.name),
                    code: param.code.clone(),
                    desc,
                });
                None
            }
        }
    }

    fn add_types(&mut self, types: Vec<RawType>) -> Result<(), FatalError> {
        for ty in types {
            if !self.admits(&ty.api) {
                continue;
            }
            let category = ty.category.clone();
            match category.as_deref() {
                Some("basetype") => {
                    self.define(&ty.name)?;
                    match ty.type_ref {
                        Some(ref target) if !ty.code.contains('*') => {
                            self.spec
                                .base_type_aliases
                                .insert(ty.name.clone(), target.clone());
                        }
                        _ if ty.code.contains('*') => {
                            self.add_external(&ty.name, ExternalKind::OpaquePointer)
                        }
                        _ => self.add_external(&ty.name, ExternalKind::Platform),
                    }
                }
                Some("bitmask") => {
                    self.define(&ty.name)?;
                    let target = ty.type_ref.unwrap_or_else(|| String::from("VkFlags"));
                    self.spec.bitmask_type_names.push(ty.name.clone());
                    self.spec.typedefs.push(Typedef {
                        name: ty.name,
                        target,
                    });
                }
                Some("handle") => {
                    self.define(&ty.name)?;
                    self.spec.handles.push(HandleDefinition {
                        dispatchable: ty.type_ref.as_deref() == Some("VK_DEFINE_HANDLE"),
                        name: ty.name,
                        parent: ty.parent,
                    });
                }
                Some("struct") | Some("union") => {
                    self.define(&ty.name)?;
                    let is_union = category.as_deref() == Some("union");
                    let definition = self.build_structure(ty)?;
                    if is_union {
                        self.spec.unions.push(definition);
                    } else {
                        self.spec.structures.push(definition);
                    }
                }
                Some("funcpointer") => {
                    self.define(&ty.name)?;
                    self.add_external(&ty.name, ExternalKind::FuncPointer);
                }
                None => match ty.requires.as_deref() {
                    Some("vk_platform") | None => {}
                    Some(_) => {
                        self.define(&ty.name)?;
                        self.add_external(&ty.name, ExternalKind::Platform);
                    }
                },
                Some("enum") => self.enum_type_names.push(ty.name),
                // `include` and `define` have no counterpart in the output.
                _ => {}
            }
        }
        Ok(())
    }

    fn add_external(&mut self, name: &str, kind: ExternalKind) {
        self.spec.external_types.push(ExternalType {
            name: name.to_string(),
            kind,
        });
    }

    fn build_structure(&mut self, ty: RawType) -> Result<StructureDefinition, FatalError> {
        let mut members = Vec::new();
        for member in &ty.members {
            if !self.admits(&member.api) {
                continue;
            }
            let decl = match self.declarator(&ty.name, member) {
                Some(d) => d,
                None => continue,
            };
            let mut array = Vec::new();
            for len in decl.array {
                array.push(match len {
                    ArrayLen::Literal(len) => ArraySize {
                        len,
                        constant: None,
                    },
                    ArrayLen::Constant(constant) => ArraySize {
                        len: self.array_len(&ty.name, &constant)?,
                        constant: Some(constant),
                    },
                });
            }
            members.push(MemberSpec {
                name: member.name.clone(),
                type_spec: TypeSpec {
                    name: member.type_name.clone(),
                    pointers: decl.pointers,
                },
                optional: member.optional,
                array,
                bitfield: decl.bitfield,
                comment: member.comment.clone(),
            });
        }
        Ok(StructureDefinition {
            name: ty.name,
            members,
        })
    }

    fn array_len(&self, owner: &str, constant: &str) -> Result<u32, FatalError> {
        match self.constant_values.get(constant) {
            Some(ConstValue::U32(v)) => Ok(*v),
            Some(ConstValue::USize(v)) if *v <= u32::MAX as u64 => Ok(*v as u32),
            _ => Err(FatalError::UnresolvedConstant {
                owner: owner.to_string(),
                constant: constant.to_string(),
            }),
        }
    }

    fn collect_enums(&mut self, blocks: Vec<RawEnums>) -> Vec<EnumDefinition> {
        // Bit enums referenced by a 64-bit bitmask typedef are 64 bits wide.
        let wide: HashSet<String> = self
            .spec
            .typedefs
            .iter()
            .filter(|t| t.target == "VkFlags64")
            .map(|t| t.name.replace("Flags", "FlagBits"))
            .collect();

        let mut enums = Vec::new();
        for block in blocks.into_iter().filter(|b| !is_constants_block(b)) {
            let name = match block.name {
                Some(name) => name,
                None => continue,
            };
            let kind = match block.kind.as_deref() {
                Some("bitmask") => EnumKind::Bitmask,
                _ => EnumKind::Plain,
            };
            let bit_width = match block.bitwidth {
                Some(64) => 64,
                _ if wide.contains(&name) => 64,
                _ => 32,
            };
            let mut values = Vec::new();
            for raw in &block.values {
                if !self.admits(&raw.api) {
                    continue;
                }
                let (value, bitpos) = match raw.spec {
                    RawEnumSpec::Value(ref text) => match parse_int_literal(text) {
                        Some(v) => (v, None),
                        None => {
                            self.errors.push(Error::UnexpectedAttributeValue {
                                xpath: format!("/registry/enums[@name='{}']/{}", name, raw.name),
                                name: String::from("value"),
                                value: text.clone(),
                            });
                            continue;
                        }
                    },
                    RawEnumSpec::Bitpos(b) => (merge::bitpos_value(b), Some(b)),
                    _ => continue,
                };
                values.push(EnumValue {
                    name: raw.name.clone(),
                    value,
                    bitpos,
                    comment: raw.comment.clone(),
                });
            }
            enums.push(EnumDefinition {
                name,
                kind,
                bit_width,
                values,
            });
        }

        // Enum types may be declared without any <enums> block assigning them values.
        for name in &self.enum_type_names {
            if enums.iter().any(|e| &e.name == name) {
                continue;
            }
            enums.push(EnumDefinition {
                name: name.clone(),
                kind: if name.contains("FlagBits") {
                    EnumKind::Bitmask
                } else {
                    EnumKind::Plain
                },
                bit_width: if wide.contains(name) { 64 } else { 32 },
                values: Vec::new(),
            });
        }
        enums
    }

    fn add_command(&mut self, raw: RawCommand) -> Result<(), FatalError> {
        if !self.admits(&raw.api) {
            return Ok(());
        }
        let proto = match self.declarator(&raw.name, &raw.proto) {
            Some(d) if !d.array.is_empty() => {
                self.errors.push(Error::MalformedDeclaration {
                    xpath: format!("{}/proto", raw.name),
                    code: raw.proto.code.clone(),
                    desc: String::from("commands cannot return arrays"),
                });
                return Ok(());
            }
            Some(d) => d,
            None => return Ok(()),
        };
        let mut params = Vec::new();
        for param in &raw.params {
            if !self.admits(&param.api) {
                continue;
            }
            if let Some(pointers) = self.parameter_pointers(&raw.name, param) {
                params.push(Parameter {
                    name: param.name.clone(),
                    type_spec: TypeSpec {
                        name: param.type_name.clone(),
                        pointers,
                    },
                    optional: param.optional,
                    len: param.len.clone(),
                });
            }
        }
        if self.spec.find_command(&raw.name).is_some() {
            return Err(FatalError::DuplicateDefinition { name: raw.name });
        }
        self.spec.commands.push(CommandDefinition {
            name: raw.name,
            return_type: TypeSpec {
                name: raw.proto.type_name,
                pointers: proto.pointers,
            },
            params,
            success_codes: raw.success_codes,
            error_codes: raw.error_codes,
        });
        Ok(())
    }
}

/// Decimal or hexadecimal integer, optionally negative, with C integer suffixes ignored.
pub fn parse_int_literal(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let text = text.trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'));
    let v = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => text.parse::<i64>().ok()?,
    };
    Some(if negative { -v } else { v })
}

/// Types an API constant from its `type` attribute, or from the literal's shape when the
/// registry gives none. `None` for values that are not literals.
pub fn classify_constant(text: &str, type_name: Option<&str>) -> Option<ConstValue> {
    let text = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();

    if text.starts_with('"') {
        return Some(ConstValue::Str(text.trim_matches('"').to_string()));
    }
    if let Some(rest) = text.strip_prefix('~') {
        let n = parse_int_literal(rest)?;
        let wide = rest.ends_with("ULL") || type_name == Some("uint64_t");
        return Some(if wide {
            ConstValue::U64(!(n as u64))
        } else {
            ConstValue::U32(!(n as u32))
        });
    }
    let hex = text.starts_with("0x") || text.starts_with("0X");
    if !hex
        && (type_name == Some("float")
            || text.contains('.')
            || text.ends_with('f')
            || text.ends_with('F'))
    {
        let body = text.trim_end_matches(|c| c == 'f' || c == 'F');
        body.parse::<f32>().ok()?;
        let mut literal = body.to_string();
        if !literal.contains('.') {
            literal.push_str(".0");
        }
        return Some(ConstValue::F32(literal));
    }

    let v = parse_int_literal(text)?;
    Some(match type_name {
        Some("uint64_t") => ConstValue::U64(v as u64),
        Some("size_t") => ConstValue::USize(v as u64),
        Some("int32_t") => ConstValue::I32(i32::try_from(v).ok()?),
        Some("uint32_t") => ConstValue::U32(u32::try_from(v).ok()?),
        _ if text.ends_with("ULL") => ConstValue::U64(v as u64),
        _ if v < 0 => ConstValue::I32(i32::try_from(v).ok()?),
        _ => ConstValue::U32(u32::try_from(v).ok()?),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_classify_constant() {
        assert_eq!(
            classify_constant("256", Some("uint32_t")),
            Some(ConstValue::U32(256))
        );
        assert_eq!(classify_constant("(~0U)", None), Some(ConstValue::U32(u32::MAX)));
        assert_eq!(classify_constant("(~2U)", None), Some(ConstValue::U32(u32::MAX - 2)));
        assert_eq!(classify_constant("(~0ULL)", None), Some(ConstValue::U64(u64::MAX)));
        assert_eq!(
            classify_constant("1000.0F", None),
            Some(ConstValue::F32("1000.0".to_string()))
        );
        assert_eq!(
            classify_constant("\"VK_KHR_surface\"", None),
            Some(ConstValue::Str("VK_KHR_surface".to_string()))
        );
        assert_eq!(classify_constant("16", Some("size_t")), Some(ConstValue::USize(16)));
        assert_eq!(classify_constant("VK_SOMETHING_ELSE", None), None);
    }

    #[test]
    fn test_parse_int_literal() {
        assert_eq!(parse_int_literal("0x7FFFFFFF"), Some(0x7FFF_FFFF));
        assert_eq!(parse_int_literal("-1"), Some(-1));
        assert_eq!(parse_int_literal("12U"), Some(12));
        assert_eq!(parse_int_literal("one"), None);
    }

    #[test]
    fn test_zero_member() {
        let mut e = EnumDefinition {
            name: String::from("VkCullModeFlagBits"),
            kind: EnumKind::Bitmask,
            bit_width: 32,
            values: vec![EnumValue {
                name: String::from("VK_CULL_MODE_FRONT_BIT"),
                value: 1,
                bitpos: Some(0),
                comment: None,
            }],
        };
        add_zero_member(&mut e);
        assert_eq!(e.values[0].name, "VK_CULL_MODE_NONE");
        assert_eq!(e.values[0].value, 0);

        add_zero_member(&mut e);
        assert_eq!(e.values.len(), 2);
    }

    #[test]
    fn test_resolve_command_alias() {
        let mut spec = Specification::default();
        spec.commands.push(CommandDefinition {
            name: String::from("vkTrimCommandPool"),
            return_type: TypeSpec::new("void"),
            params: Vec::new(),
            success_codes: Vec::new(),
            error_codes: Vec::new(),
        });
        spec.command_aliases.insert(
            String::from("vkTrimCommandPoolKHR"),
            String::from("vkTrimCommandPool"),
        );
        assert!(spec.resolve_command("vkTrimCommandPoolKHR").is_some());
        assert!(spec.resolve_command("vkMissing").is_none());
    }
}
