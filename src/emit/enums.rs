use std::fmt::Write;

use super::Emitter;
use crate::model::{EnumDefinition, EnumKind};
use crate::stub::UNIT_HEADER;
use crate::types::FatalError;

const BITFLAGS_MACRO: &str = "\
macro_rules! vk_bitflags {
    ($name:ident, $repr:ty) => {
        impl $name {
            #[inline]
            pub const fn empty() -> Self {
                $name(0)
            }

            #[inline]
            pub const fn from_raw(raw: $repr) -> Self {
                $name(raw)
            }

            #[inline]
            pub const fn as_raw(self) -> $repr {
                self.0
            }

            #[inline]
            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True when every bit of `other` is set in `self`.
            #[inline]
            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl core::ops::BitOr for $name {
            type Output = Self;

            #[inline]
            fn bitor(self, rhs: Self) -> Self {
                $name(self.0 | rhs.0)
            }
        }

        impl core::ops::BitOrAssign for $name {
            #[inline]
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0
            }
        }

        impl core::ops::BitAnd for $name {
            type Output = Self;

            #[inline]
            fn bitand(self, rhs: Self) -> Self {
                $name(self.0 & rhs.0)
            }
        }
    };
}
";

/// Backing integer of an emitted enum.
fn repr(e: &EnumDefinition) -> &'static str {
    match (e.kind, e.bit_width) {
        (EnumKind::Bitmask, 64) => "u64",
        (EnumKind::Bitmask, _) => "u32",
        (EnumKind::Plain, 64) => "i64",
        (EnumKind::Plain, _) => "i32",
    }
}

fn literal(value: i64, repr: &str) -> String {
    match repr {
        "u64" => format!("0x{:x}", value as u64),
        "u32" => format!("0x{:x}", value as u32),
        _ => value.to_string(),
    }
}

impl<'a> Emitter<'a> {
    pub(super) fn emit_enumerations(&self) -> Result<String, FatalError> {
        let mut out = String::from(UNIT_HEADER);
        out.push_str(BITFLAGS_MACRO);

        let mut aliases: Vec<(&str, &str)> = self
            .spec
            .base_type_aliases
            .keys()
            .map(|name| (name.as_str(), self.types.map(name)))
            .collect();
        aliases.extend(
            self.spec
                .typedefs
                .iter()
                .map(|t| (t.name.as_str(), self.types.map(&t.name))),
        );
        if !aliases.is_empty() {
            out.push('\n');
        }
        for (name, target) in aliases {
            if !self.known.contains(target) {
                return Err(FatalError::UnresolvedType {
                    owner: name.to_string(),
                    name: target.to_string(),
                });
            }
            let _ = writeln!(out, "pub type {} = {};", name, target);
        }

        for e in &self.spec.enums {
            out.push('\n');
            self.write_enum(&mut out, e);
        }
        Ok(out)
    }

    fn write_enum(&self, out: &mut String, e: &EnumDefinition) {
        let name = self.types.map(&e.name);
        let repr = repr(e);
        let members = self.pretty.enum_member_names(e, name);

        out.push_str("#[repr(transparent)]\n");
        out.push_str("#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]\n");
        let _ = writeln!(out, "pub struct {}(pub {});", name, repr);
        if e.kind == EnumKind::Bitmask {
            let _ = writeln!(out, "vk_bitflags!({}, {});", name, repr);
        }
        if e.values.is_empty() {
            return;
        }

        let _ = writeln!(out, "\nimpl {} {{", name);
        for (value, member) in e.values.iter().zip(members.iter()) {
            if let Some(ref comment) = value.comment {
                let _ = writeln!(out, "    /// {}", comment);
            }
            let _ = writeln!(
                out,
                "    pub const {}: Self = {}({});",
                member,
                name,
                literal(value.value, repr)
            );
        }
        out.push_str("}\n");
    }
}

#[cfg(test)]
mod test {
    use super::super::GenConfig;
    use super::*;
    use crate::model::{EnumValue, Specification, Typedef};
    use crate::pretty::IdentifierPrettifier;
    use crate::type_map::TypeNameMappings;
    use crate::variants::NoVariants;

    fn value(name: &str, value: i64) -> EnumValue {
        EnumValue {
            name: name.to_string(),
            value,
            bitpos: None,
            comment: None,
        }
    }

    fn render(spec: &Specification) -> Result<String, FatalError> {
        let types = TypeNameMappings::from_specification(spec);
        let pretty = IdentifierPrettifier::default();
        let config = GenConfig::default();
        Emitter::new(spec, &types, &pretty, &NoVariants, &config).emit_enumerations()
    }

    #[test]
    fn test_plain_enum() {
        let mut spec = Specification::default();
        spec.enums.push(EnumDefinition {
            name: String::from("VkResult"),
            kind: EnumKind::Plain,
            bit_width: 32,
            values: vec![
                value("VK_SUCCESS", 0),
                value("VK_ERROR_OUT_OF_HOST_MEMORY", -1),
            ],
        });

        let text = render(&spec).unwrap();
        assert!(text.starts_with(UNIT_HEADER));
        assert!(text.contains("pub struct VkResult(pub i32);"));
        assert!(text.contains("    pub const Success: Self = VkResult(0);"));
        assert!(text.contains("    pub const VK_ERROR_OUT_OF_HOST_MEMORY: Self = VkResult(-1);"));
        assert!(!text.contains("vk_bitflags!(VkResult"));
    }

    #[test]
    fn test_bitmask_enum() {
        let mut spec = Specification::default();
        spec.base_type_aliases
            .insert(String::from("VkFlags64"), String::from("uint64_t"));
        spec.typedefs.push(Typedef {
            name: String::from("VkAccessFlags2"),
            target: String::from("VkFlags64"),
        });
        spec.enums.push(EnumDefinition {
            name: String::from("VkAccessFlagBits2"),
            kind: EnumKind::Bitmask,
            bit_width: 64,
            values: vec![value("VK_ACCESS_2_NONE", 0), value("VK_ACCESS_2_SHADER_READ_BIT", 1 << 32)],
        });

        let text = render(&spec).unwrap();
        assert!(text.contains("pub type VkFlags64 = u64;"));
        assert!(text.contains("pub type VkAccessFlags2 = u64;"));
        assert!(text.contains("pub struct VkAccessFlagBits2(pub u64);"));
        assert!(text.contains("vk_bitflags!(VkAccessFlagBits2, u64);"));
        assert!(text.contains("    pub const _2ShaderRead: Self = VkAccessFlagBits2(0x100000000);"));
    }

    #[test]
    fn test_enum_without_values() {
        let mut spec = Specification::default();
        spec.enums.push(EnumDefinition {
            name: String::from("VkQueryPoolCreateFlagBits"),
            kind: EnumKind::Bitmask,
            bit_width: 32,
            values: Vec::new(),
        });
        let text = render(&spec).unwrap();
        assert!(text.contains("pub struct VkQueryPoolCreateFlagBits(pub u32);"));
        assert!(!text.contains("impl VkQueryPoolCreateFlagBits {"));
    }
}
