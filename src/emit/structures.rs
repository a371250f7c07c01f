use std::fmt::Write;

use super::Emitter;
use crate::model::{MemberSpec, StructureDefinition};
use crate::pretty::escape_keyword;
use crate::stub::UNIT_HEADER;
use crate::types::FatalError;

/// Width of the storage unit adjacent bitfields are packed into.
const BITFIELD_UNIT: u32 = 32;

/// One emitted field: either a single member or a run of bitfields sharing storage.
struct Field<'m> {
    members: Vec<&'m MemberSpec>,
    bits: u32,
}

/// Groups adjacent bitfield members whose widths add up to at most one storage unit.
fn pack_fields(members: &[MemberSpec]) -> Vec<Field<'_>> {
    let mut fields: Vec<Field> = Vec::new();
    for member in members {
        if let Some(bits) = member.bitfield {
            if let Some(last) = fields.last_mut() {
                if last.bits > 0 && last.bits + bits <= BITFIELD_UNIT {
                    last.members.push(member);
                    last.bits += bits;
                    continue;
                }
            }
            fields.push(Field {
                members: vec![member],
                bits,
            });
        } else {
            fields.push(Field {
                members: vec![member],
                bits: 0,
            });
        }
    }
    fields
}

impl<'a> Emitter<'a> {
    pub(super) fn emit_structures(
        &self,
        definitions: &[StructureDefinition],
        unions: bool,
    ) -> Result<String, FatalError> {
        let keyword = if unions { "union" } else { "struct" };
        let mut out = String::from(UNIT_HEADER);
        for definition in definitions {
            let mut body = String::new();
            for field in pack_fields(&definition.members) {
                self.write_field(&mut body, &definition.name, &field)?;
            }
            out.push_str("#[repr(C)]\n#[derive(Copy, Clone)]\n");
            let _ = writeln!(out, "pub {} {} {{", keyword, definition.name);
            out.push_str(&body);
            out.push_str("}\n\n");
        }
        log::debug!("emitted {} {}s", definitions.len(), keyword);
        Ok(out)
    }

    fn write_field(&self, out: &mut String, owner: &str, field: &Field<'_>) -> Result<(), FatalError> {
        let first = field.members[0];

        let mut ty = self.render_type(&first.type_spec, owner)?;
        for size in first.array.iter().rev() {
            ty = match size.constant {
                Some(ref constant) => format!("[{}; {} as usize]", ty, constant),
                None => format!("[{}; {}]", ty, size.len),
            };
        }

        let name = if field.members.len() > 1 {
            let names: Vec<&str> = field.members.iter().map(|m| m.name.as_str()).collect();
            names.join("_and_")
        } else {
            escape_keyword(&first.name)
        };

        for member in &field.members {
            if let Some(ref comment) = member.comment {
                let _ = writeln!(out, "    /// {}", comment);
            }
        }
        if field.bits > 0 {
            let layout: Vec<String> = field
                .members
                .iter()
                .map(|m| format!("{}:{}", m.name, m.bitfield.unwrap_or(0)))
                .collect();
            let _ = writeln!(out, "    /// Bitfields, low bits first: {}", layout.join(", "));
        }
        let _ = writeln!(out, "    pub {}: {},", name, ty);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::super::GenConfig;
    use super::*;
    use crate::model::{ArraySize, Pointer, Specification, TypeSpec};
    use crate::pretty::IdentifierPrettifier;
    use crate::type_map::TypeNameMappings;
    use crate::variants::NoVariants;

    fn member(name: &str, ty: &str) -> MemberSpec {
        MemberSpec {
            name: name.to_string(),
            type_spec: TypeSpec::new(ty),
            optional: false,
            array: Vec::new(),
            bitfield: None,
            comment: None,
        }
    }

    fn bitfield(name: &str, bits: u32) -> MemberSpec {
        MemberSpec {
            bitfield: Some(bits),
            ..member(name, "uint32_t")
        }
    }

    fn render(spec: &Specification) -> Result<String, FatalError> {
        let types = TypeNameMappings::from_specification(spec);
        let pretty = IdentifierPrettifier::default();
        let config = GenConfig::default();
        Emitter::new(spec, &types, &pretty, &NoVariants, &config)
            .emit_structures(&spec.structures, false)
    }

    #[test]
    fn test_structure_fields() {
        let mut spec = Specification::default();
        let mut p_next = member("pNext", "void");
        p_next.type_spec.pointers.push(Pointer::Const);
        let mut name = member("deviceName", "char");
        name.array.push(ArraySize {
            len: 256,
            constant: Some(String::from("VK_MAX_PHYSICAL_DEVICE_NAME_SIZE")),
        });
        let mut matrix = member("matrix", "float");
        matrix.array = vec![
            ArraySize {
                len: 3,
                constant: None,
            },
            ArraySize {
                len: 4,
                constant: None,
            },
        ];
        spec.structures.push(StructureDefinition {
            name: String::from("VkExample"),
            members: vec![member("type", "uint32_t"), p_next, name, matrix],
        });

        let text = render(&spec).unwrap();
        assert!(text.contains("#[repr(C)]\n#[derive(Copy, Clone)]\npub struct VkExample {\n"));
        assert!(text.contains("    pub r#type: u32,\n"));
        assert!(text.contains("    pub pNext: *const c_void,\n"));
        assert!(text.contains(
            "    pub deviceName: [c_char; VK_MAX_PHYSICAL_DEVICE_NAME_SIZE as usize],\n"
        ));
        assert!(text.contains("    pub matrix: [[f32; 4]; 3],\n"));
    }

    #[test]
    fn test_bitfields_are_packed() {
        let members = vec![
            bitfield("instanceCustomIndex", 24),
            bitfield("mask", 8),
            bitfield("instanceShaderBindingTableRecordOffset", 24),
            bitfield("flags", 8),
            member("accelerationStructureReference", "uint64_t"),
        ];
        let fields = pack_fields(&members);
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].bits, 32);
        assert_eq!(fields[1].members.len(), 2);
        assert_eq!(fields[2].bits, 0);

        let mut spec = Specification::default();
        spec.structures.push(StructureDefinition {
            name: String::from("VkAccelerationStructureInstanceKHR"),
            members,
        });
        let text = render(&spec).unwrap();
        assert!(text.contains("    pub instanceCustomIndex_and_mask: u32,\n"));
        assert!(text.contains("    pub accelerationStructureReference: u64,\n"));
    }

    #[test]
    fn test_unknown_member_type() {
        let mut spec = Specification::default();
        spec.structures.push(StructureDefinition {
            name: String::from("VkBroken"),
            members: vec![member("thing", "VkNowhere")],
        });
        match render(&spec) {
            Err(FatalError::UnresolvedType { owner, name }) => {
                assert_eq!(owner, "VkBroken");
                assert_eq!(name, "VkNowhere");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
