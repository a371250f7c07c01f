//! Alternate-signature overloads of command wrappers.

use crate::model::{CommandDefinition, Pointer, TypeSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantType {
    /// Same as the native parameter.
    Native(TypeSpec),
    /// `&[element]`, or `&mut [element]` when `mutable`.
    Slice { element: TypeSpec, mutable: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantParam {
    pub name: String,
    pub ty: VariantType,
}

/// An overload of a command wrapper. It is emitted as a method named after the plain wrapper
/// plus `suffix`, taking `params`, running the `checks` statements and then calling the plain
/// wrapper with the `forward` expressions, one per native parameter, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandVariant {
    pub suffix: String,
    pub params: Vec<VariantParam>,
    pub checks: Vec<String>,
    pub forward: Vec<String>,
}

/// Expands one command into extra overloads. The plain wrapper is always emitted; only the
/// additional signatures are returned.
pub trait VariantGenerator {
    fn variants(&self, command: &CommandDefinition) -> Vec<CommandVariant>;
}

/// Emits the plain wrapper only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariants;

impl VariantGenerator for NoVariants {
    fn variants(&self, _command: &CommandDefinition) -> Vec<CommandVariant> {
        Vec::new()
    }
}

/// Adds a `_slice` overload to commands that pass arrays as a count and a pointer. Each such
/// pointer becomes a slice and its count parameter is dropped from the signature. Slices sharing
/// a count are asserted to have the length of the first one.
#[derive(Debug, Clone, Copy, Default)]
pub struct SliceVariants;

impl VariantGenerator for SliceVariants {
    fn variants(&self, command: &CommandDefinition) -> Vec<CommandVariant> {
        let params = &command.params;

        // (pointer index, count index) for every pointer sized by a scalar parameter.
        let mut pairs = Vec::new();
        for (i, p) in params.iter().enumerate() {
            let len = match p.len {
                Some(ref len) => len,
                None => continue,
            };
            let depth = p.type_spec.pointer_depth();
            if depth == 0 || (depth == 1 && p.type_spec.name == "void") {
                continue;
            }
            let count = params
                .iter()
                .position(|c| &c.name == len && c.type_spec.pointer_depth() == 0);
            if let Some(count) = count {
                pairs.push((i, count));
            }
        }
        if pairs.is_empty() {
            return Vec::new();
        }

        let mut checks = Vec::new();
        for (n, &(slice, count)) in pairs.iter().enumerate() {
            if let Some(&(first, _)) = pairs[..n].iter().find(|(_, c)| *c == count) {
                let (first, other) = (&params[first].name, &params[slice].name);
                checks.push(format!(
                    "assert_eq!({}.len(), {}.len(), \"`{}` and `{}` must have the same length\");",
                    other, first, other, first
                ));
            }
        }

        let mut variant_params = Vec::new();
        let mut forward = Vec::new();
        for (i, p) in params.iter().enumerate() {
            if let Some(&(slice, _)) = pairs.iter().find(|(_, count)| *count == i) {
                forward.push(format!("{}.len() as _", params[slice].name));
                continue;
            }
            match pairs.iter().find(|(slice, _)| *slice == i) {
                Some(_) => {
                    let mutable = p.type_spec.pointers[0] == Pointer::Mut;
                    let element = TypeSpec {
                        name: p.type_spec.name.clone(),
                        pointers: p.type_spec.pointers[1..].to_vec(),
                    };
                    variant_params.push(VariantParam {
                        name: p.name.clone(),
                        ty: VariantType::Slice { element, mutable },
                    });
                    forward.push(if mutable {
                        format!("{}.as_mut_ptr()", p.name)
                    } else {
                        format!("{}.as_ptr()", p.name)
                    });
                }
                None => {
                    variant_params.push(VariantParam {
                        name: p.name.clone(),
                        ty: VariantType::Native(p.type_spec.clone()),
                    });
                    forward.push(p.name.clone());
                }
            }
        }

        vec![CommandVariant {
            suffix: String::from("_slice"),
            params: variant_params,
            checks,
            forward,
        }]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::Parameter;

    fn param(name: &str, ty: &str, pointers: Vec<Pointer>, len: Option<&str>) -> Parameter {
        Parameter {
            name: name.to_string(),
            type_spec: TypeSpec {
                name: ty.to_string(),
                pointers,
            },
            optional: false,
            len: len.map(String::from),
        }
    }

    fn bind_vertex_buffers() -> CommandDefinition {
        CommandDefinition {
            name: String::from("vkCmdBindVertexBuffers"),
            return_type: TypeSpec::new("void"),
            params: vec![
                param("commandBuffer", "VkCommandBuffer", vec![], None),
                param("bindingCount", "uint32_t", vec![], None),
                param("pBuffers", "VkBuffer", vec![Pointer::Const], Some("bindingCount")),
                param("pOffsets", "VkDeviceSize", vec![Pointer::Const], Some("bindingCount")),
            ],
            success_codes: Vec::new(),
            error_codes: Vec::new(),
        }
    }

    #[test]
    fn test_no_variants() {
        assert!(NoVariants.variants(&bind_vertex_buffers()).is_empty());
    }

    #[test]
    fn test_slice_variant() {
        let variants = SliceVariants.variants(&bind_vertex_buffers());
        assert_eq!(variants.len(), 1);
        let v = &variants[0];
        assert_eq!(v.suffix, "_slice");
        assert_eq!(
            v.params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["commandBuffer", "pBuffers", "pOffsets"]
        );
        assert_eq!(
            v.params[1].ty,
            VariantType::Slice {
                element: TypeSpec::new("VkBuffer"),
                mutable: false
            }
        );
        assert_eq!(
            v.forward,
            vec![
                "commandBuffer".to_string(),
                "pBuffers.len() as _".to_string(),
                "pBuffers.as_ptr()".to_string(),
                "pOffsets.as_ptr()".to_string(),
            ]
        );
        assert_eq!(
            v.checks,
            vec![String::from(
                "assert_eq!(pOffsets.len(), pBuffers.len(), \"`pOffsets` and `pBuffers` must have the same length\");"
            )]
        );
    }

    #[test]
    fn test_independent_counts_are_not_checked() {
        let command = CommandDefinition {
            name: String::from("vkCmdCopy"),
            return_type: TypeSpec::new("void"),
            params: vec![
                param("srcCount", "uint32_t", vec![], None),
                param("pSrc", "uint32_t", vec![Pointer::Const], Some("srcCount")),
                param("dstCount", "uint32_t", vec![], None),
                param("pDst", "uint32_t", vec![Pointer::Mut], Some("dstCount")),
            ],
            success_codes: Vec::new(),
            error_codes: Vec::new(),
        };
        let variants = SliceVariants.variants(&command);
        assert!(variants[0].checks.is_empty());
        assert_eq!(
            variants[0].forward,
            vec![
                "pSrc.len() as _".to_string(),
                "pSrc.as_ptr()".to_string(),
                "pDst.len() as _".to_string(),
                "pDst.as_mut_ptr()".to_string(),
            ]
        );
    }

    #[test]
    fn test_pointer_count_is_not_sliced() {
        let command = CommandDefinition {
            name: String::from("vkEnumeratePhysicalDevices"),
            return_type: TypeSpec::new("VkResult"),
            params: vec![
                param("instance", "VkInstance", vec![], None),
                param("pPhysicalDeviceCount", "uint32_t", vec![Pointer::Mut], None),
                param(
                    "pPhysicalDevices",
                    "VkPhysicalDevice",
                    vec![Pointer::Mut],
                    Some("pPhysicalDeviceCount"),
                ),
            ],
            success_codes: Vec::new(),
            error_codes: Vec::new(),
        };
        assert!(SliceVariants.variants(&command).is_empty());
    }
}
