use std::collections::BTreeMap;
use std::fmt::Write;

use super::{CallStrategy, Emitter};
use crate::model::{CommandDefinition, ConstValue, Constant};
use crate::pretty::{command_method_name, escape_keyword};
use crate::stub::{
    backing_field_name, FieldKind, StubBody, StubField, StubMethod, StubModule, StubParam,
    StubSignature,
};
use crate::types::FatalError;
use crate::variants::VariantType;

fn write_constant(out: &mut String, constant: &Constant) {
    if let Some(ref comment) = constant.comment {
        let _ = writeln!(out, "/// {}", comment);
    }
    let (ty, value) = match constant.value {
        ConstValue::U32(v) => ("u32", v.to_string()),
        ConstValue::U64(v) => ("u64", v.to_string()),
        ConstValue::USize(v) => ("usize", v.to_string()),
        ConstValue::I32(v) => ("i32", v.to_string()),
        ConstValue::F32(ref v) => ("f32", v.clone()),
        ConstValue::Str(ref v) => ("&[u8]", format!("b\"{}\\0\"", v)),
    };
    let _ = writeln!(out, "pub const {}: {} = {};", constant.name, ty, value);
}

impl<'a> Emitter<'a> {
    /// Commands unit, with the API constants as its prelude.
    pub(super) fn emit_commands(&self) -> Result<StubModule, FatalError> {
        let mut module =
            StubModule::new(&self.config.commands_type, self.config.calling_convention);
        for constant in &self.spec.constants {
            write_constant(&mut module.prelude, constant);
        }

        let providers = self.command_providers()?;

        for command in &self.spec.commands {
            let signature = self.signature(command)?;
            let method_name = command_method_name(&command.name);
            let docs = command_docs(command, providers.get(command.name.as_str()));
            let args: Vec<String> = signature.params.iter().map(|p| p.name.clone()).collect();

            let (field, body, marked) = match self.config.strategy {
                CallStrategy::Indirect => (
                    StubField {
                        name: command.name.clone(),
                        command: command.name.clone(),
                        signature: signature.clone(),
                        kind: FieldKind::Typed,
                    },
                    StubBody::CallField {
                        field: command.name.clone(),
                        args,
                    },
                    false,
                ),
                CallStrategy::Direct => (
                    StubField {
                        name: backing_field_name(&command.name),
                        command: command.name.clone(),
                        signature: signature.clone(),
                        kind: FieldKind::Raw,
                    },
                    StubBody::Placeholder,
                    true,
                ),
            };
            module.fields.push(field);

            for variant in self.variants.variants(command) {
                let mut params = Vec::with_capacity(variant.params.len());
                for param in &variant.params {
                    let ty = match param.ty {
                        VariantType::Native(ref spec) => self.render_type(spec, &command.name)?,
                        VariantType::Slice {
                            ref element,
                            mutable,
                        } => format!(
                            "&{}[{}]",
                            if mutable { "mut " } else { "" },
                            self.render_type(element, &command.name)?
                        ),
                    };
                    params.push(StubParam {
                        name: escape_keyword(&param.name),
                        ty,
                    });
                }
                module.methods.push(StubMethod {
                    name: format!("{}{}", method_name, variant.suffix),
                    command: command.name.clone(),
                    docs: vec![format!("Overload of [`Self::{}`].", method_name)],
                    signature: StubSignature {
                        params,
                        ret: signature.ret.clone(),
                    },
                    body: StubBody::Forward {
                        method: method_name.clone(),
                        checks: variant.checks,
                        args: variant.forward,
                    },
                    direct_call_marker: false,
                });
            }

            module.methods.push(StubMethod {
                name: method_name,
                command: command.name.clone(),
                docs,
                signature,
                body,
                direct_call_marker: marked,
            });
        }

        // Stable, so an overload keeps its place relative to equally named methods.
        module.methods.sort_by(|a, b| a.name.cmp(&b.name));

        log::debug!(
            "{}: {} fields, {} methods, {} marked for direct calls",
            module.type_name,
            module.fields.len(),
            module.methods.len(),
            module.marked_methods()
        );
        Ok(module)
    }

    fn signature(&self, command: &CommandDefinition) -> Result<StubSignature, FatalError> {
        let mut params = Vec::with_capacity(command.params.len());
        for param in &command.params {
            params.push(StubParam {
                name: escape_keyword(&param.name),
                ty: self.render_type(&param.type_spec, &command.name)?,
            });
        }
        let ret = if command.return_type.is_void() {
            None
        } else {
            Some(self.render_type(&command.return_type, &command.name)?)
        };
        Ok(StubSignature { params, ret })
    }

    /// Command name to the features and extensions requiring it. Every required name must
    /// resolve to a modelled command, directly or through aliases.
    fn command_providers(&self) -> Result<BTreeMap<&'a str, Vec<&'a str>>, FatalError> {
        let spec = self.spec;
        let requirements = spec
            .features
            .iter()
            .map(|f| (f.name.as_str(), &f.commands))
            .chain(
                spec.extensions
                    .iter()
                    .map(|e| (e.name.as_str(), &e.commands)),
            );

        let mut providers: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (owner, commands) in requirements {
            for name in commands {
                let command =
                    spec.resolve_command(name)
                        .ok_or_else(|| FatalError::UnresolvedCommand {
                            owner: owner.to_string(),
                            name: name.clone(),
                        })?;
                let owners = providers.entry(command.name.as_str()).or_default();
                if !owners.contains(&owner) {
                    owners.push(owner);
                }
            }
        }
        Ok(providers)
    }
}

fn command_docs(command: &CommandDefinition, providers: Option<&Vec<&str>>) -> Vec<String> {
    let mut docs = vec![format!("`{}`", command.name)];
    if let Some(providers) = providers {
        docs.push(String::new());
        docs.push(format!("Provided by {}.", providers.join(", ")));
    }
    if !command.success_codes.is_empty() {
        docs.push(String::new());
        docs.push(format!("Success codes: {}.", command.success_codes.join(", ")));
    }
    if !command.error_codes.is_empty() {
        docs.push(String::new());
        docs.push(format!("Error codes: {}.", command.error_codes.join(", ")));
    }
    docs
}

#[cfg(test)]
mod test {
    use super::super::GenConfig;
    use super::*;
    use crate::model::{
        ExtensionDefinition, HandleDefinition, Parameter, Pointer, Specification, TypeSpec,
    };
    use crate::pretty::IdentifierPrettifier;
    use crate::type_map::TypeNameMappings;
    use crate::variants::{NoVariants, SliceVariants, VariantGenerator};

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

    fn spec() -> Specification {
        let mut spec = Specification::default();
        spec.handles.push(HandleDefinition {
            name: String::from("VkCommandBuffer"),
            parent: None,
            dispatchable: true,
        });
        spec.constants.push(Constant {
            name: String::from("VK_KHR_SURFACE_EXTENSION_NAME"),
            value: ConstValue::Str(String::from("VK_KHR_surface")),
            comment: None,
        });
        spec.constants.push(Constant {
            name: String::from("VK_LOD_CLAMP_NONE"),
            value: ConstValue::F32(String::from("1000.0")),
            comment: None,
        });
        spec.commands.push(CommandDefinition {
            name: String::from("vkCmdSetViewportMask"),
            return_type: TypeSpec::new("void"),
            params: vec![
                param("commandBuffer", "VkCommandBuffer", vec![], None),
                param("maskCount", "uint32_t", vec![], None),
                param("pMasks", "uint32_t", vec![Pointer::Const], Some("maskCount")),
            ],
            success_codes: Vec::new(),
            error_codes: Vec::new(),
        });
        spec.extensions.push(ExtensionDefinition {
            name: String::from("VK_EXT_viewport_mask"),
            number: 7,
            ext_type: Some(String::from("device")),
            constants: Vec::new(),
            enum_values: Vec::new(),
            commands: vec![String::from("vkCmdSetViewportMaskEXT")],
        });
        spec.command_aliases.insert(
            String::from("vkCmdSetViewportMaskEXT"),
            String::from("vkCmdSetViewportMask"),
        );
        spec
    }

    fn emit(
        spec: &Specification,
        strategy: CallStrategy,
        variants: &dyn VariantGenerator,
    ) -> Result<StubModule, FatalError> {
        let types = TypeNameMappings::from_specification(spec);
        let pretty = IdentifierPrettifier::default();
        let config = GenConfig {
            strategy,
            ..GenConfig::default()
        };
        Emitter::new(spec, &types, &pretty, variants, &config).emit_commands()
    }

    #[test]
    fn test_indirect() {
        let module = emit(&spec(), CallStrategy::Indirect, &NoVariants).unwrap();
        assert_eq!(module.type_name, "Commands");
        assert!(module
            .prelude
            .contains("pub const VK_KHR_SURFACE_EXTENSION_NAME: &[u8] = b\"VK_KHR_surface\\0\";"));
        assert!(module
            .prelude
            .contains("pub const VK_LOD_CLAMP_NONE: f32 = 1000.0;"));

        let field = module.field("vkCmdSetViewportMask").unwrap();
        assert_eq!(field.kind, FieldKind::Typed);

        let method = module.method("cmd_set_viewport_mask").unwrap();
        assert!(!method.direct_call_marker);
        assert_eq!(method.signature.ret, None);
        assert_eq!(
            method.signature.params[2],
            StubParam {
                name: String::from("pMasks"),
                ty: String::from("*const u32"),
            }
        );
        assert!(method
            .docs
            .contains(&String::from("Provided by VK_EXT_viewport_mask.")));
        assert_eq!(module.marked_methods(), 0);
    }

    #[test]
    fn test_direct() {
        let module = emit(&spec(), CallStrategy::Direct, &NoVariants).unwrap();
        let field = module.field("vkCmdSetViewportMask_ptr").unwrap();
        assert_eq!(field.kind, FieldKind::Raw);
        let method = module.method("cmd_set_viewport_mask").unwrap();
        assert!(method.direct_call_marker);
        assert_eq!(method.body, StubBody::Placeholder);
        assert_eq!(module.marked_methods(), 1);
    }

    #[test]
    fn test_slice_overload_is_sorted_after_plain() {
        let module = emit(&spec(), CallStrategy::Indirect, &SliceVariants).unwrap();
        let names: Vec<&str> = module.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["cmd_set_viewport_mask", "cmd_set_viewport_mask_slice"]
        );
        let overload = &module.methods[1];
        assert_eq!(overload.signature.params[1].ty, "&[u32]");
        assert_eq!(
            overload.body,
            StubBody::Forward {
                method: String::from("cmd_set_viewport_mask"),
                checks: Vec::new(),
                args: vec![
                    String::from("commandBuffer"),
                    String::from("pMasks.len() as _"),
                    String::from("pMasks.as_ptr()"),
                ],
            }
        );
    }

    #[test]
    fn test_unresolved_required_command() {
        let mut spec = spec();
        spec.extensions[0]
            .commands
            .push(String::from("vkCmdDrawNothing"));
        match emit(&spec, CallStrategy::Indirect, &NoVariants) {
            Err(FatalError::UnresolvedCommand { owner, name }) => {
                assert_eq!(owner, "VK_EXT_viewport_mask");
                assert_eq!(name, "vkCmdDrawNothing");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
