//! Replaces the placeholder bodies of direct-call stubs with a call through the command's raw
//! function pointer.

use crate::stub::{backing_field_name, ArgLoad, CallConv, FieldKind, StubBody, StubModule};
use crate::types::FatalError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Methods rewritten by this run, in unit order.
    pub rewritten: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCallRewriter {
    call_conv: CallConv,
}

impl NativeCallRewriter {
    pub fn new(call_conv: CallConv) -> Self {
        NativeCallRewriter { call_conv }
    }

    /// Rewrites every marked method of `module` and clears its marker, so running it again
    /// changes nothing.
    ///
    /// Each rewritten body passes the method's parameters, in declaration order, to the address
    /// held in the raw `<command>_ptr` field and returns the result. A marked method without
    /// that field is a [`FatalError::MissingBackingField`], and `module` is left untouched.
    pub fn rewrite(&self, module: &mut StubModule) -> Result<RewriteReport, FatalError> {
        for method in module.methods.iter().filter(|m| m.direct_call_marker) {
            let field = backing_field_name(&method.command);
            let has_field = module
                .fields
                .iter()
                .any(|f| f.name == field && f.kind == FieldKind::Raw);
            if !has_field {
                return Err(FatalError::MissingBackingField {
                    owner: module.type_name.clone(),
                    method: method.name.clone(),
                    field,
                });
            }
        }

        let mut report = RewriteReport::default();
        for method in module.methods.iter_mut().filter(|m| m.direct_call_marker) {
            let args = method
                .signature
                .params
                .iter()
                .enumerate()
                .map(|(index, p)| ArgLoad {
                    index,
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                })
                .collect();
            method.body = StubBody::IndirectCall {
                field: backing_field_name(&method.command),
                args,
                call_conv: self.call_conv,
            };
            method.direct_call_marker = false;
            log::debug!("rewrote {}::{}", module.type_name, method.name);
            report.rewritten.push(method.name.clone());
        }

        log::info!(
            "{}: rewrote {} direct-call stubs",
            module.type_name,
            report.rewritten.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::stub::{StubField, StubMethod, StubParam, StubSignature};

    fn signature(n: usize) -> StubSignature {
        StubSignature {
            params: (0..n)
                .map(|i| StubParam {
                    name: format!("a{}", i),
                    ty: String::from("u32"),
                })
                .collect(),
            ret: Some(String::from("u32")),
        }
    }

    fn module(with_field: bool) -> StubModule {
        let mut module = StubModule::new("Commands", CallConv::System);
        if with_field {
            module.fields.push(StubField {
                name: String::from("vkSum_ptr"),
                command: String::from("vkSum"),
                signature: signature(3),
                kind: FieldKind::Raw,
            });
        }
        module.methods.push(StubMethod {
            name: String::from("sum"),
            command: String::from("vkSum"),
            docs: Vec::new(),
            signature: signature(3),
            body: StubBody::Placeholder,
            direct_call_marker: true,
        });
        module
    }

    #[test]
    fn test_rewrite_forwards_arguments() {
        let mut m = module(true);
        let report = NativeCallRewriter::new(CallConv::System)
            .rewrite(&mut m)
            .unwrap();
        assert_eq!(report.rewritten, vec![String::from("sum")]);

        let method = m.method("sum").unwrap();
        assert!(!method.direct_call_marker);
        match method.body {
            StubBody::IndirectCall {
                ref field,
                ref args,
                call_conv,
            } => {
                assert_eq!(field, "vkSum_ptr");
                assert_eq!(call_conv, CallConv::System);
                let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["a0", "a1", "a2"]);
                assert!(args.iter().enumerate().all(|(i, a)| a.index == i));
            }
            ref other => panic!("unexpected body: {:?}", other),
        }

        let text = m.render();
        assert!(text.contains(
            "let f = core::mem::transmute::<*const c_void, unsafe extern \"system-unwind\" fn(u32, u32, u32) -> u32>(self.vkSum_ptr);"
        ));
        assert!(text.contains("        f(a0, a1, a2)\n"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut m = module(true);
        let rewriter = NativeCallRewriter::new(CallConv::System);
        rewriter.rewrite(&mut m).unwrap();
        let once = m.clone();

        let report = rewriter.rewrite(&mut m).unwrap();
        assert!(report.rewritten.is_empty());
        assert_eq!(m, once);
    }

    #[test]
    fn test_missing_backing_field() {
        let mut m = module(false);
        let before = m.clone();
        match NativeCallRewriter::new(CallConv::C).rewrite(&mut m) {
            Err(FatalError::MissingBackingField {
                owner,
                method,
                field,
            }) => {
                assert_eq!(owner, "Commands");
                assert_eq!(method, "sum");
                assert_eq!(field, "vkSum_ptr");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(m, before);
    }
}
