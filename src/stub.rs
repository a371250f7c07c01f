//! The low-level call-stub unit: the struct owning every command's function pointer and the
//! wrapper methods calling through it.
//!
//! The unit is kept as data rather than text so the native-call rewriter can transform it
//! after generation. With the `serialize` feature it round-trips through RON files.

use std::fmt::Write;

/// Calling convention of native commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum CallConv {
    /// `extern "system"`: stdcall on 32-bit Windows, C everywhere else.
    #[default]
    System,
    C,
}

impl CallConv {
    pub fn name(&self) -> &'static str {
        match *self {
            CallConv::System => "system",
            CallConv::C => "C",
        }
    }

    /// ABI string of emitted function types. The unwinding variant keeps the calling
    /// convention and lets a panicking stand-in unwind into the caller instead of aborting.
    pub fn abi(&self) -> &'static str {
        match *self {
            CallConv::System => "system-unwind",
            CallConv::C => "C-unwind",
        }
    }
}

impl std::str::FromStr for CallConv {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(CallConv::System),
            "C" | "c" => Ok(CallConv::C),
            _ => Err(format!("unknown calling convention `{}`", s)),
        }
    }
}

impl std::fmt::Display for CallConv {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StubParam {
    pub name: String,
    /// Rust type, already rendered.
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StubSignature {
    pub params: Vec<StubParam>,
    /// `None` for commands returning `void`.
    pub ret: Option<String>,
}

impl StubSignature {
    fn write_ret(&self, out: &mut String) {
        if let Some(ref ret) = self.ret {
            let _ = write!(out, " -> {}", ret);
        }
    }

    fn native_fn_type(&self, abi: &str) -> String {
        let mut out = format!("unsafe extern \"{}\" fn(", abi);
        let types: Vec<&str> = self.params.iter().map(|p| p.ty.as_str()).collect();
        out.push_str(&types.join(", "));
        out.push(')');
        self.write_ret(&mut out);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum FieldKind {
    /// Typed function pointer, called directly by its wrapper.
    Typed,
    /// Untyped address, `*const c_void`, that a direct-call wrapper reinterprets.
    Raw,
}

/// Holder of one command's resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StubField {
    pub name: String,
    /// Registry name the address is resolved by.
    pub command: String,
    pub signature: StubSignature,
    pub kind: FieldKind,
}

/// One native argument of a direct call, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ArgLoad {
    pub index: usize,
    pub name: String,
    pub ty: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum StubBody {
    /// Body of a method awaiting rewriting. Panics if it is ever run.
    Placeholder,
    /// `(self.field)(args..)`
    CallField { field: String, args: Vec<String> },
    /// Reinterprets the raw address in `field` with `call_conv` and calls it with `args`.
    IndirectCall {
        field: String,
        args: Vec<ArgLoad>,
        call_conv: CallConv,
    },
    /// `checks` statements, then `self.method(args..)`. Used by alternate-signature overloads.
    Forward {
        method: String,
        #[cfg_attr(feature = "serialize", serde(default))]
        checks: Vec<String>,
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StubMethod {
    pub name: String,
    pub command: String,
    pub docs: Vec<String>,
    pub signature: StubSignature,
    pub body: StubBody,
    /// Set on methods whose body must be replaced by a direct call through the command's
    /// `<command>_ptr` field.
    pub direct_call_marker: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StubModule {
    pub type_name: String,
    pub call_conv: CallConv,
    /// Source emitted ahead of the stubs, e.g. the API constants sharing the unit.
    #[cfg_attr(feature = "serialize", serde(default))]
    pub prelude: String,
    pub fields: Vec<StubField>,
    pub methods: Vec<StubMethod>,
}

/// First line of every emitted source unit. Units import each other through the glue module.
pub const UNIT_HEADER: &str = "use super::*;\n\n";

/// Name of the field holding the raw address of `command` for direct calls.
pub fn backing_field_name(command: &str) -> String {
    format!("{}_ptr", command)
}

fn stand_in_name(command: &str) -> String {
    format!("unloaded_{}", command)
}

fn pfn_name(command: &str) -> String {
    format!("PFN_{}", command)
}

impl StubModule {
    pub fn new(type_name: &str, call_conv: CallConv) -> Self {
        StubModule {
            type_name: type_name.to_string(),
            call_conv,
            prelude: String::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&StubField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&StubMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Number of methods still waiting for the direct-call rewrite.
    pub fn marked_methods(&self) -> usize {
        self.methods.iter().filter(|m| m.direct_call_marker).count()
    }

    /// Renders the unit as Rust source. It expects `c_void` and `CStr` and every type named
    /// in the signatures to be in scope.
    pub fn render(&self) -> String {
        let abi = self.call_conv.abi();
        let mut out = String::new();

        if !self.prelude.is_empty() {
            out.push_str(&self.prelude);
            out.push('\n');
        }

        for field in &self.fields {
            let _ = writeln!(
                out,
                "pub type {} = {};",
                pfn_name(&field.command),
                field.signature.native_fn_type(abi)
            );
        }
        out.push('\n');

        out.push_str("#[cold]\n#[inline(never)]\nfn unloaded_command(name: &str) -> ! {\n");
        out.push_str("    panic!(\"command {} is not loaded\", name)\n}\n\n");
        for field in &self.fields {
            let params: Vec<String> = field
                .signature
                .params
                .iter()
                .map(|p| format!("_: {}", p.ty))
                .collect();
            let _ = write!(
                out,
                "unsafe extern \"{}\" fn {}({})",
                abi,
                stand_in_name(&field.command),
                params.join(", ")
            );
            field.signature.write_ret(&mut out);
            let _ = writeln!(out, " {{\n    unloaded_command(\"{}\")\n}}\n", field.command);
        }

        let _ = writeln!(out, "pub struct {} {{", self.type_name);
        for field in &self.fields {
            let ty = match field.kind {
                FieldKind::Typed => pfn_name(&field.command),
                FieldKind::Raw => String::from("*const c_void"),
            };
            let _ = writeln!(out, "    pub {}: {},", field.name, ty);
        }
        out.push_str("    unresolved: Vec<&'static CStr>,\n}\n\n");

        let _ = writeln!(out, "impl {} {{", self.type_name);
        self.render_loader(&mut out);
        for method in &self.methods {
            out.push('\n');
            self.render_method(&mut out, method);
        }
        out.push_str("}\n");
        out
    }

    fn render_loader(&self, out: &mut String) {
        out.push_str(concat!(
            "    /// Resolves every command through `load`. Commands `load` returns null for are\n",
            "    /// bound to a stand-in that panics when called, and are listed by `unresolved`.\n",
            "    pub fn load_with<F: FnMut(&CStr) -> *const c_void>(mut load: F) -> Self {\n",
            "        let mut unresolved: Vec<&'static CStr> = Vec::new();\n",
            "        let mut resolve = |name: &'static [u8], stand_in: *const c_void| -> *const c_void {\n",
            "            let name = unsafe { CStr::from_bytes_with_nul_unchecked(name) };\n",
            "            let address = load(name);\n",
            "            if address.is_null() {\n",
            "                unresolved.push(name);\n",
            "                stand_in\n",
            "            } else {\n",
            "                address\n",
            "            }\n",
            "        };\n",
        ));
        let _ = writeln!(out, "        let mut commands = unsafe {{\n            {} {{", self.type_name);
        for field in &self.fields {
            let resolved = format!(
                "resolve(b\"{}\\0\", {} as *const c_void)",
                field.command,
                stand_in_name(&field.command)
            );
            match field.kind {
                FieldKind::Typed => {
                    let _ = writeln!(
                        out,
                        "                {}: core::mem::transmute::<*const c_void, {}>({}),",
                        field.name,
                        pfn_name(&field.command),
                        resolved
                    );
                }
                FieldKind::Raw => {
                    let _ = writeln!(out, "                {}: {},", field.name, resolved);
                }
            }
        }
        out.push_str("                unresolved: Vec::new(),\n            }\n        };\n");
        out.push_str("        commands.unresolved = unresolved;\n        commands\n    }\n\n");
        out.push_str("    /// Commands that could not be resolved by `load_with`.\n");
        out.push_str("    pub fn unresolved(&self) -> &[&'static CStr] {\n        &self.unresolved\n    }\n");
    }

    fn render_method(&self, out: &mut String, method: &StubMethod) {
        for line in &method.docs {
            if line.is_empty() {
                out.push_str("    ///\n");
            } else {
                let _ = writeln!(out, "    /// {}", line);
            }
        }
        let params: Vec<String> = std::iter::once(String::from("&self"))
            .chain(
                method
                    .signature
                    .params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.ty)),
            )
            .collect();
        let _ = write!(
            out,
            "    pub unsafe fn {}({})",
            method.name,
            params.join(", ")
        );
        method.signature.write_ret(out);
        out.push_str(" {\n");

        match method.body {
            StubBody::Placeholder => {
                let _ = writeln!(
                    out,
                    "        unimplemented!(\"{} is a direct-call stub that was not rewritten\")",
                    method.command
                );
            }
            StubBody::CallField {
                ref field,
                ref args,
            } => {
                let _ = writeln!(out, "        (self.{})({})", field, args.join(", "));
            }
            StubBody::IndirectCall {
                ref field,
                ref args,
                call_conv,
            } => {
                let signature = StubSignature {
                    params: args
                        .iter()
                        .map(|a| StubParam {
                            name: a.name.clone(),
                            ty: a.ty.clone(),
                        })
                        .collect(),
                    ret: method.signature.ret.clone(),
                };
                let _ = writeln!(
                    out,
                    "        let f = core::mem::transmute::<*const c_void, {}>(self.{});",
                    signature.native_fn_type(call_conv.abi()),
                    field
                );
                let names: Vec<&str> = args.iter().map(|a| a.name.as_str()).collect();
                let _ = writeln!(out, "        f({})", names.join(", "));
            }
            StubBody::Forward {
                ref method,
                ref checks,
                ref args,
            } => {
                for check in checks {
                    let _ = writeln!(out, "        {}", check);
                }
                let _ = writeln!(out, "        self.{}({})", method, args.join(", "));
            }
        }
        out.push_str("    }\n");
    }
}

#[cfg(feature = "serialize")]
impl StubModule {
    /// Reads a unit saved by [`StubModule::save`].
    pub fn load(path: &std::path::Path) -> Result<Self, crate::types::FatalError> {
        let text = std::fs::read_to_string(path)?;
        ron::from_str(&text).map_err(|e| crate::types::FatalError::Artifact(e.to_string()))
    }

    pub fn save(&self, path: &std::path::Path) -> Result<(), crate::types::FatalError> {
        let text = ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::new().indentor(String::from("\t")),
        )
        .map_err(|e| crate::types::FatalError::Artifact(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
