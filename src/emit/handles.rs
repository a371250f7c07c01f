use std::fmt::Write;

use super::Emitter;
use crate::model::{ExternalKind, HandleDefinition};
use crate::stub::UNIT_HEADER;

fn write_handle(out: &mut String, handle: &HandleDefinition) {
    if let Some(ref parent) = handle.parent {
        let _ = writeln!(out, "/// Child of `{}`.", parent);
    }
    let (repr, null) = if handle.dispatchable {
        ("*mut c_void", "core::ptr::null_mut()")
    } else {
        ("u64", "0")
    };
    out.push_str("#[repr(transparent)]\n");
    out.push_str("#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]\n");
    let _ = writeln!(out, "pub struct {}(pub {});", handle.name, repr);
    let _ = writeln!(
        out,
        "\nimpl {0} {{\n    #[inline]\n    pub const fn null() -> Self {{\n        {0}({1})\n    }}\n\n    #[inline]\n    pub fn is_null(self) -> bool {{\n        self == Self::null()\n    }}\n}}\n",
        handle.name, null
    );
}

impl<'a> Emitter<'a> {
    /// Handles and the opaque platform types the registry only names.
    pub(super) fn emit_handles(&self) -> String {
        let mut out = String::from(UNIT_HEADER);
        for handle in &self.spec.handles {
            write_handle(&mut out, handle);
        }

        for external in &self.spec.external_types {
            let target = match external.kind {
                ExternalKind::Platform => "c_void",
                ExternalKind::OpaquePointer | ExternalKind::FuncPointer => "*const c_void",
            };
            let _ = writeln!(out, "pub type {} = {};", external.name, target);
        }
        log::debug!(
            "emitted {} handles, {} external types",
            self.spec.handles.len(),
            self.spec.external_types.len()
        );
        out
    }
}
