//! Registry identifiers to idiomatic Rust identifiers.

use std::collections::{HashMap, HashSet};

use crate::model::EnumDefinition;

/// Values whose member name cannot be derived from their enum's prefix.
const OVERRIDES: &[(&str, &str)] = &[
    ("VK_SUCCESS", "Success"),
    ("VK_NOT_READY", "NotReady"),
    ("VK_TIMEOUT", "Timeout"),
    ("VK_EVENT_SET", "EventSet"),
    ("VK_EVENT_RESET", "EventReset"),
    ("VK_INCOMPLETE", "Incomplete"),
    ("VK_STENCIL_FRONT_AND_BACK", "FrontAndBack"),
];

/// Author tags used when the registry carries no `<tags>` block.
const DEFAULT_TAGS: &[&str] = &[
    "KHR", "EXT", "NV", "NVX", "AMD", "AMDX", "ARM", "IMG", "INTEL", "GOOGLE", "QCOM", "MESA",
    "HUAWEI", "VALVE", "FUCHSIA", "ANDROID", "MVK", "NN", "SEC", "LUNARG", "QNX", "MSFT", "KHX",
];

/// Vendor suffixes spelled as runs of single-letter chunks in type names.
const VENDOR_RUNS: &[&[&str]] = &[&["K", "H", "R"], &["A", "M", "D"], &["E", "X", "T"]];

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
    "pub", "ref", "return", "static", "struct", "trait", "true", "type", "unsafe", "use",
    "where", "while", "abstract", "become", "box", "do", "final", "macro", "override", "priv",
    "try", "typeof", "unsized", "virtual", "yield",
];

/// Splits a CamelCase name before every upper-case letter. Digits stay with the chunk they
/// follow: `VkFlagBits2KHR` gives `Vk`, `Flag`, `Bits2`, `K`, `H`, `R`.
pub fn split_chunks(name: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (i, c) in name.char_indices() {
        if c.is_ascii_uppercase() && i > start {
            chunks.push(&name[start..i]);
            start = i;
        }
    }
    if start < name.len() {
        chunks.push(&name[start..]);
    }
    chunks
}

fn is_letter_chunk(chunk: &str) -> bool {
    chunk.len() == 1 && chunk.chars().all(|c| c.is_ascii_uppercase())
}

/// Reconstructs the SCREAMING_SNAKE prefix shared by an enum's values from the enum's type
/// name: `VkCullModeFlagBits` gives `VK_CULL_MODE`, `VkPresentModeKHR` gives `VK_PRESENT_MODE`.
pub fn derive_prefix(type_name: &str) -> String {
    let chunks = split_chunks(type_name);

    let mut end = chunks.len();
    for i in 0..chunks.len() {
        let rest = &chunks[i..];
        if rest[0] == "Flag" || rest[0] == "Flags" {
            end = i;
            break;
        }
        if VENDOR_RUNS
            .iter()
            .any(|run| rest.len() >= run.len() && rest.iter().zip(run.iter()).all(|(a, b)| a == b))
        {
            end = i;
            break;
        }
    }

    // Any other vendor suffix, e.g. `NV`, shows up as a trailing run of single letters.
    let mut run_start = end;
    while run_start > 0 && is_letter_chunk(chunks[run_start - 1]) {
        run_start -= 1;
    }
    if end - run_start >= 2 {
        end = run_start;
    }

    chunks[..end].join("_").to_uppercase()
}

/// Upper-cases the first letter of `token` and any letter directly after a digit, lower-cases
/// the rest: `UNORM` gives `Unorm`, `R8G8B8A8` stays, `2D` stays.
fn title_case(token: &str) -> String {
    let mut result = String::with_capacity(token.len());
    let mut upper_next = true;
    for c in token.chars() {
        if upper_next {
            result.push(c.to_ascii_uppercase());
        } else {
            result.push(c.to_ascii_lowercase());
        }
        upper_next = c.is_ascii_digit();
    }
    result
}

/// Lower snake case, inserting `_` before an upper-case letter that follows a lower-case one.
pub fn snake_case(name: &str) -> String {
    let mut result = String::with_capacity(name.len() + 4);
    let mut last_upper = true;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if !last_upper {
                result.push('_');
            }
            last_upper = true;
        } else {
            last_upper = false;
        }
        result.push(c.to_ascii_lowercase());
    }
    result
}

/// `vkCreateInstance` gives `create_instance`.
pub fn command_method_name(command: &str) -> String {
    let stripped = command.strip_prefix("vk").unwrap_or(command);
    escape_keyword(&snake_case(stripped))
}

/// Makes `name` usable as a Rust identifier.
pub fn escape_keyword(name: &str) -> String {
    match name {
        "self" | "Self" | "super" | "crate" => format!("{}_", name),
        _ if KEYWORDS.contains(&name) => format!("r#{}", name),
        _ => name.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierPrettifier {
    noise: HashSet<String>,
    overrides: HashMap<&'static str, &'static str>,
}

impl Default for IdentifierPrettifier {
    fn default() -> Self {
        Self::with_tags(DEFAULT_TAGS.iter().copied())
    }
}

impl IdentifierPrettifier {
    /// Drops the given author tags and `BIT` from member names.
    pub fn with_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        let mut noise: HashSet<String> = tags.into_iter().map(String::from).collect();
        noise.insert(String::from("BIT"));
        IdentifierPrettifier {
            noise,
            overrides: OVERRIDES.iter().copied().collect(),
        }
    }

    /// Uses the registry's tags, or the built-in list when it has none.
    pub fn from_tags(tags: &[String]) -> Self {
        if tags.is_empty() {
            Self::default()
        } else {
            Self::with_tags(tags.iter().map(String::as_str))
        }
    }

    /// Member name for the enum value `value` whose enum has the prefix `prefix`.
    ///
    /// Values that do not start with `prefix` and are not in the override table come back
    /// unchanged.
    pub fn member_name(&self, value: &str, prefix: &str) -> String {
        if let Some(name) = self.overrides.get(value) {
            return name.to_string();
        }
        let rest = match value
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            Some(rest) if !rest.is_empty() => rest,
            _ => return value.to_string(),
        };

        let tokens: Vec<&str> = rest.split('_').filter(|t| !t.is_empty()).collect();
        let mut kept: Vec<&str> = tokens
            .iter()
            .copied()
            .filter(|t| !self.noise.contains(*t))
            .collect();
        if kept.is_empty() {
            kept = tokens;
        }

        let name: String = kept.iter().map(|t| title_case(t)).collect();
        if name.starts_with(|c: char| c.is_ascii_digit()) {
            format!("_{}", name)
        } else {
            name
        }
    }

    /// Member names for every value of `e`, whose emitted type name is `mapped_name`, in value
    /// order. A value whose name collides with an earlier one keeps its registry name.
    pub fn enum_member_names(&self, e: &EnumDefinition, mapped_name: &str) -> Vec<String> {
        let prefix = derive_prefix(mapped_name);
        let mut seen = HashSet::new();
        e.values
            .iter()
            .map(|v| {
                let name = self.member_name(&v.name, &prefix);
                if seen.insert(name.clone()) {
                    name
                } else {
                    log::warn!(
                        "{}: {} collides on member name {}, keeping registry name",
                        e.name,
                        v.name,
                        name
                    );
                    seen.insert(v.name.clone());
                    v.name.clone()
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{EnumKind, EnumValue};

    #[test]
    fn test_split_chunks() {
        assert_eq!(split_chunks("VkImageType"), vec!["Vk", "Image", "Type"]);
        assert_eq!(
            split_chunks("VkPipelineStageFlagBits2KHR"),
            vec!["Vk", "Pipeline", "Stage", "Flag", "Bits2", "K", "H", "R"]
        );
    }

    #[test]
    fn test_derive_prefix() {
        assert_eq!(derive_prefix("VkImageLayout"), "VK_IMAGE_LAYOUT");
        assert_eq!(derive_prefix("VkCullModeFlagBits"), "VK_CULL_MODE");
        assert_eq!(derive_prefix("VkPresentModeKHR"), "VK_PRESENT_MODE");
        assert_eq!(derive_prefix("VkDebugReportObjectTypeEXT"), "VK_DEBUG_REPORT_OBJECT_TYPE");
        assert_eq!(derive_prefix("VkRasterizationOrderAMD"), "VK_RASTERIZATION_ORDER");
        assert_eq!(derive_prefix("VkCoverageModulationModeNV"), "VK_COVERAGE_MODULATION_MODE");
        assert_eq!(derive_prefix("VkColor"), "VK_COLOR");
    }

    #[test]
    fn test_override_wins() {
        let p = IdentifierPrettifier::default();
        assert_eq!(p.member_name("VK_SUCCESS", "VK_RESULT"), "Success");
        assert_eq!(p.member_name("VK_SUCCESS", "VK_SUCCESS"), "Success");
        assert_eq!(p.member_name("VK_STENCIL_FRONT_AND_BACK", "VK_STENCIL_FACE"), "FrontAndBack");
    }

    #[test]
    fn test_pass_through() {
        let p = IdentifierPrettifier::default();
        assert_eq!(
            p.member_name("VK_ERROR_OUT_OF_HOST_MEMORY", "VK_RESULT"),
            "VK_ERROR_OUT_OF_HOST_MEMORY"
        );
        assert_eq!(p.member_name("VK_IMAGE_LAYOUTX", "VK_IMAGE_LAYOUT"), "VK_IMAGE_LAYOUTX");
    }

    #[test]
    fn test_member_name() {
        let p = IdentifierPrettifier::default();
        assert_eq!(
            p.member_name("VK_IMAGE_LAYOUT_TRANSFER_SRC_OPTIMAL", "VK_IMAGE_LAYOUT"),
            "TransferSrcOptimal"
        );
        assert_eq!(p.member_name("VK_CULL_MODE_FRONT_BIT", "VK_CULL_MODE"), "Front");
        assert_eq!(p.member_name("VK_PRESENT_MODE_FIFO_KHR", "VK_PRESENT_MODE"), "Fifo");
        assert_eq!(p.member_name("VK_IMAGE_TYPE_2D", "VK_IMAGE_TYPE"), "_2D");
        assert_eq!(
            p.member_name("VK_FORMAT_R8G8B8A8_UNORM", "VK_FORMAT"),
            "R8G8B8A8Unorm"
        );
        // Nothing but noise left: keep it rather than produce an empty name.
        assert_eq!(p.member_name("VK_VENDOR_KHR", "VK_VENDOR"), "Khr");
    }

    #[test]
    fn test_tags_from_registry() {
        let p = IdentifierPrettifier::from_tags(&[String::from("ACME")]);
        assert_eq!(p.member_name("VK_SHAPE_ROUND_ACME", "VK_SHAPE"), "Round");
        assert_eq!(p.member_name("VK_SHAPE_ROUND_KHR", "VK_SHAPE"), "RoundKhr");
    }

    #[test]
    fn test_collision_keeps_registry_name() {
        let p = IdentifierPrettifier::default();
        let value = |name: &str, value| EnumValue {
            name: name.to_string(),
            value,
            bitpos: None,
            comment: None,
        };
        let e = EnumDefinition {
            name: String::from("VkShape"),
            kind: EnumKind::Plain,
            bit_width: 32,
            values: vec![value("VK_SHAPE_ROUND", 0), value("VK_SHAPE_ROUND_EXT", 1)],
        };
        assert_eq!(
            p.enum_member_names(&e, "VkShape"),
            vec!["Round".to_string(), "VK_SHAPE_ROUND_EXT".to_string()]
        );
    }

    #[test]
    fn test_command_method_name() {
        assert_eq!(command_method_name("vkCreateInstance"), "create_instance");
        assert_eq!(
            command_method_name("vkGetPhysicalDeviceSurfaceSupportKHR"),
            "get_physical_device_surface_support_khr"
        );
        assert_eq!(escape_keyword("type"), "r#type");
    }
}
