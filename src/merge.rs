//! Folds feature and extension enum values into the enums they extend.

use std::collections::HashMap;

use crate::model::{EnumDefinition, EnumExtensionValue, EnumValue};
use crate::types::FatalError;

/// First value reserved for extension enumerants.
pub const EXTENSION_BASE: i64 = 1_000_000_000;
/// Number of enumerant values reserved per extension.
pub const EXTENSION_BLOCK_SIZE: i64 = 1000;

/// Value of the enumerant at `offset` in the block of extension `ext_number`.
pub fn offset_value(ext_number: i64, offset: i64, negative: bool) -> i64 {
    let value = EXTENSION_BASE + (ext_number - 1) * EXTENSION_BLOCK_SIZE + offset;
    if negative {
        -value
    } else {
        value
    }
}

pub fn bitpos_value(bitpos: u32) -> i64 {
    1i64 << bitpos
}

/// Returns `enums` with every value of `values` appended to the enum it extends.
///
/// A value whose name is already present with the same numeric value is skipped, so the same
/// enumerant may be required by several features or extensions. The same name with a different
/// value is a [`FatalError::ConflictingValue`], and a target that is not in `enums` is a
/// [`FatalError::UnresolvedEnum`].
pub fn merge_enum_values<'a>(
    mut enums: Vec<EnumDefinition>,
    values: impl IntoIterator<Item = &'a EnumExtensionValue>,
) -> Result<Vec<EnumDefinition>, FatalError> {
    let mut index = HashMap::with_capacity(enums.len());
    for (i, e) in enums.iter().enumerate() {
        if index.insert(e.name.clone(), i).is_some() {
            return Err(FatalError::DuplicateEnum {
                name: e.name.clone(),
            });
        }
    }

    let mut merged = 0;
    for value in values {
        let target = match index.get(&value.extends) {
            Some(i) => &mut enums[*i],
            None => {
                return Err(FatalError::UnresolvedEnum {
                    extends: value.extends.clone(),
                    value: value.name.clone(),
                })
            }
        };

        if let Some(existing) = target.values.iter().find(|v| v.name == value.name) {
            if existing.value == value.value {
                log::trace!("{}::{} already present", target.name, value.name);
                continue;
            }
            return Err(FatalError::ConflictingValue {
                enum_name: target.name.clone(),
                value: value.name.clone(),
                existing: existing.value,
                new: value.value,
            });
        }

        log::trace!("{}::{} = {}", target.name, value.name, value.value);
        target.values.push(EnumValue {
            name: value.name.clone(),
            value: value.value,
            bitpos: match value.encoding {
                crate::model::ValueEncoding::Bitpos(b) => Some(b),
                _ => None,
            },
            comment: value.comment.clone(),
        });
        merged += 1;
    }

    log::debug!("merged {} extension enum values", merged);
    Ok(enums)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{EnumKind, ValueEncoding};

    fn color() -> EnumDefinition {
        EnumDefinition {
            name: String::from("Color"),
            kind: EnumKind::Plain,
            bit_width: 32,
            values: vec![
                EnumValue {
                    name: String::from("Red"),
                    value: 0,
                    bitpos: None,
                    comment: None,
                },
                EnumValue {
                    name: String::from("Green"),
                    value: 1,
                    bitpos: None,
                    comment: None,
                },
            ],
        }
    }

    fn summary(e: &EnumDefinition) -> Vec<(&str, i64)> {
        e.values.iter().map(|v| (v.name.as_str(), v.value)).collect()
    }

    #[test]
    fn test_bitpos_extension() {
        let blue = EnumExtensionValue::new("Color", "Blue", ValueEncoding::Bitpos(2));
        let enums = merge_enum_values(vec![color()], [&blue]).unwrap();
        assert_eq!(
            summary(&enums[0]),
            vec![("Red", 0), ("Green", 1), ("Blue", 4)]
        );
        assert_eq!(enums[0].values[2].bitpos, Some(2));
    }

    #[test]
    fn test_redeclaration() {
        let a = EnumExtensionValue::new("Color", "ColorAlpha", ValueEncoding::Literal(8));
        let b = EnumExtensionValue::new("Color", "ColorAlpha", ValueEncoding::Literal(8));
        let enums = merge_enum_values(vec![color()], [&a, &b]).unwrap();
        assert_eq!(enums[0].values.len(), 3);

        let c = EnumExtensionValue::new("Color", "ColorAlpha", ValueEncoding::Literal(9));
        match merge_enum_values(enums, [&c]) {
            Err(FatalError::ConflictingValue {
                enum_name,
                value,
                existing,
                new,
            }) => {
                assert_eq!(enum_name, "Color");
                assert_eq!(value, "ColorAlpha");
                assert_eq!((existing, new), (8, 9));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let values = vec![
            EnumExtensionValue::new("Color", "Blue", ValueEncoding::Bitpos(2)),
            EnumExtensionValue::new(
                "Color",
                "Dark",
                ValueEncoding::Offset {
                    ext_number: 3,
                    offset: 1,
                    negative: true,
                },
            ),
        ];
        let once = merge_enum_values(vec![color()], &values).unwrap();
        let twice = merge_enum_values(once.clone(), &values).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unresolved_target() {
        let v = EnumExtensionValue::new("Shade", "Blue", ValueEncoding::Literal(3));
        match merge_enum_values(vec![color()], [&v]) {
            Err(FatalError::UnresolvedEnum { extends, value }) => {
                assert_eq!(extends, "Shade");
                assert_eq!(value, "Blue");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_enum() {
        assert!(matches!(
            merge_enum_values(vec![color(), color()], []),
            Err(FatalError::DuplicateEnum { .. })
        ));
    }

    #[test]
    fn test_offset_value() {
        for n in [1, 2, 57, 1000] {
            for o in [0, 1, 999] {
                let expected = 1_000_000_000 + (n - 1) * 1000 + o;
                assert_eq!(offset_value(n, o, false), expected);
                assert_eq!(offset_value(n, o, true), -expected);
            }
        }
        assert_eq!(offset_value(2, 0, false), 1_000_001_000);
    }

    #[test]
    fn test_bitpos_value() {
        for b in 0..63 {
            assert_eq!(bitpos_value(b), 1i64 << b);
        }
        assert_eq!(bitpos_value(2), 4);
    }
}
