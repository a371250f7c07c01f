extern crate xml;

use std::io::Read;
use xml::reader::XmlEvent;

use crate::types::*;

type XmlEvents<R> = xml::reader::Events<R>;
type XmlAttribute = xml::attribute::OwnedAttribute;

//--------------------------------------------------------------------------------------------------
struct ParseCtx<R: Read> {
    events: XmlEvents<R>,
    xpath: String,
    errors: Vec<Error>,
    xml_error: Option<xml::reader::Error>,
}

impl<R: Read> ParseCtx<R> {
    /// Next event of the document. A reader error ends the walk; it is kept and reported once
    /// the walk unwinds.
    fn next_event(&mut self) -> Option<XmlEvent> {
        match self.events.next() {
            Some(Ok(e)) => Some(e),
            Some(Err(e)) => {
                if self.xml_error.is_none() {
                    self.xml_error = Some(e);
                }
                None
            }
            None => None,
        }
    }

    fn push_element(&mut self, name: &str) {
        self.xpath.push('/');
        self.xpath.push_str(name);
    }

    fn pop_element(&mut self) {
        if let Some(separator_pos) = self.xpath.rfind('/') {
            self.xpath.truncate(separator_pos);
        } else {
            self.errors.push(Error::Internal {
                desc: "ParseCtx push_element/pop_element mismatch.",
            });
        }
    }

    fn missing_element(&mut self, name: &str) {
        self.errors.push(Error::MissingElement {
            xpath: self.xpath.clone(),
            name: String::from(name),
        });
    }
}

//--------------------------------------------------------------------------------------------------
// The registry schema keeps growing, so attributes and elements that are not listed in a match
// are skipped rather than reported.

macro_rules! unwrap_attribute (
    ($ctx:expr, $element:ident, $attribute:ident) => {
        let $attribute = match $attribute {
            Some(val) => val,
            None => {
                $ctx.errors.push(Error::MissingAttribute {
                    xpath: $ctx.xpath.clone(),
                    name: String::from(stringify!($attribute)),
                });
                return None;
            }
        };
    };
);

macro_rules! match_attributes {
    ($a:ident in $attributes:expr, $($p:pat => $e:expr),+) => {
        for $a in $attributes {
            let n = $a.name.local_name.as_str();
            match n {
                $(
                    $p => $e,
                )+
                _ => {}
            }
        }
    };
}

macro_rules! match_elements {
    ($ctx:expr, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::StartElement { name, .. } => {
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                }
                _ => {}
            }
        }
    };

    ( $ctx:expr, $attributes:ident, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::StartElement { name, $attributes, .. } => {
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                }
                _ => {}
            }
        }
    };
}

macro_rules! match_elements_combine_text {
    ( $ctx:expr, $buffer:ident, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::Characters(text) => $buffer.push_str(&text),
                XmlEvent::Whitespace(text) => $buffer.push_str(&text),
                XmlEvent::StartElement { name, .. } => {
                    $buffer.push(' ');
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                },
                _ => {}
            }
        }
    };

    ( $ctx:expr, $attributes:ident, $buffer:ident, $($p:pat => $e:expr),+) => {
        while let Some(e) = $ctx.next_event() {
            match e {
                XmlEvent::Characters(text) => $buffer.push_str(&text),
                XmlEvent::Whitespace(text) => $buffer.push_str(&text),
                XmlEvent::StartElement { name, $attributes, .. } => {
                    $buffer.push(' ');
                    let name = name.local_name.as_str();
                    $ctx.push_element(name);
                    match name {
                        $(
                            $p => $e,
                        )+
                        _ => consume_current_element($ctx),
                    }
                }
                XmlEvent::EndElement { .. } => {
                    $ctx.pop_element();
                    break;
                }
                _ => {}
            }
        }
    };
}

//--------------------------------------------------------------------------------------------------
/// Reads the registry file at `path`.
pub fn parse_file(path: &std::path::Path) -> Result<RawRegistry, FatalError> {
    let file = std::io::BufReader::new(std::fs::File::open(path)?);
    let parser = xml::reader::ParserConfig::new().create_reader(file);
    parse_xml(parser.into_iter())
}

/// Reads a registry document from `stream`.
///
/// Any missing required attribute or sub-element fails the whole parse; the returned
/// [`FatalError::Malformed`] lists every problem found, each tagged with its xpath.
pub fn parse_stream<T: std::io::Read>(stream: T) -> Result<RawRegistry, FatalError> {
    let parser = xml::reader::ParserConfig::new().create_reader(stream);
    parse_xml(parser.into_iter())
}

fn parse_xml<R: Read>(events: XmlEvents<R>) -> Result<RawRegistry, FatalError> {
    let mut ctx = ParseCtx {
        events,
        xpath: String::from(""),
        errors: Vec::new(),
        xml_error: None,
    };

    let mut result = None;

    {
        let ctx = &mut ctx;
        match_elements! {ctx,
            "registry" => result = Some(parse_registry(ctx))
        }
    }

    if let Some(e) = ctx.xml_error {
        return Err(FatalError::XmlError(e));
    }
    if !ctx.errors.is_empty() {
        return Err(FatalError::Malformed { errors: ctx.errors });
    }
    let registry = result.ok_or(FatalError::MissingRegistryElement)?;

    log::debug!(
        "parsed registry: {} types, {} enum blocks, {} commands, {} features, {} extensions",
        registry.types.len(),
        registry.enums.len(),
        registry.commands.len(),
        registry.features.len(),
        registry.extensions.len()
    );
    Ok(registry)
}

fn parse_registry<R: Read>(ctx: &mut ParseCtx<R>) -> RawRegistry {
    let mut registry = RawRegistry::default();

    match_elements! {ctx, attributes,
        "tags" => {
            match_elements!{ctx, attributes,
                "tag" => {
                    let mut name = None;
                    match_attributes!{a in attributes,
                        "name" => name = Some(a.value)
                    }
                    consume_current_element(ctx);
                    match name {
                        Some(name) => registry.tags.push(name),
                        None => ctx.errors.push(Error::MissingAttribute {
                            xpath: ctx.xpath.clone(),
                            name: String::from("name"),
                        }),
                    }
                }
            }
        },
        "types" => {
            match_elements!{ctx, attributes,
                "type" => if let Some(v) = parse_type(ctx, attributes) {
                    registry.types.push(v);
                }
            }
        },
        "enums" => {
            let mut name = None;
            let mut kind = None;
            let mut bitwidth = None;
            let mut values = Vec::new();
            match_attributes!{a in attributes,
                "name"     => name     = Some(a.value),
                "type"     => kind     = Some(a.value),
                "bitwidth" => bitwidth = Some(a.value)
            }
            match_elements!{ctx, attributes,
                "enum" => if let Some(v) = parse_enum(ctx, attributes) {
                    values.push(v);
                }
            }
            let bitwidth = bitwidth
                .and_then(|val| parse_integer(ctx, &val))
                .map(|v| v as u32);
            registry.enums.push(RawEnums { name, kind, bitwidth, values });
        },
        "commands" => {
            match_elements!{ctx, attributes,
                "command" => parse_command(ctx, attributes, &mut registry)
            }
        },
        "feature" => if let Some(v) = parse_feature(ctx, attributes) {
            registry.features.push(v);
        },
        "extensions" => {
            match_elements!{ctx, attributes,
                "extension" => if let Some(v) = parse_extension(ctx, attributes) {
                    registry.extensions.push(v);
                }
            }
        }
    }

    registry
}

fn parse_type<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<RawType> {
    let mut api = None;
    let mut alias = None;
    let mut requires = None;
    let mut bitvalues = None;
    let mut name = None;
    let mut category = None;
    let mut parent = None;

    let mut code = String::new();
    let mut type_ref = None;
    let mut members = Vec::new();

    match_attributes! {a in attributes,
        "api"       => api       = Some(a.value),
        "alias"     => alias     = Some(a.value),
        "requires"  => requires  = Some(a.value),
        "bitvalues" => bitvalues = Some(a.value),
        "name"      => name      = Some(a.value),
        "category"  => category  = Some(a.value),
        "parent"    => parent    = Some(a.value)
    }

    if alias.is_some() {
        consume_current_element(ctx);
        return None;
    }

    match_elements_combine_text! {ctx, attributes, code,
        "member" => {
            if let Some(member) = parse_member(ctx, attributes) {
                members.push(member);
            }
        },
        "name" => {
            let text = parse_text_element(ctx);
            code.push_str(&text);
            if name.is_none() {
                name = Some(text);
            }
        },
        "type" => {
            let text = parse_text_element(ctx);
            code.push_str(&text);
            if type_ref.is_none() {
                type_ref = Some(text);
            }
        },
        "apientry" => code.push_str(&parse_text_element(ctx))
    }

    let name = match name {
        Some(v) => v,
        None => {
            ctx.missing_element("name");
            return None;
        }
    };

    Some(RawType {
        name,
        category,
        api,
        // 64-bit bitmask typedefs name their bit enum through `bitvalues` instead.
        requires: requires.or(bitvalues),
        parent,
        code: code.trim().to_string(),
        type_ref,
        members,
    })
}

fn parse_member<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<RawMember> {
    let mut api = None;
    let mut len = None;
    let mut optional = None;

    match_attributes! {a in attributes,
        "api"      => api      = Some(a.value),
        "len"      => len      = Some(a.value),
        "optional" => optional = Some(a.value)
    }

    let mut member = parse_name_with_type(ctx)?;
    member.api = api;
    member.len = len;
    member.optional = optional.map_or(false, |v| v.starts_with("true"));
    Some(member)
}

/// Collects a `<member>`, `<param>` or `<proto>` body: its declaration text, the `<type>` and
/// `<name>` children and an optional `<comment>`.
fn parse_name_with_type<R: Read>(ctx: &mut ParseCtx<R>) -> Option<RawMember> {
    let mut code = String::new();
    let mut name = None;
    let mut type_name = None;
    let mut comment = None;

    match_elements_combine_text! {ctx, code,
        "type" => {
            let text = parse_text_element(ctx);
            code.push_str(&text);
            type_name = Some(text);
        },
        "name" => {
            let text = parse_text_element(ctx);
            code.push_str(&text);
            name = Some(text);
        },
        "enum" => code.push_str(&parse_text_element(ctx)),
        "comment" => comment = Some(parse_text_element(ctx))
    }

    let name = match name {
        Some(v) => v,
        None => {
            ctx.missing_element("name");
            return None;
        }
    };
    let type_name = match type_name {
        Some(v) => v,
        None => {
            ctx.missing_element("type");
            return None;
        }
    };

    Some(RawMember {
        name,
        type_name,
        code: code.trim().to_string(),
        comment,
        ..RawMember::default()
    })
}

fn parse_command<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
    registry: &mut RawRegistry,
) {
    let mut name = None;
    let mut alias = None;
    let mut api = None;
    let mut successcodes = None;
    let mut errorcodes = None;

    match_attributes! {a in attributes,
        "name"         => name         = Some(a.value),
        "alias"        => alias        = Some(a.value),
        "api"          => api          = Some(a.value),
        "successcodes" => successcodes = Some(a.value),
        "errorcodes"   => errorcodes   = Some(a.value)
    }

    if let Some(alias) = alias {
        consume_current_element(ctx);
        match name {
            Some(name) => registry.command_aliases.push((name, alias)),
            None => ctx.errors.push(Error::MissingAttribute {
                xpath: ctx.xpath.clone(),
                name: String::from("name"),
            }),
        }
        return;
    }

    let mut proto = None;
    let mut params = Vec::new();
    let mut malformed = false;

    match_elements! {ctx, attributes,
        "proto" => match parse_name_with_type(ctx) {
            Some(v) => proto = Some(v),
            None => malformed = true,
        },
        "param" => match parse_member(ctx, attributes) {
            Some(v) => params.push(v),
            None => malformed = true,
        }
    }

    let proto = match proto {
        Some(v) => v,
        None => {
            if !malformed {
                ctx.missing_element("proto");
            }
            return;
        }
    };
    if malformed {
        return;
    }

    let split_codes = |codes: Option<String>| -> Vec<String> {
        codes
            .map(|c| c.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    };

    registry.commands.push(RawCommand {
        name: proto.name.clone(),
        api,
        proto,
        params,
        success_codes: split_codes(successcodes),
        error_codes: split_codes(errorcodes),
    });
}

/// Parses an `<enum>` element. Aliases yield `None` without an error.
fn parse_enum<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> Option<RawEnum> {
    let mut name = None;
    let mut comment = None;
    let mut type_name = None;
    let mut api = None;
    let mut extends = None;
    let mut value = None;
    let mut bitpos = None;
    let mut extnumber = None;
    let mut offset = None;
    let mut negative = false;
    let mut alias = None;

    match_attributes! {a in attributes,
        "name"      => name      = Some(a.value),
        "comment"   => comment   = Some(a.value),
        "type"      => type_name = Some(a.value),
        "api"       => api       = Some(a.value),
        "extends"   => extends   = Some(a.value),
        "value"     => value     = Some(a.value),
        "offset"    => offset    = Some(a.value),
        "dir"       => {
            if a.value.as_str() == "-" {
                negative = true;
            } else {
                ctx.errors.push(Error::UnexpectedAttributeValue {
                    xpath: ctx.xpath.clone(),
                    name: String::from("dir"),
                    value: a.value
                });
            }
        },
        "bitpos"    => bitpos    = Some(a.value),
        "extnumber" => extnumber = Some(a.value),
        "alias"     => alias     = Some(a.value)
    }

    consume_current_element(ctx);

    if alias.is_some() {
        return None;
    }

    unwrap_attribute!(ctx, enum, name);

    let count = [offset.is_some(), bitpos.is_some(), value.is_some()]
        .iter()
        .filter(|v| **v)
        .count();
    if count > 1 {
        ctx.errors.push(Error::SchemaViolation {
            xpath: ctx.xpath.clone(),
            desc: format!(
                "Unable to determine correct specification of enum {}: offset={:?}, bitpos={:?}, value={:?}",
                name, offset, bitpos, value
            ),
        });
        return None;
    }

    let spec = if let Some(offset) = offset {
        if extends.is_none() {
            ctx.errors.push(Error::SchemaViolation {
                xpath: ctx.xpath.clone(),
                desc: format!("Missing extends on enum {} with offset spec.", name),
            });
            return None;
        }
        let offset = parse_integer(ctx, &offset)?;
        let extnumber = match extnumber {
            Some(text) => Some(parse_integer(ctx, &text)?),
            None => None,
        };
        RawEnumSpec::Offset {
            offset,
            extnumber,
            negative,
        }
    } else if let Some(bitpos) = bitpos {
        let bit = parse_integer(ctx, &bitpos)?;
        if !(0..64).contains(&bit) {
            ctx.errors.push(Error::SchemaViolation {
                xpath: ctx.xpath.clone(),
                desc: format!("Bit position {} of enum {} is outside 0..=63.", bit, name),
            });
            return None;
        }
        RawEnumSpec::Bitpos(bit as u32)
    } else if let Some(value) = value {
        RawEnumSpec::Value(value)
    } else {
        RawEnumSpec::None
    };

    Some(RawEnum {
        name,
        api,
        comment,
        type_name,
        extends,
        spec,
    })
}

fn parse_feature<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<RawFeature> {
    let mut api = None;
    let mut name = None;
    let mut number = None;
    let mut requires = Vec::new();

    match_attributes! {a in attributes,
        "api"    => api    = Some(a.value),
        "name"   => name   = Some(a.value),
        "number" => number = Some(a.value)
    }

    match_elements! {ctx, attributes,
        "require" => requires.push(parse_require(ctx, attributes))
    }

    unwrap_attribute!(ctx, feature, api);
    unwrap_attribute!(ctx, feature, name);
    unwrap_attribute!(ctx, feature, number);

    Some(RawFeature {
        name,
        api,
        number,
        requires,
    })
}

fn parse_extension<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<RawExtension> {
    let mut name = None;
    let mut number = None;
    let mut ext_type = None;
    let mut supported = None;
    let mut requires = Vec::new();

    match_attributes! {a in attributes,
        "name"      => name      = Some(a.value),
        "number"    => number    = Some(a.value),
        "type"      => ext_type  = Some(a.value),
        "supported" => supported = Some(a.value)
    }

    let number = match number {
        Some(text) => parse_integer(ctx, &text),
        None => None,
    };

    match_elements! {ctx, attributes,
        "require" => requires.push(parse_require(ctx, attributes))
    }

    unwrap_attribute!(ctx, extension, name);

    Some(RawExtension {
        name,
        number,
        ext_type,
        supported,
        requires,
    })
}

fn parse_require<R: Read>(ctx: &mut ParseCtx<R>, attributes: Vec<XmlAttribute>) -> RawRequire {
    let mut require = RawRequire::default();

    match_attributes! {a in attributes,
        "api" => require.api = Some(a.value)
    }

    match_elements! {ctx, attributes,
        "enum" => if let Some(v) = parse_enum(ctx, attributes) {
            require.enums.push(v);
        },
        "command" => if let Some(v) = parse_item_name(ctx, attributes) {
            require.commands.push(v);
        }
    }

    require
}

fn parse_item_name<R: Read>(
    ctx: &mut ParseCtx<R>,
    attributes: Vec<XmlAttribute>,
) -> Option<String> {
    let mut name = None;
    match_attributes! {a in attributes,
        "name" => name = Some(a.value)
    }
    consume_current_element(ctx);
    unwrap_attribute!(ctx, item, name);
    Some(name)
}

fn parse_integer<R: Read>(ctx: &mut ParseCtx<R>, text: &str) -> Option<i64> {
    let parse_res = if text.starts_with("0x") {
        i64::from_str_radix(text.split_at(2).1, 16)
    } else {
        text.parse::<i64>()
    };

    if let Ok(v) = parse_res {
        Some(v)
    } else {
        ctx.errors.push(Error::SchemaViolation {
            xpath: ctx.xpath.clone(),
            desc: format!("Value '{}' is not valid base 10 or 16 integer.", text),
        });
        None
    }
}

fn consume_current_element<R: Read>(ctx: &mut ParseCtx<R>) {
    let mut depth = 1;
    while let Some(e) = ctx.next_event() {
        match e {
            XmlEvent::StartElement { name, .. } => {
                ctx.push_element(name.local_name.as_str());
                depth += 1;
            }
            XmlEvent::EndElement { .. } => {
                depth -= 1;
                ctx.pop_element();
                if depth == 0 {
                    break;
                }
            }
            _ => (),
        }
    }
}

fn parse_text_element<R: Read>(ctx: &mut ParseCtx<R>) -> String {
    let mut result = String::new();
    let mut depth = 1;
    while let Some(e) = ctx.next_event() {
        match e {
            XmlEvent::StartElement { name, .. } => {
                ctx.push_element(name.local_name.as_str());
                depth += 1;
            }
            XmlEvent::Characters(text) => result.push_str(&text),
            XmlEvent::EndElement { .. } => {
                depth -= 1;
                ctx.pop_element();
                if depth == 0 {
                    break;
                }
            }
            _ => (),
        }
    }
    result
}
