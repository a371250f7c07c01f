//! Tokenizer for the C declarations found in `<member>`, `<param>` and `<proto>` elements.
//!
//! Only the declarator subset used by the registry is accepted:
//!
//! ```text
//! declaration := "const"? "struct"? IDENT "const"? pointer* IDENT? array* bitfield?
//! pointer     := "*" "const"?
//! array       := "[" (INTEGER | IDENT) "]"
//! bitfield    := ":" INTEGER
//! ```
//!
//! There is no bound on pointer depth or array rank.

use logos::Logos;

use crate::model::Pointer;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    #[error]
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Error,
    #[token("const")]
    Const,
    #[token("struct")]
    Struct,
    #[token("*")]
    Star,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token(":")]
    Colon,
    #[regex("[0-9]+", |lex| lex.slice().parse::<u32>().ok())]
    Integer(u32),
    #[regex("[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice())]
    Identifier(&'a str),
}

/// Size of one array dimension, either literal or named by an API constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayLen {
    Literal(u32),
    Constant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declarator {
    pub type_name: String,
    /// The named type itself is `const`.
    pub base_const: bool,
    /// Outermost pointer first.
    pub pointers: Vec<Pointer>,
    pub name: Option<String>,
    /// Outermost dimension first.
    pub array: Vec<ArrayLen>,
    pub bitfield: Option<u32>,
}

struct Cursor<'a> {
    lex: logos::Lexer<'a, Token<'a>>,
    peeked: Option<Token<'a>>,
}

impl<'a> Cursor<'a> {
    fn peek(&mut self) -> Option<Token<'a>> {
        if self.peeked.is_none() {
            self.peeked = self.lex.next();
        }
        self.peeked
    }

    fn next(&mut self) -> Option<Token<'a>> {
        match self.peeked.take() {
            Some(t) => Some(t),
            None => self.lex.next(),
        }
    }

    fn eat(&mut self, token: Token<'a>) -> bool {
        if self.peek() == Some(token) {
            self.peeked = None;
            true
        } else {
            false
        }
    }
}

/// Parses one declaration. The error string describes the first unexpected token.
pub fn parse_declarator(code: &str) -> Result<Declarator, String> {
    let mut cursor = Cursor {
        lex: Token::lexer(code),
        peeked: None,
    };

    let mut base_const = cursor.eat(Token::Const);
    cursor.eat(Token::Struct);

    let type_name = match cursor.next() {
        Some(Token::Identifier(name)) => name.to_string(),
        other => return Err(format!("expected type name, found {:?}", other)),
    };
    base_const |= cursor.eat(Token::Const);

    // Const-ness of each pointer's target, innermost pointer first.
    let mut targets_const = Vec::new();
    let mut target_const = base_const;
    while cursor.eat(Token::Star) {
        targets_const.push(target_const);
        target_const = cursor.eat(Token::Const);
    }
    let pointers = targets_const
        .into_iter()
        .rev()
        .map(|c| if c { Pointer::Const } else { Pointer::Mut })
        .collect();

    let name = match cursor.peek() {
        Some(Token::Identifier(name)) => {
            cursor.next();
            Some(name.to_string())
        }
        _ => None,
    };

    let mut array = Vec::new();
    while cursor.eat(Token::LBrack) {
        let len = match cursor.next() {
            Some(Token::Integer(n)) => ArrayLen::Literal(n),
            Some(Token::Identifier(c)) => ArrayLen::Constant(c.to_string()),
            other => return Err(format!("expected array size, found {:?}", other)),
        };
        if !cursor.eat(Token::RBrack) {
            return Err(format!("unterminated array size in `{}`", code));
        }
        array.push(len);
    }

    let bitfield = if cursor.eat(Token::Colon) {
        match cursor.next() {
            Some(Token::Integer(n)) => Some(n),
            other => return Err(format!("expected bitfield width, found {:?}", other)),
        }
    } else {
        None
    };

    match cursor.next() {
        None => Ok(Declarator {
            type_name,
            base_const,
            pointers,
            name,
            array,
            bitfield,
        }),
        Some(t) => Err(format!("unexpected trailing {:?} in `{}`", t, code)),
    }
}

impl Declarator {
    /// Pointer list of the declaration used as a function parameter, where an array decays to a
    /// pointer to its first element. Arrays of pointers are not accepted.
    pub fn parameter_pointers(&self) -> Result<Vec<Pointer>, String> {
        if self.array.is_empty() {
            return Ok(self.pointers.clone());
        }
        if !self.pointers.is_empty() {
            return Err(String::from("array of pointers is not a valid parameter"));
        }
        Ok(vec![if self.base_const {
            Pointer::Const
        } else {
            Pointer::Mut
        }])
    }
}
