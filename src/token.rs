use std::fmt;

/// Lexical tokens of the Mython language.
///
/// `Indent` and `Dedent` are synthetic: the lexer produces them from
/// leading-space differences between consecutive logical lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Number(i32),
    Id(String),
    String(String),
    Char(u8),

    // Keywords
    Class,
    Return,
    If,
    Else,
    Def,
    Print,
    And,
    Or,
    Not,
    None,
    True,
    False,

    // Two-character comparison operators
    Eq,
    NotEq,
    LessOrEq,
    GreaterOrEq,

    // Structural
    Newline,
    Indent,
    Dedent,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(value) => write!(f, "Number{{{value}}}"),
            Token::Id(name) => write!(f, "Id{{{name}}}"),
            Token::String(value) => write!(f, "String{{{value}}}"),
            Token::Char(value) => write!(f, "Char{{{}}}", char::from(*value)),
            Token::Class => f.write_str("Class"),
            Token::Return => f.write_str("Return"),
            Token::If => f.write_str("If"),
            Token::Else => f.write_str("Else"),
            Token::Def => f.write_str("Def"),
            Token::Print => f.write_str("Print"),
            Token::And => f.write_str("And"),
            Token::Or => f.write_str("Or"),
            Token::Not => f.write_str("Not"),
            Token::None => f.write_str("None"),
            Token::True => f.write_str("True"),
            Token::False => f.write_str("False"),
            Token::Eq => f.write_str("Eq"),
            Token::NotEq => f.write_str("NotEq"),
            Token::LessOrEq => f.write_str("LessOrEq"),
            Token::GreaterOrEq => f.write_str("GreaterOrEq"),
            Token::Newline => f.write_str("Newline"),
            Token::Indent => f.write_str("Indent"),
            Token::Dedent => f.write_str("Dedent"),
            Token::Eof => f.write_str("Eof"),
        }
    }
}
