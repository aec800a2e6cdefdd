//! Go source header parsing.
//!
//! Only the package clause and the import declarations that follow it are
//! read; lexing stops at the first declaration that is not an import.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHeader {
    pub package: String,
    pub imports: Vec<String>,
}

impl SourceHeader {
    pub fn is_main(&self) -> bool {
        self.package == "main"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Semi,
    Dot,
    Other(char),
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().peekable(),
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, String> {
        loop {
            let Some(&c) = self.chars.peek() else {
                return Ok(None);
            };
            if c.is_whitespace() || c == '\u{feff}' {
                self.chars.next();
                continue;
            }
            if c == '/' {
                self.chars.next();
                match self.chars.peek() {
                    Some('/') => {
                        for c in self.chars.by_ref() {
                            if c == '\n' {
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        self.chars.next();
                        self.skip_block_comment()?;
                        continue;
                    }
                    _ => return Ok(Some(Token::Other('/'))),
                }
            }

            self.chars.next();
            let token = match c {
                '(' => Token::LParen,
                ')' => Token::RParen,
                ';' => Token::Semi,
                '.' => Token::Dot,
                '"' => Token::Str(self.interpreted_string()?),
                '`' => Token::Str(self.raw_string()?),
                c if c.is_alphabetic() || c == '_' => {
                    let mut ident = String::from(c);
                    while let Some(&n) = self.chars.peek() {
                        if n.is_alphanumeric() || n == '_' {
                            ident.push(n);
                            self.chars.next();
                        } else {
                            break;
                        }
                    }
                    Token::Ident(ident)
                }
                other => Token::Other(other),
            };
            return Ok(Some(token));
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), String> {
        let mut prev = '\0';
        for c in self.chars.by_ref() {
            if prev == '*' && c == '/' {
                return Ok(());
            }
            prev = c;
        }
        Err("unterminated block comment".to_string())
    }

    fn interpreted_string(&mut self) -> Result<String, String> {
        let mut out = String::new();
        while let Some(c) = self.chars.next() {
            match c {
                '"' => return Ok(out),
                '\\' => {
                    if let Some(escaped) = self.chars.next() {
                        out.push(escaped);
                    }
                }
                '\n' => break,
                c => out.push(c),
            }
        }
        Err("unterminated string literal".to_string())
    }

    fn raw_string(&mut self) -> Result<String, String> {
        let mut out = String::new();
        for c in self.chars.by_ref() {
            if c == '`' {
                return Ok(out);
            }
            out.push(c);
        }
        Err("unterminated raw string literal".to_string())
    }
}

/// Reads the package name and imported paths of a Go source file.
pub fn parse_header(src: &str) -> Result<SourceHeader, String> {
    let mut lexer = Lexer::new(src);

    match lexer.next_token()? {
        Some(Token::Ident(kw)) if kw == "package" => {}
        _ => return Err("expected package clause".to_string()),
    }
    let package = match lexer.next_token()? {
        Some(Token::Ident(name)) => name,
        _ => return Err("expected package name".to_string()),
    };

    let mut imports = Vec::new();
    let mut pending = lexer.next_token()?;
    loop {
        match pending.take() {
            Some(Token::Semi) => pending = lexer.next_token()?,
            Some(Token::Ident(kw)) if kw == "import" => {
                match lexer.next_token()? {
                    Some(Token::LParen) => loop {
                        match lexer.next_token()? {
                            Some(Token::RParen) => break,
                            Some(Token::Semi) => continue,
                            Some(tok) => imports.push(import_spec(&mut lexer, tok)?),
                            None => return Err("unterminated import group".to_string()),
                        }
                    },
                    Some(tok) => imports.push(import_spec(&mut lexer, tok)?),
                    None => return Err("expected import spec".to_string()),
                }
                pending = lexer.next_token()?;
            }
            _ => break,
        }
    }

    Ok(SourceHeader { package, imports })
}

fn import_spec(lexer: &mut Lexer<'_>, first: Token) -> Result<String, String> {
    match first {
        Token::Str(path) => Ok(path),
        Token::Ident(_) | Token::Dot => match lexer.next_token()? {
            Some(Token::Str(path)) => Ok(path),
            _ => Err("expected import path after alias".to_string()),
        },
        other => Err(format!("unexpected token in import: {:?}", other)),
    }
}
