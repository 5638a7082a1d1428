//! The scanner that produces tokens from source text.

use super::{Span, Token, TokenKind};

/// A scanner that tokenizes tern source code.
pub struct Scanner<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
}

impl<'a> Scanner<'a> {
    /// Creates a new scanner for the given source code.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current_pos: 0,
        }
    }

    /// The source being scanned.
    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Returns the next token from the source.
    pub fn next_token(&mut self) -> Token {
        let skipped = self.skip_whitespace_and_comments();

        let start = self.current_pos;
        if let Err(reason) = skipped {
            return Token::new(TokenKind::Invalid(reason), Span::new(start, start));
        }

        let Some((_pos, ch)) = self.advance() else {
            return Token::new(TokenKind::Eof, Span::new(start, start));
        };

        let kind = match ch {
            // Single-character tokens
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,

            // Multi-character tokens
            '.' => self.scan_dot(),
            '+' => self.scan_plus(),
            '-' => self.scan_minus(),
            '*' => self.scan_star(),
            '/' => self.with_equal(TokenKind::Slash, TokenKind::SlashEqual),
            '%' => self.with_equal(TokenKind::Percent, TokenKind::PercentEqual),
            '<' => self.with_equal(TokenKind::LessThan, TokenKind::LessThanEqual),
            '>' => self.with_equal(TokenKind::GreaterThan, TokenKind::GreaterThanEqual),
            '=' => self.with_equal(TokenKind::Equal, TokenKind::EqualEqual),
            '!' => self.with_equal(TokenKind::Bang, TokenKind::NotEqual),
            '&' => self.doubled('&', TokenKind::AmpersandAmpersand),
            '|' => self.doubled('|', TokenKind::PipePipe),
            '#' => self.doubled('{', TokenKind::HashBrace),

            // String literals
            '"' | '\'' => self.scan_string(ch),

            // Template literals
            '`' => self.scan_template(),

            // Numbers
            '0'..='9' => self.scan_number(ch),

            // Identifiers and keywords
            _ if is_id_start(ch) => self.scan_identifier(ch),

            _ => TokenKind::Invalid(format!("unexpected character '{}'", ch)),
        };

        Token::new(kind, Span::new(start, self.current_pos))
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let result = self.chars.next();
        if let Some((pos, ch)) = result {
            self.current_pos = pos + ch.len_utf8();
        }
        result
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.next().map(|(_, ch)| ch)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), String> {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.advance();
                }
                Some('/') => match self.peek_next() {
                    Some('/') => {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut prev = ' ';
                        loop {
                            match self.advance() {
                                Some((_, '/')) if prev == '*' => break,
                                Some((_, ch)) => prev = ch,
                                None => return Err("unterminated block comment".to_string()),
                            }
                        }
                    }
                    _ => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    /// `plain`, or `with_equal` when followed by `=`.
    fn with_equal(&mut self, plain: TokenKind, with_equal: TokenKind) -> TokenKind {
        if self.peek() == Some('=') {
            self.advance();
            with_equal
        } else {
            plain
        }
    }

    /// `kind` when followed by `second`, otherwise invalid.
    fn doubled(&mut self, second: char, kind: TokenKind) -> TokenKind {
        if self.peek() == Some(second) {
            self.advance();
            kind
        } else {
            TokenKind::Invalid(format!("expected '{}' after '{}'", second, &self.source[self.current_pos - 1..self.current_pos]))
        }
    }

    fn scan_dot(&mut self) -> TokenKind {
        if self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            let mut value = String::from("0.");
            self.digits(&mut value);
            self.exponent(&mut value);
            return parse_float(&value);
        }
        TokenKind::Dot
    }

    fn scan_plus(&mut self) -> TokenKind {
        match self.peek() {
            Some('+') => {
                self.advance();
                TokenKind::PlusPlus
            }
            Some('=') => {
                self.advance();
                TokenKind::PlusEqual
            }
            _ => TokenKind::Plus,
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        match self.peek() {
            Some('-') => {
                self.advance();
                TokenKind::MinusMinus
            }
            Some('=') => {
                self.advance();
                TokenKind::MinusEqual
            }
            _ => TokenKind::Minus,
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        match self.peek() {
            Some('*') => {
                self.advance();
                self.with_equal(TokenKind::StarStar, TokenKind::StarStarEqual)
            }
            Some('=') => {
                self.advance();
                TokenKind::StarEqual
            }
            _ => TokenKind::Star,
        }
    }

    /// Resolves the escape after a backslash.
    fn escape(&mut self) -> Result<char, String> {
        match self.advance() {
            Some((_, 'n')) => Ok('\n'),
            Some((_, 'r')) => Ok('\r'),
            Some((_, 't')) => Ok('\t'),
            Some((_, '0')) => Ok('\0'),
            Some((_, ch @ ('\\' | '\'' | '"' | '`' | '$'))) => Ok(ch),
            Some((_, ch)) => Err(format!("unknown escape '\\{}'", ch)),
            None => Err("unterminated escape".to_string()),
        }
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        let mut value = String::new();

        loop {
            match self.advance() {
                None | Some((_, '\n')) => {
                    return TokenKind::Invalid("unterminated string".to_string());
                }
                Some((_, ch)) if ch == quote => break,
                Some((_, '\\')) => match self.escape() {
                    Ok(ch) => value.push(ch),
                    Err(reason) => return TokenKind::Invalid(reason),
                },
                Some((_, ch)) => value.push(ch),
            }
        }

        TokenKind::String(value)
    }

    fn scan_template(&mut self) -> TokenKind {
        let mut chunks = Vec::new();
        let mut expressions = Vec::new();
        let mut chunk = String::new();

        loop {
            match self.advance() {
                None => return TokenKind::Invalid("unterminated template string".to_string()),
                Some((_, '`')) => break,
                Some((_, '$')) if self.peek() == Some('{') => {
                    self.advance();
                    match self.scan_interpolation() {
                        Ok(source) => expressions.push(source),
                        Err(reason) => return TokenKind::Invalid(reason),
                    }
                    chunks.push(std::mem::take(&mut chunk));
                }
                Some((_, '\\')) => match self.escape() {
                    Ok(ch) => chunk.push(ch),
                    Err(reason) => return TokenKind::Invalid(reason),
                },
                Some((_, ch)) => chunk.push(ch),
            }
        }
        chunks.push(chunk);

        TokenKind::Template {
            chunks,
            expressions,
        }
    }

    /// Consumes the source of a `${...}` interpolation up to its closing
    /// brace, skipping nested braces and string literals.
    fn scan_interpolation(&mut self) -> Result<String, String> {
        let start = self.current_pos;
        let mut depth = 0usize;
        loop {
            let Some((pos, ch)) = self.advance() else {
                return Err("unterminated template interpolation".to_string());
            };
            match ch {
                '{' => depth += 1,
                '}' if depth == 0 => return Ok(self.source[start..pos].to_string()),
                '}' => depth -= 1,
                '"' | '\'' | '`' => {
                    let quote = ch;
                    loop {
                        match self.advance() {
                            None => return Err("unterminated string".to_string()),
                            Some((_, '\\')) => {
                                self.advance();
                            }
                            Some((_, c)) if c == quote => break,
                            Some(_) => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn digits(&mut self, value: &mut String) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                if ch != '_' {
                    value.push(ch);
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Consumes an exponent part if present. Returns whether one was found.
    fn exponent(&mut self, value: &mut String) -> bool {
        if !matches!(self.peek(), Some('e' | 'E')) {
            return false;
        }
        let sign = self.peek_next();
        let digit_follows = match sign {
            Some('+' | '-') => {
                let mut iter = self.chars.clone();
                iter.next();
                iter.next();
                iter.next().is_some_and(|(_, ch)| ch.is_ascii_digit())
            }
            Some(ch) => ch.is_ascii_digit(),
            None => false,
        };
        if !digit_follows {
            return false;
        }
        value.push('e');
        self.advance();
        if let Some(sign @ ('+' | '-')) = self.peek() {
            value.push(sign);
            self.advance();
        }
        self.digits(value);
        true
    }

    fn scan_number(&mut self, first: char) -> TokenKind {
        if first == '0' && matches!(self.peek(), Some('x' | 'X')) {
            return self.scan_hex_number();
        }

        let mut value = String::from(first);
        self.digits(&mut value);

        let mut is_float = false;
        if self.peek() == Some('.') && !self.peek_next().is_some_and(is_id_start) {
            is_float = true;
            value.push('.');
            self.advance();
            self.digits(&mut value);
        }
        is_float |= self.exponent(&mut value);

        if is_float {
            return parse_float(&value);
        }
        match value.parse::<i32>() {
            Ok(n) => TokenKind::Int(n),
            Err(_) => TokenKind::Invalid(format!("integer literal {} is out of range", value)),
        }
    }

    fn scan_hex_number(&mut self) -> TokenKind {
        self.advance(); // consume 'x'
        let mut value = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_hexdigit() || ch == '_' {
                if ch != '_' {
                    value.push(ch);
                }
                self.advance();
            } else {
                break;
            }
        }

        if value.is_empty() {
            return TokenKind::Invalid("expected hexadecimal digits".to_string());
        }
        match i32::from_str_radix(&value, 16) {
            Ok(n) => TokenKind::Int(n),
            Err(_) => TokenKind::Invalid(format!("integer literal 0x{} is out of range", value)),
        }
    }

    fn scan_identifier(&mut self, first: char) -> TokenKind {
        let mut name = String::from(first);

        while let Some(ch) = self.peek() {
            if is_id_continue(ch) {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Check for keywords
        match name.as_str() {
            "let" => TokenKind::Let,
            "var" => TokenKind::Var,
            "const" => TokenKind::Const,
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "break" => TokenKind::Break,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Identifier(name),
        }
    }
}

fn parse_float(value: &str) -> TokenKind {
    match value.parse::<f64>() {
        Ok(n) => TokenKind::Float(n),
        Err(_) => TokenKind::Invalid(format!("malformed number {}", value)),
    }
}

/// Checks if a character can start an identifier.
fn is_id_start(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_start(ch)
}

/// Checks if a character can continue an identifier.
fn is_id_continue(ch: char) -> bool {
    ch == '_' || ch == '$' || unicode_xid::UnicodeXID::is_xid_continue(ch)
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.next_token();
        if token.kind == TokenKind::Eof {
            None
        } else {
            Some(token)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source).map(|token| token.kind).collect()
    }

    #[test]
    fn test_simple_tokens() {
        assert_eq!(
            kinds("{ } ( ) #{"),
            vec![
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::HashBrace,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.5 2. .5 1e3 0x1F 1_000"),
            vec![
                TokenKind::Int(42),
                TokenKind::Float(3.5),
                TokenKind::Float(2.0),
                TokenKind::Float(0.5),
                TokenKind::Float(1000.0),
                TokenKind::Int(31),
                TokenKind::Int(1000),
            ]
        );
    }

    #[test]
    fn test_integer_overflow_is_invalid() {
        assert!(matches!(kinds("2147483648")[0], TokenKind::Invalid(_)));
        assert_eq!(kinds("2147483647"), vec![TokenKind::Int(i32::MAX)]);
    }

    #[test]
    fn test_member_access_on_number_is_not_a_float() {
        assert_eq!(
            kinds("1.x"),
            vec![
                TokenKind::Int(1),
                TokenKind::Dot,
                TokenKind::Identifier("x".into()),
            ]
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            kinds(r#""hello" 'wo\'rld' "a\tb""#),
            vec![
                TokenKind::String("hello".into()),
                TokenKind::String("wo'rld".into()),
                TokenKind::String("a\tb".into()),
            ]
        );
        assert!(matches!(kinds("\"open")[0], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_template() {
        assert_eq!(
            kinds("`a ${x + 1} b ${ {}.y } c`"),
            vec![TokenKind::Template {
                chunks: vec!["a ".into(), " b ".into(), " c".into()],
                expressions: vec!["x + 1".into(), " {}.y ".into()],
            }]
        );
    }

    #[test]
    fn test_template_interpolation_skips_strings() {
        assert_eq!(
            kinds("`${ \"}\" }`"),
            vec![TokenKind::Template {
                chunks: vec![String::new(), String::new()],
                expressions: vec![" \"}\" ".into()],
            }]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("function const let var break"),
            vec![
                TokenKind::Function,
                TokenKind::Const,
                TokenKind::Let,
                TokenKind::Var,
                TokenKind::Break,
            ]
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(
            kinds("foo _bar $baz héllo"),
            vec![
                TokenKind::Identifier("foo".into()),
                TokenKind::Identifier("_bar".into()),
                TokenKind::Identifier("$baz".into()),
                TokenKind::Identifier("héllo".into()),
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("** **= ++ -- == != <= >= && || += %="),
            vec![
                TokenKind::StarStar,
                TokenKind::StarStarEqual,
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::EqualEqual,
                TokenKind::NotEqual,
                TokenKind::LessThanEqual,
                TokenKind::GreaterThanEqual,
                TokenKind::AmpersandAmpersand,
                TokenKind::PipePipe,
                TokenKind::PlusEqual,
                TokenKind::PercentEqual,
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("1 // line\n2 /* multi\nline */ 3"),
            vec![TokenKind::Int(1), TokenKind::Int(2), TokenKind::Int(3)]
        );
        assert!(matches!(kinds("1 /* open")[1], TokenKind::Invalid(_)));
    }

    #[test]
    fn test_division_vs_comment() {
        assert_eq!(
            kinds("6 / 2"),
            vec![TokenKind::Int(6), TokenKind::Slash, TokenKind::Int(2)]
        );
    }

    #[test]
    fn test_spans() {
        let mut scanner = Scanner::new("let answer");
        assert_eq!(scanner.next_token().span, Span::new(0, 3));
        assert_eq!(scanner.next_token().span, Span::new(4, 10));
        assert_eq!(scanner.next_token().kind, TokenKind::Eof);
    }
}
