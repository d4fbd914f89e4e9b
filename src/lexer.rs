//! A module implementing lexical analysis (tokenization) for a simple shell-like language.
//!
//! Variable substitution happens here rather than in a later pass, so expansions and
//! literal fragments concatenate inside a single word: with `A=hel`, `$A.txt` lexes to
//! the word `hel.txt`.

use crate::env::Environment;

/// Represents a token resulting from lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A fully substituted and unescaped word.
    Word(String),
    /// The pipe operator, `|`.
    Pipe,
    /// The equality symbol, `=`.
    Assign,
    /// A `$` that did not expand: either bare, or the start of `$NAME=value`.
    Dollar,
    /// End of input. Always the last token, and only once.
    Eof,
}

/// Errors that can occur during the lexical analysis process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexingError {
    /// A closing quote (single or double) was not found.
    #[error("syntax error: unterminated {quote} quote")]
    UnterminatedQuote { quote: QuoteKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteKind {
    Single,
    Double,
}

impl std::fmt::Display for QuoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteKind::Single => f.write_str("single"),
            QuoteKind::Double => f.write_str("double"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Unquoted,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

/// Characters a backslash turns into literals outside of quotes.
fn is_escapable(c: char) -> bool {
    matches!(c, ' ' | '|' | '$' | '"' | '\'' | '\\' | '=')
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct LexingFSM<'a> {
    input: Vec<char>,
    pos: usize,
    state: LexingState,
    env: &'a Environment,
    out: Vec<Token>,
    buffer: String,
    /// Set when a quote opened the current word, so `''` still yields an (empty) word.
    word_started: bool,
}

impl<'a> LexingFSM<'a> {
    /// Creates a new instance of the lexical analysis Finite State Machine.
    fn new(line: &str, env: &'a Environment) -> Self {
        LexingFSM {
            input: line.chars().collect(),
            pos: 0,
            state: LexingState::Unquoted,
            env,
            out: Vec::new(),
            buffer: String::new(),
            word_started: false,
        }
    }

    /// Runs the machine over the whole input and returns the token sequence.
    fn make_tokens(mut self) -> Result<Vec<Token>, LexingError> {
        while let Some(ch) = self.read_char() {
            match self.state {
                LexingState::Unquoted => self.handle_unquoted(ch),
                LexingState::ReadingSingleQuote => self.handle_single_quote(ch),
                LexingState::ReadingDoubleQuote => self.handle_double_quote(ch),
            }
        }

        match self.state {
            LexingState::ReadingSingleQuote => {
                return Err(LexingError::UnterminatedQuote {
                    quote: QuoteKind::Single,
                });
            }
            LexingState::ReadingDoubleQuote => {
                return Err(LexingError::UnterminatedQuote {
                    quote: QuoteKind::Double,
                });
            }
            LexingState::Unquoted => {}
        }

        self.flush_word();
        self.out.push(Token::Eof);
        Ok(self.out)
    }

    fn read_char(&mut self) -> Option<char> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn push_char(&mut self, c: char) {
        self.buffer.push(c);
        self.word_started = true;
    }

    /// Emits the pending word, if any.
    fn flush_word(&mut self) {
        if self.word_started {
            self.out.push(Token::Word(std::mem::take(&mut self.buffer)));
            self.word_started = false;
        }
    }

    fn emit(&mut self, token: Token) {
        self.flush_word();
        self.out.push(token);
    }

    fn handle_unquoted(&mut self, ch: char) {
        match ch {
            c if c.is_whitespace() => self.flush_word(),
            '|' => self.emit(Token::Pipe),
            '=' => self.emit(Token::Assign),
            '\'' => {
                self.word_started = true;
                self.state = LexingState::ReadingSingleQuote;
            }
            '"' => {
                self.word_started = true;
                self.state = LexingState::ReadingDoubleQuote;
            }
            '\\' => match self.peek_char() {
                Some(next) if is_escapable(next) => {
                    self.read_char();
                    self.push_char(next);
                }
                _ => self.push_char('\\'),
            },
            '$' => self.handle_dollar(false),
            c => self.push_char(c),
        }
    }

    fn handle_single_quote(&mut self, ch: char) {
        match ch {
            '\'' => self.state = LexingState::Unquoted,
            c => self.buffer.push(c),
        }
    }

    fn handle_double_quote(&mut self, ch: char) {
        match ch {
            '"' => self.state = LexingState::Unquoted,
            '\\' => match self.peek_char() {
                Some(next @ ('$' | '`' | '"' | '\\')) => {
                    self.read_char();
                    self.buffer.push(next);
                }
                Some('n') => {
                    self.read_char();
                    self.buffer.push('\n');
                }
                _ => self.buffer.push('\\'),
            },
            '$' => self.handle_dollar(true),
            c => self.buffer.push(c),
        }
    }

    /// Handles a `$` that has just been read.
    fn handle_dollar(&mut self, in_double: bool) {
        let start = self.pos;
        while self.peek_char().is_some_and(is_ident_char) {
            self.pos += 1;
        }

        if start == self.pos {
            if in_double {
                self.buffer.push('$');
            } else {
                self.emit(Token::Dollar);
            }
            return;
        }

        let name: String = self.input[start..self.pos].iter().collect();
        if !in_double && self.peek_char() == Some('=') {
            // `$NAME=value`: leave the assignment to the parser.
            self.emit(Token::Dollar);
            self.out.push(Token::Word(name));
            return;
        }

        let env = self.env;
        self.buffer.push_str(env.get_var(&name).unwrap_or_default());
        self.word_started = true;
    }
}

/// The main entry point function to perform lexical analysis.
///
/// Variables are looked up in `env` while tokenizing. The returned sequence always
/// ends with exactly one [`Token::Eof`].
///
/// # Errors
/// [`LexingError::UnterminatedQuote`] when a quote is opened and never closed.
pub fn tokenize(line: &str, env: &Environment) -> Result<Vec<Token>, LexingError> {
    let tokens = LexingFSM::new(line, env).make_tokens()?;
    log::debug!("tokens: {:?}", tokens);
    Ok(tokens)
}
