use crate::lexer::Token;
use crate::registry::{CommandKind, CommandRegistry};

/// A single stage of a pipeline.
///
/// For [`CommandKind::Assignment`], `name` is the variable and `args[0]` (if any) the
/// value. For [`CommandKind::External`], `args[0]` repeats `name` so it can be used as
/// the program's argv[0]; for every other kind `args` holds only the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    pub kind: CommandKind,
}

/// Commands in execution order, left to right as typed.
pub type Pipeline = Vec<ParsedCommand>;

struct PipelineBuilder<'a> {
    tokens: Vec<Token>,
    pos: usize,
    registry: &'a CommandRegistry,
    pipeline: Pipeline,
    current_words: Vec<String>,
}

impl<'a> PipelineBuilder<'a> {
    fn new(tokens: Vec<Token>, registry: &'a CommandRegistry) -> Self {
        Self {
            tokens,
            pos: 0,
            registry,
            pipeline: Vec::new(),
            current_words: Vec::new(),
        }
    }

    fn build(mut self) -> Pipeline {
        while let Some(token) = self.consume() {
            match token {
                Token::Eof => break,
                Token::Pipe => self.finish_command(),
                Token::Dollar if self.at_assignment() => self.parse_assignment(),
                // A `$` with nothing to expand stays literal.
                Token::Dollar => self.current_words.push("$".to_string()),
                Token::Word(text) => {
                    let word = self.continue_word_run(text);
                    self.current_words.push(word);
                }
                Token::Assign => {
                    self.pos -= 1;
                    let word = self.take_word_run();
                    self.current_words.push(word);
                }
            }
        }
        self.finish_command();
        self.pipeline
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    /// Helper to look ahead n tokens
    fn peek_n(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn consume(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// True when the tokens after a consumed `$` read `NAME =`.
    fn at_assignment(&self) -> bool {
        matches!(
            (self.peek(), self.peek_n(1)),
            (Some(Token::Word(_)), Some(Token::Assign))
        )
    }

    /// Parse `NAME = [value]` following a `$`.
    fn parse_assignment(&mut self) {
        let Some(Token::Word(name)) = self.consume() else {
            return;
        };
        self.consume(); // '='
        let args = match self.peek() {
            Some(Token::Word(_) | Token::Assign) => vec![self.take_word_run()],
            _ => Vec::new(),
        };
        self.pipeline.push(ParsedCommand {
            name,
            args,
            kind: CommandKind::Assignment,
        });
    }

    /// Consume a word or `=` and everything `=`-joined to it.
    fn take_word_run(&mut self) -> String {
        let text = match self.peek() {
            Some(Token::Word(text)) => {
                let text = text.clone();
                self.pos += 1;
                text
            }
            _ => String::new(),
        };
        self.continue_word_run(text)
    }

    /// Fuse `text (= [word])*` into one literal word, so `x=1` is a single argument.
    fn continue_word_run(&mut self, mut text: String) -> String {
        while let Some(Token::Assign) = self.peek() {
            self.pos += 1;
            text.push('=');
            if let Some(Token::Word(value)) = self.peek() {
                text.push_str(value);
                self.pos += 1;
            }
        }
        text
    }

    fn finish_command(&mut self) {
        if self.current_words.is_empty() {
            return;
        }
        let mut args = std::mem::take(&mut self.current_words);
        let name = args.remove(0);
        let kind = self.registry.resolve(&name);
        if kind == CommandKind::External {
            args.insert(0, name.clone());
        }
        self.pipeline.push(ParsedCommand { name, args, kind });
    }
}

/// Build a [`Pipeline`] from the lexer's token sequence.
///
/// Each command name is classified through `registry`. Stray pipes are ignored and an
/// input with no words produces an empty pipeline.
pub fn parse(tokens: Vec<Token>, registry: &CommandRegistry) -> Pipeline {
    let pipeline = PipelineBuilder::new(tokens, registry).build();
    log::debug!("pipeline: {:?}", pipeline);
    pipeline
}
