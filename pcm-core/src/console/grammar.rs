#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the console.
//!
//! The lexer uses `regal` to produce a bounded token stream, while the parser
//! composes `winnow` combinators over those tokens to build [`Command`]
//! values. Nothing here allocates.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, CommandTag};
use crate::frame::MAX_DATA_LEN;
use crate::shows::ShowKind;

/// Maximum number of tokens produced per console line.
pub const MAX_TOKENS: usize = 24;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Lexical token kinds recognized by the console grammar.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Hexadecimal literal with a `0x` prefix.
    #[regex(r"0[xX][0-9A-Fa-f]+", priority = 3)]
    HexInteger,
    #[regex(r"[0-9]+")]
    Integer,
    /// Identifier or keyword (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Ident,
    /// Double-quoted printable text without embedded quotes.
    #[regex(r#""[ !#-~]*""#)]
    Quoted,
    /// Inline whitespace is ignored.
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    /// End-of-line token (`\r`, `\n`, or `\r\n`).
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token emitted by the lexer with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

/// Bounded token buffer to avoid dynamic allocation in `no_std` environments.
pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

/// Lexer errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the static buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

/// Grammar errors emitted by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarErrorKind<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: Option<TokenKind>,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    /// Literal did not fit the value it was parsed into.
    InvalidInteger {
        span: Range<usize>,
    },
    InvalidDuration {
        span: Range<usize>,
    },
    /// A frame listed more than eight data bytes.
    TooManyBytes {
        span: Range<usize>,
    },
    InvalidToken {
        span: Range<usize>,
        lexeme: &'a str,
    },
}

impl fmt::Display for GrammarErrorKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarErrorKind::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found {found:?} at {span:?}"),
            GrammarErrorKind::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarErrorKind::InvalidInteger { span } => {
                write!(f, "integer out of range at {span:?}")
            }
            GrammarErrorKind::InvalidDuration { span } => {
                write!(f, "invalid duration literal at {span:?}")
            }
            GrammarErrorKind::TooManyBytes { span } => {
                write!(f, "more than {MAX_DATA_LEN} data bytes at {span:?}")
            }
            GrammarErrorKind::InvalidToken { span, lexeme } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Wrapper type enabling a consistent error surface for consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrammarError<'a> {
    pub kind: GrammarErrorKind<'a>,
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        GrammarError {
            kind: match token {
                Some(tok) => GrammarErrorKind::UnexpectedToken {
                    expected,
                    found: Some(tok.kind),
                    span: tok.span.clone(),
                },
                None => GrammarErrorKind::UnexpectedEnd { expected },
            },
        }
    }

    fn invalid_integer(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidInteger {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_duration(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidDuration {
                span: token.span.clone(),
            },
        }
    }

    fn too_many_bytes(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::TooManyBytes {
                span: token.span.clone(),
            },
        }
    }

    fn invalid_token(token: &Token<'a>) -> Self {
        GrammarError {
            kind: GrammarErrorKind::InvalidToken {
                span: token.span.clone(),
                lexeme: token.lexeme,
            },
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for GrammarError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        GrammarError::unexpected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Payload bytes listed on a `frame` command.
pub type FrameBytes = HeaplessVec<u8, MAX_DATA_LEN>;

/// Structured commands produced by the parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Frame { id: u32, payload: FrameBytes },
    Remote { id: u32 },
    Advance(Duration),
    Provision { ssid: &'a str, password: &'a str },
    Show(ShowKind),
    Status,
    Events,
    Help { topic: Option<&'a str> },
}

/// Tokenize the provided line.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(&mut buffer, record.token, lexeme, span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let end = start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, start..end)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::TooManyTokens {
            processed: buffer.len() + 1,
        })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parse a console command from the provided line.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::invalid_token(token)));
    }

    let mut input = tokens.as_slice();
    let command = match command().parse_next(&mut input) {
        Ok(command) => command,
        Err(ErrMode::Backtrack(err) | ErrMode::Cut(err)) => {
            return Err(ParseError::Grammar(err));
        }
        Err(ErrMode::Incomplete(_)) => {
            return Err(ParseError::Grammar(GrammarError::unexpected(
                "token",
                input.first(),
            )));
        }
    };

    match input.iter().find(|token| token.kind != TokenKind::Eol) {
        Some(token) => Err(ParseError::Grammar(GrammarError::unexpected(
            "end of command",
            Some(token),
        ))),
        None => Ok(command),
    }
}

fn command<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, Command<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let keyword = expect_kind(TokenKind::Ident, "command keyword").parse_next(input)?;
        let Some(spec) = catalog::find(keyword.lexeme) else {
            return Err(ErrMode::Backtrack(GrammarError::unexpected(
                "command keyword",
                Some(&keyword),
            )));
        };

        match spec.tag {
            CommandTag::Frame => {
                let id = identifier().parse_next(input)?;
                let payload = frame_bytes().parse_next(input)?;
                Ok(Command::Frame { id, payload })
            }
            CommandTag::Remote => {
                let id = identifier().parse_next(input)?;
                Ok(Command::Remote { id })
            }
            CommandTag::Advance => {
                let token = expect_kind(TokenKind::Duration, "duration").parse_next(input)?;
                let duration = parse_duration(&token).map_err(ErrMode::Cut)?;
                Ok(Command::Advance(duration))
            }
            CommandTag::Provision => {
                let ssid = quoted("quoted ssid").parse_next(input)?;
                let password = quoted("quoted password").parse_next(input)?;
                Ok(Command::Provision { ssid, password })
            }
            CommandTag::Show => {
                let token = expect_kind(TokenKind::Ident, "show name").parse_next(input)?;
                let show = show_kind(token.lexeme).ok_or_else(|| {
                    ErrMode::Cut(GrammarError::unexpected("show name", Some(&token)))
                })?;
                Ok(Command::Show(show))
            }
            CommandTag::Status => Ok(Command::Status),
            CommandTag::Events => Ok(Command::Events),
            CommandTag::Help => match input.split_first() {
                Some((token, rest)) if token.kind == TokenKind::Ident => {
                    *input = rest;
                    Ok(Command::Help {
                        topic: Some(token.lexeme),
                    })
                }
                Some((token, _)) if token.kind != TokenKind::Eol => Err(ErrMode::Backtrack(
                    GrammarError::unexpected("topic", Some(token)),
                )),
                _ => Ok(Command::Help { topic: None }),
            },
        }
    }
}

fn identifier<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, u32, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let token = number_token("identifier").parse_next(input)?;
        parse_number(&token).map_err(ErrMode::Cut)
    }
}

fn frame_bytes<'src, 'slice>() -> impl Parser<Input<'src, 'slice>, FrameBytes, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let mut payload = FrameBytes::new();
        while input.first().is_some_and(is_number) {
            let token = number_token("byte").parse_next(input)?;
            let value = parse_number(&token).map_err(ErrMode::Cut)?;
            let byte = u8::try_from(value)
                .map_err(|_| ErrMode::Cut(GrammarError::invalid_integer(&token)))?;
            payload
                .push(byte)
                .map_err(|_| ErrMode::Cut(GrammarError::too_many_bytes(&token)))?;
        }
        Ok(payload)
    }
}

fn number_token<'src, 'slice>(
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if is_number(token) => {
            *input = rest;
            Ok(token.clone())
        }
        other => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            other.map(|(token, _)| token),
        ))),
    }
}

fn is_number(token: &Token<'_>) -> bool {
    matches!(token.kind, TokenKind::Integer | TokenKind::HexInteger)
}

fn quoted<'src, 'slice>(
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, &'src str, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| {
        let token = expect_kind(TokenKind::Quoted, label).parse_next(input)?;
        let lexeme: &'src str = token.lexeme;
        Ok(lexeme
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(lexeme))
    }
}

fn expect_kind<'src, 'slice>(
    kind: TokenKind,
    label: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, GrammarError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        Some((token, _)) => Err(ErrMode::Backtrack(GrammarError::unexpected(
            label,
            Some(token),
        ))),
        None => Err(ErrMode::Backtrack(GrammarError::unexpected(label, None))),
    }
}

fn show_kind(name: &str) -> Option<ShowKind> {
    [
        ShowKind::Interior,
        ShowKind::Exterior,
        ShowKind::Startup,
        ShowKind::Melody,
    ]
    .into_iter()
    .find(|kind| match kind {
        ShowKind::Interior => name.eq_ignore_ascii_case("interior"),
        ShowKind::Exterior => name.eq_ignore_ascii_case("exterior"),
        ShowKind::Startup => name.eq_ignore_ascii_case("startup"),
        ShowKind::Melody => name.eq_ignore_ascii_case("melody"),
    })
}

fn parse_number<'a>(token: &Token<'a>) -> Result<u32, GrammarError<'a>> {
    let parsed = match token.kind {
        TokenKind::HexInteger => u32::from_str_radix(&token.lexeme[2..], 16),
        _ => token.lexeme.parse::<u32>(),
    };
    parsed.map_err(|_| GrammarError::invalid_integer(token))
}

fn parse_duration<'a>(token: &Token<'a>) -> Result<Duration, GrammarError<'a>> {
    let text = token.lexeme;
    if let Some(rest) = text.strip_suffix("ms") {
        let millis = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_millis(millis.into()))
    } else if let Some(rest) = text.strip_suffix('s') {
        let seconds = rest
            .parse::<u32>()
            .map_err(|_| GrammarError::invalid_duration(token))?;
        Ok(Duration::from_secs(seconds.into()))
    } else {
        Err(GrammarError::invalid_duration(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &str) -> Command<'_> {
        parse(input).expect("command should parse")
    }

    #[test]
    fn parses_frame_with_mixed_radix_bytes() {
        match parse_ok("frame 21 3 0xFF") {
            Command::Frame { id, payload } => {
                assert_eq!(id, 21);
                assert_eq!(payload.as_slice(), &[3, 0xFF]);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_frame_without_payload() {
        match parse_ok("frame 0x1E") {
            Command::Frame { id, payload } => {
                assert_eq!(id, 30);
                assert!(payload.is_empty());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_byte_values_above_255() {
        match parse("frame 21 0 256") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidInteger { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_more_than_eight_bytes() {
        match parse("frame 1 1 2 3 4 5 6 7 8 9") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::TooManyBytes { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn parses_remote_and_advance() {
        assert_eq!(parse_ok("remote 24"), Command::Remote { id: 24 });
        assert_eq!(
            parse_ok("advance 33ms"),
            Command::Advance(Duration::from_millis(33))
        );
        assert_eq!(parse_ok("advance 6s\n"), Command::Advance(Duration::from_secs(6)));
    }

    #[test]
    fn parses_quoted_credentials() {
        assert_eq!(
            parse_ok("provision \"Hello World\" \"Secret01\""),
            Command::Provision {
                ssid: "Hello World",
                password: "Secret01",
            }
        );
        assert_eq!(
            parse_ok("provision \"\" \"\""),
            Command::Provision {
                ssid: "",
                password: "",
            }
        );
    }

    #[test]
    fn parses_show_names_case_insensitively() {
        assert_eq!(parse_ok("show Melody"), Command::Show(ShowKind::Melody));
        assert!(parse("show fireworks").is_err());
    }

    #[test]
    fn parses_help_with_and_without_topic() {
        assert_eq!(parse_ok("help"), Command::Help { topic: None });
        assert_eq!(
            parse_ok("HELP frame"),
            Command::Help {
                topic: Some("frame")
            }
        );
    }

    #[test]
    fn rejects_trailing_arguments() {
        match parse("status now") {
            Err(ParseError::Grammar(err)) => assert!(matches!(
                err.kind,
                GrammarErrorKind::UnexpectedToken {
                    expected: "end of command",
                    ..
                }
            )),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_invalid_token() {
        match parse("frame 24 1$") {
            Err(ParseError::Grammar(err)) => {
                assert!(matches!(err.kind, GrammarErrorKind::InvalidToken { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn lexer_recognises_hex_and_durations() {
        let tokens = lex("0x1B 250ms 7").expect("lexing should succeed");
        let kinds: HeaplessVec<TokenKind, 3> = tokens.iter().map(|token| token.kind).collect();
        assert_eq!(
            kinds.as_slice(),
            &[TokenKind::HexInteger, TokenKind::Duration, TokenKind::Integer]
        );
    }
}
