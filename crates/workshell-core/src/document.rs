// ── SSH client config document ──
//
// The config file is treated as hand-edited text that must survive a
// parse/render cycle byte for byte. Parsing splits it into an opaque
// preamble (everything before the first stanza) and an ordered list of
// stanzas. Parsed stanzas keep their exact source text; stanzas created
// in memory are rendered from their directives.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The config text could not be decomposed into stanzas.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    /// 1-based line number of the offending line.
    pub line: usize,
    pub reason: String,
}

impl ParseError {
    fn new(line: usize, reason: impl Into<String>) -> Self {
        Self {
            line,
            reason: reason.into(),
        }
    }
}

// ── Stanza model ────────────────────────────────────────────────────

/// Keyword that opened a stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StanzaKind {
    Host,
    /// `Match` stanzas are carried through untouched; their criteria
    /// tokens are stored in place of host patterns.
    Match,
}

impl StanzaKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Host => "Host",
            Self::Match => "Match",
        }
    }
}

/// A single `Name value` line inside a stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// Directive name as written in the file (case preserved).
    pub name: String,
    /// Value with surrounding double quotes removed.
    pub value: String,
}

impl Directive {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    /// Exact source text, from the stanza line up to the next stanza.
    Parsed(String),
    /// Built in memory; text is generated on render.
    Rendered,
}

/// One stanza of an SSH client config.
///
/// Always carries at least one pattern: every constructor takes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock {
    kind: StanzaKind,
    patterns: Vec<String>,
    directives: Vec<Directive>,
    origin: Origin,
}

impl HostBlock {
    /// Start a new in-memory `Host` stanza matching `pattern`.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            kind: StanzaKind::Host,
            patterns: vec![pattern.into()],
            directives: Vec::new(),
            origin: Origin::Rendered,
        }
    }

    /// Add another host pattern.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.patterns.push(pattern.into());
        self
    }

    /// Append a directive. Order is preserved on render.
    pub fn with_directive(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.directives.push(Directive::new(name, value));
        self
    }

    pub fn kind(&self) -> StanzaKind {
        self.kind
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// First value of the directive called exactly `name`.
    ///
    /// Names are compared case-sensitively; OpenSSH itself is
    /// case-insensitive, but managed entries are always written with the
    /// canonical spelling.
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    /// Whether this block was parsed from text (as opposed to built in memory).
    pub fn is_parsed(&self) -> bool {
        matches!(self.origin, Origin::Parsed(_))
    }

    /// The exact source text of a parsed block.
    pub fn raw_text(&self) -> Option<&str> {
        match &self.origin {
            Origin::Parsed(raw) => Some(raw),
            Origin::Rendered => None,
        }
    }

    /// Text of this block as it is emitted by [`ConfigDocument::render`].
    pub fn to_text(&self) -> String {
        match &self.origin {
            Origin::Parsed(raw) => raw.clone(),
            Origin::Rendered => self.generate_text(),
        }
    }

    fn generate_text(&self) -> String {
        let mut out = format!(
            "{} {}\n",
            self.kind.keyword(),
            self.patterns
                .iter()
                .map(|p| quote_if_needed(p))
                .collect::<Vec<_>>()
                .join(" ")
        );
        for directive in &self.directives {
            out.push_str("\t ");
            out.push_str(&directive.name);
            out.push(' ');
            out.push_str(&quote_if_needed(&directive.value));
            out.push('\n');
        }
        out
    }

    /// Whether `alias` selects this block under OpenSSH pattern rules.
    ///
    /// `*` and `?` wildcards are honoured and a matching `!pattern` vetoes
    /// the whole block. `Match` stanzas never match an alias.
    pub fn matches(&self, alias: &str) -> bool {
        if self.kind != StanzaKind::Host {
            return false;
        }
        let mut found = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if wildcard_match(alias, negated) {
                    return false;
                }
            } else if wildcard_match(alias, pattern) {
                found = true;
            }
        }
        found
    }
}

fn quote_if_needed(value: &str) -> String {
    if value.chars().any(char::is_whitespace) {
        format!("\"{value}\"")
    } else {
        value.to_owned()
    }
}

/// Glob match supporting `*` (any run) and `?` (any single character).
fn wildcard_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    // Position of the last `*` seen and the text index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

// ── Document ────────────────────────────────────────────────────────

/// Ordered model of a whole SSH client config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    preamble: String,
    blocks: Vec<HostBlock>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config text. Empty or blank input yields an empty document.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut preamble = String::new();
        let mut blocks = Vec::new();
        let mut current: Option<HostBlock> = None;

        for (idx, raw_line) in text.split_inclusive('\n').enumerate() {
            let line_number = idx + 1;
            match classify(raw_line, line_number)? {
                Line::Trivia => match current.as_mut() {
                    Some(block) => push_raw(block, raw_line),
                    None => preamble.push_str(raw_line),
                },
                Line::Stanza { kind, patterns } => {
                    // A comment run directly above the stanza line describes it.
                    let mut raw = String::new();
                    if let Some(mut done) = current.take() {
                        raw = take_trailing_comments(&mut done);
                        blocks.push(done);
                    }
                    raw.push_str(raw_line);
                    current = Some(HostBlock {
                        kind,
                        patterns,
                        directives: Vec::new(),
                        origin: Origin::Parsed(raw),
                    });
                }
                Line::Directive(directive) => match current.as_mut() {
                    Some(block) => {
                        block.directives.push(directive);
                        push_raw(block, raw_line);
                    }
                    // Global options before the first stanza stay opaque.
                    None => preamble.push_str(raw_line),
                },
            }
        }

        if let Some(done) = current {
            blocks.push(done);
        }

        Ok(Self { preamble, blocks })
    }

    /// Serialize back to text.
    ///
    /// Parsed blocks are emitted verbatim. Each appended block is separated
    /// from the text before it by exactly one blank line.
    pub fn render(&self) -> String {
        let mut out = self.preamble.clone();
        for block in &self.blocks {
            match &block.origin {
                Origin::Parsed(raw) => out.push_str(raw),
                Origin::Rendered => {
                    separate(&mut out);
                    out.push_str(&block.generate_text());
                }
            }
        }
        out
    }

    /// Add a block at the end of the document.
    pub fn append(&mut self, block: HostBlock) {
        self.blocks.push(block);
    }

    pub fn blocks(&self) -> &[HostBlock] {
        &self.blocks
    }

    /// Text that precedes the first stanza (comments, global options).
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn is_empty(&self) -> bool {
        self.preamble.is_empty() && self.blocks.is_empty()
    }

    /// Keep only the blocks for which `keep` returns `true`, preserving
    /// order. Returns the removed blocks.
    pub fn retain_blocks(&mut self, mut keep: impl FnMut(&HostBlock) -> bool) -> Vec<HostBlock> {
        let (kept, removed): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.blocks).into_iter().partition(|b| keep(b));
        self.blocks = kept;
        removed
    }
}

impl FromStr for ConfigDocument {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ConfigDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn push_raw(block: &mut HostBlock, line: &str) {
    if let Origin::Parsed(raw) = &mut block.origin {
        raw.push_str(line);
    }
}

/// Split off the comment lines that end `block`'s raw text.
fn take_trailing_comments(block: &mut HostBlock) -> String {
    let Origin::Parsed(raw) = &mut block.origin else {
        return String::new();
    };
    let mut cut = raw.len();
    for line in raw.split_inclusive('\n').rev() {
        if !line.trim_start().starts_with('#') {
            break;
        }
        cut -= line.len();
    }
    raw.split_off(cut)
}

fn separate(out: &mut String) {
    if out.is_empty() {
        return;
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    if !out.ends_with("\n\n") {
        out.push('\n');
    }
}

// ── Line classification ─────────────────────────────────────────────

enum Line {
    /// Blank line or comment.
    Trivia,
    Stanza {
        kind: StanzaKind,
        patterns: Vec<String>,
    },
    Directive(Directive),
}

fn classify(raw_line: &str, line_number: usize) -> Result<Line, ParseError> {
    let line = raw_line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Line::Trivia);
    }

    let (keyword, rest) = split_keyword(line);

    let kind = if keyword.eq_ignore_ascii_case("host") {
        Some(StanzaKind::Host)
    } else if keyword.eq_ignore_ascii_case("match") {
        Some(StanzaKind::Match)
    } else {
        None
    };

    if let Some(kind) = kind {
        let patterns = tokenize(rest, line_number)?;
        if patterns.is_empty() {
            return Err(ParseError::new(
                line_number,
                format!("{} requires at least one pattern", kind.keyword()),
            ));
        }
        return Ok(Line::Stanza { kind, patterns });
    }

    if rest.is_empty() {
        return Err(ParseError::new(
            line_number,
            format!("missing value for '{keyword}'"),
        ));
    }
    if rest.matches('"').count() % 2 != 0 {
        return Err(ParseError::new(
            line_number,
            format!("unbalanced quote in value for '{keyword}'"),
        ));
    }

    Ok(Line::Directive(Directive::new(keyword, unquote(rest))))
}

/// Split `Keyword value`, `Keyword=value` or `Keyword = value`.
fn split_keyword(line: &str) -> (&str, &str) {
    let end = line
        .find(|c: char| c.is_whitespace() || c == '=')
        .unwrap_or(line.len());
    let (keyword, rest) = line.split_at(end);
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('=').unwrap_or(rest).trim();
    (keyword, rest)
}

/// Split a pattern list on whitespace, honouring double quotes.
fn tokenize(input: &str, line_number: usize) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if in_quotes {
        return Err(ParseError::new(line_number, "unbalanced quote in pattern list"));
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    Ok(tokens)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = "\
# global settings
ServerAliveInterval 60

Host myserver
    HostName example.com
    User alice

Host old-ws
\t Hostname 0.0.0.0
\t IdentityFile /home/u/.workshell/workshell.pem
\t User brev
\t Port 2222
";

    #[test]
    fn empty_input_is_empty_document() {
        let doc = ConfigDocument::parse("").unwrap();
        assert!(doc.is_empty());
        assert_eq!(doc.render(), "");
    }

    #[test]
    fn blank_input_has_no_blocks() {
        let doc = ConfigDocument::parse("\n\n   \n").unwrap();
        assert!(doc.blocks().is_empty());
        assert_eq!(doc.render(), "\n\n   \n");
    }

    #[test]
    fn parses_blocks_in_order() {
        let doc = ConfigDocument::parse(SAMPLE).unwrap();
        let names: Vec<_> = doc.blocks().iter().map(|b| b.patterns()[0].as_str()).collect();
        assert_eq!(names, ["myserver", "old-ws"]);
        assert_eq!(doc.preamble(), "# global settings\nServerAliveInterval 60\n\n");
        assert_eq!(doc.blocks()[1].directive("Port"), Some("2222"));
        assert_eq!(doc.blocks()[0].directive("HostName"), Some("example.com"));
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let doc = ConfigDocument::parse(SAMPLE).unwrap();
        assert_eq!(doc.render(), SAMPLE);
    }

    #[test]
    fn round_trip_keeps_crlf_and_missing_final_newline() {
        let text = "Host a\r\n  User x\r\n\r\nHost b\n  Port 22";
        let doc = ConfigDocument::parse(text).unwrap();
        assert_eq!(doc.blocks().len(), 2);
        assert_eq!(doc.to_string(), text);
    }

    #[test]
    fn comment_run_above_a_stanza_belongs_to_it() {
        let text = "Host a\n  User x\n# about b\n# owner: ops\nHost b\n  User y\n";
        let doc = ConfigDocument::parse(text).unwrap();
        assert_eq!(doc.blocks()[0].raw_text(), Some("Host a\n  User x\n"));
        assert_eq!(
            doc.blocks()[1].raw_text(),
            Some("# about b\n# owner: ops\nHost b\n  User y\n")
        );
        assert_eq!(doc.render(), text);
    }

    #[test]
    fn comment_before_a_blank_line_stays_with_previous_block() {
        let doc =
            ConfigDocument::parse("Host a\n  User x\n  # note on a\n\nHost b\n  User y\n").unwrap();
        assert_eq!(
            doc.blocks()[0].raw_text(),
            Some("Host a\n  User x\n  # note on a\n\n")
        );
        assert_eq!(doc.blocks()[1].raw_text(), Some("Host b\n  User y\n"));
    }

    #[test]
    fn equals_syntax_and_quotes() {
        let doc =
            ConfigDocument::parse("Host=\"my box\" other\n  IdentityFile = \"/a b/key\"\n").unwrap();
        let block = &doc.blocks()[0];
        assert_eq!(block.patterns(), ["my box", "other"]);
        assert_eq!(block.directive("IdentityFile"), Some("/a b/key"));
    }

    #[test]
    fn hostname_is_not_a_stanza() {
        let doc = ConfigDocument::parse("Host a\nHostname=b\n").unwrap();
        assert_eq!(doc.blocks().len(), 1);
        assert_eq!(doc.blocks()[0].directive("Hostname"), Some("b"));
    }

    #[test]
    fn match_stanza_is_kept_opaque() {
        let text = "Match host *.corp exec \"true\"\n  User corp\n";
        let doc = ConfigDocument::parse(text).unwrap();
        assert_eq!(doc.blocks()[0].kind(), StanzaKind::Match);
        assert!(!doc.blocks()[0].matches("a.corp"));
        assert_eq!(doc.render(), text);
    }

    #[test]
    fn host_without_pattern_is_an_error() {
        let err = ConfigDocument::parse("Host a\n  User x\nHost\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn directive_without_value_is_an_error() {
        let err = ConfigDocument::parse("Host a\n  IdentityFile\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.reason.contains("IdentityFile"));
    }

    #[test]
    fn unbalanced_quote_is_an_error() {
        assert!(ConfigDocument::parse("Host \"a\n").is_err());
        assert!(ConfigDocument::parse("Host a\n  IdentityFile \"/x\n").is_err());
    }

    #[test]
    fn appended_block_is_rendered_after_a_blank_line() {
        let mut doc = ConfigDocument::parse("Host a\n  User x").unwrap();
        doc.append(
            HostBlock::new("ws")
                .with_directive("Hostname", "0.0.0.0")
                .with_directive("Port", "2222"),
        );
        assert_eq!(
            doc.render(),
            "Host a\n  User x\n\nHost ws\n\t Hostname 0.0.0.0\n\t Port 2222\n"
        );
    }

    #[test]
    fn appended_block_into_empty_document_has_no_separator() {
        let mut doc = ConfigDocument::new();
        doc.append(HostBlock::new("ws").with_directive("User", "brev"));
        assert_eq!(doc.render(), "Host ws\n\t User brev\n");
    }

    #[test]
    fn existing_blank_line_is_not_doubled() {
        let mut doc = ConfigDocument::parse("Host a\n  User x\n\n").unwrap();
        doc.append(HostBlock::new("ws").with_directive("User", "brev"));
        assert_eq!(doc.render(), "Host a\n  User x\n\nHost ws\n\t User brev\n");
    }

    #[test]
    fn rendered_text_reparses_to_same_directives() {
        let block = HostBlock::new("ws")
            .with_directive("IdentityFile", "/path with space/key")
            .with_directive("Port", "2223");
        let doc = ConfigDocument::parse(&block.to_text()).unwrap();
        let parsed = &doc.blocks()[0];
        assert_eq!(parsed.patterns(), block.patterns());
        assert_eq!(parsed.directives(), block.directives());
    }

    #[test]
    fn retain_blocks_reports_removed() {
        let mut doc = ConfigDocument::parse(SAMPLE).unwrap();
        let removed = doc.retain_blocks(|b| b.patterns()[0] != "old-ws");
        assert_eq!(removed.len(), 1);
        assert_eq!(doc.blocks().len(), 1);
        assert_eq!(
            doc.render(),
            "# global settings\nServerAliveInterval 60\n\nHost myserver\n    HostName example.com\n    User alice\n\n"
        );
    }

    #[test]
    fn pattern_matching_rules() {
        let block = HostBlock::new("*.dev").with_pattern("!secret.dev").with_pattern("ws-?");
        assert!(block.matches("api.dev"));
        assert!(block.matches("ws-1"));
        assert!(!block.matches("ws-10"));
        assert!(!block.matches("secret.dev"));
        assert!(!block.matches("API.DEV.example"));
        assert!(HostBlock::new("exact").matches("exact"));
        assert!(!HostBlock::new("exact").matches("Exact"));
    }

    #[test]
    fn wildcard_edge_cases() {
        assert!(wildcard_match("", "*"));
        assert!(wildcard_match("abc", "a*c"));
        assert!(wildcard_match("abbbc", "a*b*c"));
        assert!(!wildcard_match("abc", "a*d"));
        assert!(!wildcard_match("", "?"));
    }
}
