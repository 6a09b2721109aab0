use std::fmt::Display;
use std::ops::Range;

use logos::Lexer;
use logos::Logos;
use serde::Deserialize;
use serde::Serialize;

/// Tokens of the text that follows a marker sigil.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerToken {
	#[token("(")]
	ParenOpen,
	#[token(")")]
	ParenClose,
	#[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
	Keyword,
	#[regex(r"[+-]?[0-9]+")]
	Number,
	#[regex(r"[ \t]+")]
	Whitespace,
}

/// A control marker found inside a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Directive {
	/// `start(name)`; an empty name refers to the anonymous block.
	Start(String),
	/// `cstart(name)`, a block that begins in code mode.
	CodeStart(String),
	/// `include(name)`, or `include(name, file)` to take the block from one
	/// particular file of the pass.
	Include { name: String, file: Option<String> },
	/// `code`, switching to verbatim code.
	Code,
	/// `edoc`, switching back to documentation.
	Edoc,
	/// `(name)` closes the named block, a bare sigil closes the innermost one.
	End(Option<String>),
	/// `ignore`; the line is dropped.
	Ignore,
	/// `indent N` shifts the following lines by `N` columns.
	Indent(isize),
	/// `if(token)` starts a conditional region.
	If(String),
	/// `fi(token)` ends a conditional region.
	Fi(String),
	/// `define(name)` starts a macro body ending at `enifed(name)`;
	/// `define(name, value)` defines an inline macro.
	Define { name: String, value: Option<String> },
	/// `enifed(name)` ends a macro body.
	Enifed(String),
}

impl Display for Directive {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Start(name) => write!(f, "start({name})"),
			Self::CodeStart(name) => write!(f, "cstart({name})"),
			Self::Include { name, file: None } => write!(f, "include({name})"),
			Self::Include {
				name,
				file: Some(file),
			} => write!(f, "include({name}, {file})"),
			Self::Code => write!(f, "code"),
			Self::Edoc => write!(f, "edoc"),
			Self::End(Some(name)) => write!(f, "({name})"),
			Self::End(None) => write!(f, "end"),
			Self::Ignore => write!(f, "ignore"),
			Self::Indent(amount) => write!(f, "indent {amount}"),
			Self::If(token) => write!(f, "if({token})"),
			Self::Fi(token) => write!(f, "fi({token})"),
			Self::Define { name, value: None } => write!(f, "define({name})"),
			Self::Define {
				name,
				value: Some(value),
			} => write!(f, "define({name}, {value})"),
			Self::Enifed(name) => write!(f, "enifed({name})"),
		}
	}
}

/// Find the first directive marker in `text`.
///
/// Every occurrence of `sigil` is tried in order; occurrences that are not
/// followed by a known keyword (an e-mail address, `@decorator`, prose that
/// merely mentions a marker name) are skipped. A bare sigil counts as an
/// unnamed end marker only when it stands on its own at the end of the text.
pub fn find_directive(text: &str, sigil: char) -> Option<Directive> {
	text.match_indices(sigil).find_map(|(offset, _)| {
		let at_boundary = text[..offset]
			.chars()
			.next_back()
			.is_none_or(char::is_whitespace);
		parse_marker(&text[offset + sigil.len_utf8()..], at_boundary)
	})
}

fn parse_marker(rest: &str, at_boundary: bool) -> Option<Directive> {
	let mut lexer = MarkerToken::lexer(rest);

	match lexer.next() {
		None => at_boundary.then_some(Directive::End(None)),
		Some(Ok(MarkerToken::Whitespace)) => {
			(at_boundary && lexer.remainder().trim().is_empty()).then_some(Directive::End(None))
		}
		Some(Ok(MarkerToken::ParenOpen)) => {
			read_argument(rest, lexer.span().end).map(|name| Directive::End(Some(name)))
		}
		Some(Ok(MarkerToken::Keyword)) => {
			match lexer.slice() {
				"start" => parenthesized(&mut lexer).map(Directive::Start),
				"cstart" => parenthesized(&mut lexer).map(Directive::CodeStart),
				"include" => {
					parenthesized(&mut lexer).map(|argument| {
						let (name, file) = split_argument(argument);
						Directive::Include { name, file }
					})
				}
				"define" => {
					parenthesized(&mut lexer).map(|argument| {
						let (name, value) = split_argument(argument);
						Directive::Define { name, value }
					})
				}
				"enifed" => parenthesized(&mut lexer).map(Directive::Enifed),
				"if" => parenthesized(&mut lexer).map(Directive::If),
				"fi" => parenthesized(&mut lexer).map(Directive::Fi),
				"code" => Some(Directive::Code),
				"edoc" => Some(Directive::Edoc),
				"ignore" => Some(Directive::Ignore),
				"indent" => indent_amount(&mut lexer),
				_ => None,
			}
		}
		_ => None,
	}
}

/// Read `(argument)` directly after a keyword.
fn parenthesized(lexer: &mut Lexer<'_, MarkerToken>) -> Option<String> {
	match lexer.next() {
		Some(Ok(MarkerToken::ParenOpen)) => read_argument(lexer.source(), lexer.span().end),
		_ => None,
	}
}

/// The argument runs from `start` up to the closing parenthesis and is taken
/// literally, surrounding whitespace included. A nested `(` is rejected.
fn read_argument(source: &str, start: usize) -> Option<String> {
	let tail = &source[start..];
	let end = tail.find(['(', ')'])?;
	tail[end..]
		.starts_with(')')
		.then(|| tail[..end].to_string())
}

fn indent_amount(lexer: &mut Lexer<'_, MarkerToken>) -> Option<Directive> {
	if lexer.next() != Some(Ok(MarkerToken::Whitespace)) {
		return None;
	}

	match lexer.next() {
		Some(Ok(MarkerToken::Number)) => lexer.slice().parse().ok().map(Directive::Indent),
		_ => None,
	}
}

/// Split `name, second` at the first comma. Both parts are trimmed when a
/// comma is present; a single argument is kept literally.
fn split_argument(argument: String) -> (String, Option<String>) {
	match argument.split_once(',') {
		Some((name, second)) => (name.trim().to_string(), Some(second.trim().to_string())),
		None => (argument, None),
	}
}

/// A `subst(name)` reference inside a line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
	/// Byte range of the whole reference, sigil included.
	pub span: Range<usize>,
	/// The macro name with surrounding whitespace removed.
	pub name: String,
}

/// Find every `subst(name)` reference in `text`, in order.
///
/// Substitutions are not directives: the line they appear on stays content
/// and the references are replaced when the line is composed.
pub fn find_substitutions(text: &str, sigil: char) -> Vec<Substitution> {
	let mut found = Vec::new();
	let mut from = 0;

	while let Some(position) = text[from..].find(sigil) {
		let offset = from + position;
		let start = offset + sigil.len_utf8();
		from = start;

		let mut lexer = MarkerToken::lexer(&text[start..]);
		if lexer.next() != Some(Ok(MarkerToken::Keyword)) || lexer.slice() != "subst" {
			continue;
		}
		if lexer.next() != Some(Ok(MarkerToken::ParenOpen)) {
			continue;
		}

		let open = start + lexer.span().end;
		let Some(name) = read_argument(text, open) else {
			continue;
		};

		let end = open + name.len() + 1;
		found.push(Substitution {
			span: offset..end,
			name: name.trim().to_string(),
		});
		from = end;
	}

	found
}
