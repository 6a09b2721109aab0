use crate::*;

/// A C file documenting a function, with a named block included from the
/// anonymous block.
pub const LITERATE_C: &str = r"// Adding numbers
// ================
//
// The whole library is one function:
//
//     @include(add)
//
// @()

// @start(add)
// Add two integers.
// @code
int add(int a, int b) {
	return a + b;
}
// @edoc
// @(add)
";

/// A Python module that uses docstrings for its documentation.
pub const LITERATE_PYTHON: &str = r#""""
Module docs.
@code
"""
def one():
    return 1
"""
@edoc
Done.
"""
"#;

/// Lex a single source into tokens, stopping at the first error.
pub fn lex(source: &str, syntax: &CommentSyntax, options: &LexOptions) -> WeftResult<Vec<Token>> {
	Lexer::new("test", source, syntax, options).collect()
}

/// The kinds of all tokens, dropping line numbers.
pub fn kinds(tokens: Vec<Token>) -> Vec<TokenKind> {
	tokens.into_iter().map(|token| token.kind).collect()
}

pub fn doc(text: &str) -> TokenKind {
	TokenKind::Content {
		text: text.to_string(),
		mode: Mode::Documentation,
	}
}

pub fn code(text: &str) -> TokenKind {
	TokenKind::Content {
		text: text.to_string(),
		mode: Mode::Code,
	}
}

pub fn include(name: &str, file: Option<&str>) -> Directive {
	Directive::Include {
		name: name.to_string(),
		file: file.map(str::to_string),
	}
}

pub fn marker(directive: Directive, indent: usize) -> TokenKind {
	TokenKind::Marker { directive, indent }
}

/// Build a pass from a single file.
pub fn pass_of(source: &str, syntax: &CommentSyntax) -> WeftResult<Pass> {
	pass_with(&[("main", source, syntax.clone())], &LexOptions::default())
}

/// Build a pass from several files sharing one namespace.
pub fn pass_with(files: &[(&str, &str, CommentSyntax)], options: &LexOptions) -> WeftResult<Pass> {
	let mut pass = Pass::new();
	for (name, source, syntax) in files {
		pass.add_source(*name, source, syntax, options)?;
	}
	Ok(pass)
}

/// The text of composed lines.
pub fn texts(lines: &[OutputLine]) -> Vec<&str> {
	lines.iter().map(|line| line.text.as_str()).collect()
}

/// The structural issue carried by `error`, panicking for other errors.
pub fn structural_issue(error: WeftError) -> StructuralIssue {
	match error {
		WeftError::Structural { issue, .. } => issue,
		other => panic!("expected a structural error, got: {other}"),
	}
}
