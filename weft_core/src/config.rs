use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use globset::Glob;
use globset::GlobSet;
use globset::GlobSetBuilder;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::BlockDelimiter;
use crate::CommentSyntax;
use crate::DEFAULT_SIGIL;
use crate::DEFAULT_TAB_WIDTH;
use crate::Language;
use crate::LexOptions;
use crate::WeftError;
use crate::WeftResult;
use crate::builtin_languages;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["weft.toml", ".weft.toml", ".config/weft.toml"];

fn default_tab_width() -> usize {
	DEFAULT_TAB_WIDTH
}

/// Settings read from `weft.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WeftConfig {
	/// Columns a tab expands to in leading whitespace.
	#[serde(default = "default_tab_width")]
	pub tab_width: usize,
	/// Tokens that are active for `if(token)` regions on every run.
	#[serde(default)]
	pub tokens: Vec<String>,
	/// Additional or overriding languages keyed by name.
	#[serde(default)]
	pub languages: BTreeMap<String, LanguageConfig>,
}

impl Default for WeftConfig {
	fn default() -> Self {
		Self {
			tab_width: DEFAULT_TAB_WIDTH,
			tokens: Vec::new(),
			languages: BTreeMap::new(),
		}
	}
}

/// A `[languages.<name>]` table.
///
/// Omitted fields fall back to the built-in language of the same name, if
/// there is one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
	pub line: Option<Vec<String>>,
	pub block: Option<Vec<BlockDelimiter>>,
	pub sigil: Option<char>,
}

impl LanguageConfig {
	fn into_language(self, name: &str, base: Option<&Language>) -> Language {
		let fallback = base.map(|language| language.syntax.clone());
		let syntax = CommentSyntax {
			line: self
				.line
				.or_else(|| fallback.as_ref().map(|syntax| syntax.line.clone()))
				.unwrap_or_default(),
			block: self
				.block
				.or_else(|| fallback.as_ref().map(|syntax| syntax.block.clone()))
				.unwrap_or_default(),
			sigil: self
				.sigil
				.or_else(|| fallback.as_ref().map(|syntax| syntax.sigil))
				.unwrap_or(DEFAULT_SIGIL),
		};
		let patterns = if self.patterns.is_empty() {
			base.map(|language| language.patterns.clone())
				.unwrap_or_default()
		} else {
			self.patterns
		};

		Language::new(name, patterns, syntax)
	}
}

impl WeftConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if no config file exists.
	pub fn load(root: &Path) -> WeftResult<Option<WeftConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		Self::from_path(&config_path).map(Some)
	}

	/// Load the config from an explicit file.
	pub fn from_path(path: &Path) -> WeftResult<WeftConfig> {
		debug!(path = %path.display(), "loading config");
		let content = std::fs::read_to_string(path)?;
		Self::parse(&content)
	}

	pub fn parse(content: &str) -> WeftResult<WeftConfig> {
		toml::from_str(content).map_err(|e| WeftError::ConfigParse(e.to_string()))
	}

	/// Lexer options with the configured tab width and tokens.
	pub fn lex_options(&self) -> LexOptions {
		LexOptions::default()
			.with_tab_width(self.tab_width)
			.with_tokens(self.tokens.iter().cloned())
	}

	/// Built-in languages merged with the configured ones.
	pub fn registry(&self) -> WeftResult<LanguageRegistry> {
		let mut languages = builtin_languages();

		for (name, config) in &self.languages {
			let position = languages.iter().position(|language| language.name == *name);
			let language = config
				.clone()
				.into_language(name, position.map(|index| &languages[index]));

			match position {
				Some(index) => languages[index] = language,
				None => languages.push(language),
			}
		}

		LanguageRegistry::new(languages)
	}
}

/// Maps file paths and names to comment syntaxes.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
	languages: Vec<Language>,
	matchers: Vec<GlobSet>,
}

impl LanguageRegistry {
	pub fn new(languages: Vec<Language>) -> WeftResult<Self> {
		let matchers = languages
			.iter()
			.map(|language| build_glob_set(&language.patterns))
			.collect::<WeftResult<_>>()?;

		Ok(Self {
			languages,
			matchers,
		})
	}

	/// Registry with only the built-in languages.
	pub fn builtin() -> WeftResult<Self> {
		Self::new(builtin_languages())
	}

	pub fn languages(&self) -> &[Language] {
		&self.languages
	}

	pub fn by_name(&self, name: &str) -> Option<&Language> {
		self.languages.iter().find(|language| language.name == name)
	}

	/// The language whose patterns match `path`. Languages added by
	/// configuration are consulted before the built-in ones.
	pub fn for_path(&self, path: &Path) -> Option<&Language> {
		let file_name = path.file_name().map(Path::new);

		self.languages
			.iter()
			.zip(&self.matchers)
			.rev()
			.find(|(_, matcher)| {
				matcher.is_match(path) || file_name.is_some_and(|name| matcher.is_match(name))
			})
			.map(|(language, _)| language)
	}

	/// Pick a language by explicit name, falling back to the path.
	pub fn select(&self, name: Option<&str>, path: &Path) -> WeftResult<&Language> {
		match name {
			Some(name) => {
				self.by_name(name)
					.ok_or_else(|| WeftError::UnknownLanguage(name.to_string()))
			}
			None => {
				self.for_path(path)
					.ok_or_else(|| WeftError::UnknownLanguage(path.display().to_string()))
			}
		}
	}
}

fn build_glob_set(patterns: &[String]) -> WeftResult<GlobSet> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| {
			WeftError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.kind().to_string(),
			}
		})?;
		builder.add(glob);
	}

	builder.build().map_err(|e| {
		WeftError::InvalidPattern {
			pattern: patterns.join(", "),
			reason: e.to_string(),
		}
	})
}
