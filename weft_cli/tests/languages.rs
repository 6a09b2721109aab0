mod common;

use predicates::prelude::PredicateBooleanExt;
use weft_core::AnyEmptyResult;

#[test]
fn languages_lists_builtin_syntaxes() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::weft_cmd(tmp.path())
		.arg("languages")
		.assert()
		.success()
		.stdout(
			predicates::str::contains("rust")
				.and(predicates::str::contains("*.rs"))
				.and(predicates::str::contains("*.py *.pyw")),
		);

	Ok(())
}

#[test]
fn languages_include_configured_ones() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::write(
		tmp.path().join(".config/weft.toml"),
		"[languages.nix]\npatterns = [\"*.nix\"]\nline = [\"#\"]\n",
	)?;

	common::weft_cmd(tmp.path())
		.arg("languages")
		.assert()
		.success()
		.stdout(predicates::str::contains("nix").and(predicates::str::contains("*.nix")));

	Ok(())
}

#[test]
fn no_subcommand_prints_a_hint() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	common::weft_cmd(tmp.path())
		.assert()
		.code(1)
		.stderr(predicates::str::contains("Run `weft --help` for usage."));

	Ok(())
}
