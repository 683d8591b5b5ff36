//! Behaviour tests for the `pdx` CLI.
#![cfg(all(feature = "cli", feature = "onnx"))]

use assert_cmd::Command;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::cell::RefCell;
use std::process::Output;

#[derive(Default)]
struct CliContext {
    output: RefCell<Option<Output>>,
}

#[fixture]
fn cli_context() -> CliContext {
    CliContext::default()
}

#[given("the pdx binary")]
fn given_binary(#[from(cli_context)] ctx: &CliContext) {
    let _ = ctx;
}

#[when("running with \"{args}\"")]
#[expect(
    clippy::needless_pass_by_value,
    reason = "BDD macro injects owned value"
)]
#[expect(clippy::expect_used, reason = "tests should fail loudly")]
fn when_running(args: String, #[from(cli_context)] ctx: &CliContext) {
    let output = Command::cargo_bin("pdx")
        .unwrap_or_else(|e| panic!("failed to locate pdx binary: {e}"))
        .args(args.split_whitespace())
        .write_stdin("")
        .output()
        .expect("failed to run pdx");
    *ctx.output.borrow_mut() = Some(output);
}

#[then("it exits with an error")]
#[expect(clippy::expect_used, reason = "tests should fail loudly")]
fn then_error(#[from(cli_context)] ctx: &CliContext) {
    let status = ctx.output.borrow().as_ref().expect("missing output").status;
    assert!(!status.success());
}

#[then("stderr mentions \"{text}\"")]
#[expect(
    clippy::needless_pass_by_value,
    reason = "BDD macro injects owned value"
)]
#[expect(clippy::expect_used, reason = "tests should fail loudly")]
fn then_stderr(text: String, #[from(cli_context)] ctx: &CliContext) {
    let binding = ctx.output.borrow();
    let output = binding.as_ref().expect("missing output");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&text), "stderr did not mention {text}: {stderr}");
}

#[scenario(path = "tests/features/pdx_cli.feature", index = 0)]
fn missing_settings(cli_context: CliContext) {
    let _ = cli_context;
}

#[scenario(path = "tests/features/pdx_cli.feature", index = 1)]
fn missing_model(cli_context: CliContext) {
    let _ = cli_context;
}

#[scenario(path = "tests/features/pdx_cli.feature", index = 2)]
fn tampered_tokenizer(cli_context: CliContext) {
    let _ = cli_context;
}

#[scenario(path = "tests/features/pdx_cli.feature", index = 3)]
fn invalid_padding(cli_context: CliContext) {
    let _ = cli_context;
}

#[scenario(path = "tests/features/pdx_cli.feature", index = 4)]
fn invalid_flag(cli_context: CliContext) {
    let _ = cli_context;
}
