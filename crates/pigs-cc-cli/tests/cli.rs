//! End-to-end checks of the `pcc` binary.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn pcc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pcc"))
}

fn write_temp(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pcc-cli-test-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

const HELLO: &str = r"
void main(void)
{
    p0 = 3 + 5;
}
";

#[test]
fn compiles_to_stdout() {
    let src = write_temp("hello.c", HELLO);
    let output = pcc().arg(&src).args(["-o", "-"]).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("tag _main"));
    assert!(stdout.contains("CALL _main"));
    assert!(stdout.contains("HALT"));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("variables used:"));
    assert!(stderr.contains("tags used:"));
}

#[test]
fn writes_output_file() {
    let src = write_temp("blink.c", HELLO);
    let out = write_temp("blink.s", "");
    let status = pcc()
        .arg(&src)
        .args(["-o", out.to_str().unwrap()])
        .status()
        .unwrap();
    assert!(status.success());
    let asm = fs::read_to_string(&out).unwrap();
    assert!(asm.contains("STAP 0"));
}

#[test]
fn comments_flag_adds_source_lines() {
    let src = write_temp("commented.c", HELLO);
    let output = pcc().arg(&src).args(["-o", "-", "-c"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("// p0 = 3 + 5;"));
}

#[test]
fn compile_errors_exit_nonzero() {
    let src = write_temp("broken.c", "void main(void) { oops = 1; }");
    let output = pcc().arg(&src).args(["-o", "-"]).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("undeclared"));
    assert!(stderr.contains("aborted"));
}

#[test]
fn version_flag() {
    let output = pcc().arg("-v").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout).unwrap().starts_with("pcc "));
}

#[test]
fn no_reduce_keeps_fixups() {
    let src = write_temp("fixups.c", "void main(void) { if (p0) { p1 = 1; } }");
    let reduced = pcc().arg(&src).args(["-o", "-"]).output().unwrap();
    let unreduced = pcc().arg(&src).args(["-o", "-", "-n"]).output().unwrap();
    let reduced_lines = String::from_utf8(reduced.stdout).unwrap().lines().count();
    let unreduced_lines = String::from_utf8(unreduced.stdout).unwrap().lines().count();
    assert!(unreduced_lines >= reduced_lines);
}
