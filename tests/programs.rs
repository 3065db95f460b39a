//! Assembles generated programs with the system C compiler and checks the
//! exit status `main` returns.
#![cfg(all(target_arch = "x86_64", target_os = "linux"))]

use std::fs;
use std::process::Command;
use tempfile::TempDir;

const HELPERS: &str = r#"
long ret3(void) { return 3; }
long ret5(void) { return 5; }
long add(long a, long b) { return a + b; }
long sub(long a, long b) { return a - b; }
long add6(long a, long b, long c, long d, long e, long f) {
  return a + b + c + d + e + f;
}
"#;

fn have_cc() -> bool {
    Command::new("cc")
        .arg("--version")
        .output()
        .is_ok_and(|out| out.status.success())
}

fn run(src: &str) -> Option<i32> {
    if !have_cc() {
        eprintln!("skipping: no C compiler to assemble with");
        return None;
    }
    let asm = minicc::compile(src).unwrap();
    let dir = TempDir::new().unwrap();
    let asm_path = dir.path().join("prog.s");
    let helpers_path = dir.path().join("helpers.c");
    let exe = dir.path().join("prog");
    fs::write(&asm_path, asm).unwrap();
    fs::write(&helpers_path, HELPERS).unwrap();

    let status = Command::new("cc")
        .arg("-o")
        .arg(&exe)
        .arg(&asm_path)
        .arg(&helpers_path)
        .status()
        .unwrap();
    assert!(status.success(), "cc failed for {}", src);

    Some(Command::new(&exe).status().unwrap().code().unwrap())
}

fn assert_returns(expected: i32, src: &str) {
    if let Some(code) = run(src) {
        assert_eq!(code, expected, "{}", src);
    }
}

#[test]
fn arithmetic() {
    assert_returns(0, "{ return 0; }");
    assert_returns(42, "{ return 42; }");
    assert_returns(21, "{ return 5+20-4; }");
    assert_returns(41, "{ return  12 + 34 - 5 ; }");
    assert_returns(47, "{ return 5+6*7; }");
    assert_returns(15, "{ return 5*(9-6); }");
    assert_returns(4, "{ return (3+5)/2; }");
    assert_returns(10, "{ return -10+20; }");
    assert_returns(10, "{ return - -10; }");
    assert_returns(10, "{ return - - +10; }");
    assert_returns(2, "{ return 20-10-8; }");
    assert_returns(7, "{ return (0-7)/2 + 10; }");
    assert_returns(21, "{ return 1+(2+(3+(4+(5+6)))); }");
}

#[test]
fn comparisons() {
    assert_returns(0, "{ return 0==1; }");
    assert_returns(1, "{ return 42==42; }");
    assert_returns(1, "{ return 0!=1; }");
    assert_returns(0, "{ return 42!=42; }");
    assert_returns(1, "{ return 0<1; }");
    assert_returns(0, "{ return 1<1; }");
    assert_returns(0, "{ return 2<1; }");
    assert_returns(1, "{ return 0<=1; }");
    assert_returns(1, "{ return 1<=1; }");
    assert_returns(0, "{ return 2<=1; }");
    assert_returns(1, "{ return 1>0; }");
    assert_returns(0, "{ return 1>1; }");
    assert_returns(0, "{ return 1>2; }");
    assert_returns(1, "{ return 1>=0; }");
    assert_returns(1, "{ return 1>=1; }");
    assert_returns(0, "{ return 1>=2; }");
}

#[test]
fn variables() {
    assert_returns(3, "{ a=3; return a; }");
    assert_returns(8, "{ a=3; z=5; return a+z; }");
    assert_returns(6, "{ a=b=3; return a+b; }");
    assert_returns(8, "{ foo=3; bar=5; return foo+bar; }");
    assert_returns(13, "{ x = 3; y = 5; return x + y * 2; }");
}

#[test]
fn statements() {
    assert_returns(1, "{ return 1; 2; 3; }");
    assert_returns(3, "{ {1; {2;} return 3;} }");
    assert_returns(5, "{ ;;; return 5; }");
}

#[test]
fn if_else() {
    assert_returns(3, "{ if (0) return 2; return 3; }");
    assert_returns(3, "{ if (1-1) return 2; return 3; }");
    assert_returns(2, "{ if (1) return 2; return 3; }");
    assert_returns(4, "{ if (0) { 1; 2; return 3; } else { return 4; } }");
    assert_returns(2, "{ x = 0; if (0) x = 1; else x = 2; return x; }");
    assert_returns(1, "{ x = 0; if (1) x = 1; else x = 2; return x; }");
}

#[test]
fn loops() {
    assert_returns(55, "{ i=0; j=0; for (i=0; i<=10; i=i+1) j=i+j; return j; }");
    assert_returns(32, "{ a = 1; for (i = 0; i < 5; i = i + 1) a = a * 2; return a; }");
    assert_returns(3, "{ for (;;) return 3; return 5; }");
    assert_returns(10, "{ i=0; while(i<10) i=i+1; return i; }");
    assert_returns(10, "{ i=0; for (;i<10;) i=i+1; return i; }");
    assert_returns(7, "{ i=0; for (;;) { i=i+1; if (i==7) return i; } }");
}

#[test]
fn pointers() {
    assert_returns(3, "{ x=3; return *&x; }");
    assert_returns(3, "{ x=3; y=&x; z=&y; return **z; }");
    assert_returns(5, "{ x=3; y=&x; *y=5; return x; }");
}

#[test]
fn calls() {
    assert_returns(3, "{ return ret3(); }");
    assert_returns(5, "{ return ret5(); }");
    assert_returns(8, "{ return add(3, 5); }");
    assert_returns(2, "{ return sub(5, 3); }");
    assert_returns(21, "{ return add6(1,2,3,4,5,6); }");
    assert_returns(10, "{ return add(1, add(2, add(3, 4))); }");
    assert_returns(20, "{ return 1 + 2 * add(3, 4) + 5; }");
    assert_returns(1, "{ a = 3; b = 4; return add(a*a, b*b) - 24; }");
}
