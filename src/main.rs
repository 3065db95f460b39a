use minicc::{compile, CompileError};
use std::env;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let err = CompileError::Invocation {
            program: args.first().cloned().unwrap_or_else(|| "minicc".to_string()),
        };
        eprint!("{}", err.render(""));
        return ExitCode::FAILURE;
    }

    let src = &args[1];
    match compile(src) {
        Ok(asm) => {
            print!("{}", asm);
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::debug!("compilation failed: {:?}", err);
            eprint!("{}", err.render(src));
            ExitCode::FAILURE
        }
    }
}
