use agor_cli::{Cli, run};
use clap::Parser;

// Exit codes: 0 OK, 1 fatal error, 2 authentication failure, 64 bad usage

fn main() {
    // Reset SIGPIPE to default behavior to prevent panic on broken pipe
    // (e.g., when piping to `head` or `less` that exits early)
    #[cfg(unix)]
    reset_sigpipe();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help/version are not usage errors
            if e.use_stderr() {
                eprintln!("{e}");
                std::process::exit(64);
            }
            println!("{e}");
            std::process::exit(0);
        }
    };

    match run(cli) {
        Ok(()) => {}
        Err(e) if e.is_unauthenticated() => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}
