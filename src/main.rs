#![windows_subsystem = "windows"]

mod alert;
mod cli;
mod cmdline;
mod error;
mod job;
mod launch;
mod log;
mod random;
mod util;

fn main() {
    // The tokenization-failure exit: arguments the OS hands us that are
    // not valid Unicode cannot name an executable we could launch.
    let mut tokens = Vec::new();
    for arg in std::env::args_os() {
        match arg.into_string() {
            Ok(token) => tokens.push(token),
            Err(_) => {
                alert::tokenize_failure();
                std::process::exit(-1);
            }
        }
    }

    let invocation = cli::parse(tokens);
    log::init(invocation.debug);

    let exit_code = match invocation.command {
        cli::Command::HideCommand(request) => {
            debug_log!("launching {} with {} argument(s)", request.executable, request.args.len());
            match launch::run_hidden(&request) {
                Ok(()) => 0,
                Err(e) => {
                    debug_log!("launch failed: {}", e);
                    alert::failure(&e);
                    -4
                }
            }
        }
        cli::Command::Help => {
            alert::usage();
            -2
        }
        cli::Command::Invalid(command) => {
            alert::invalid_command(&command);
            -3
        }
    };

    std::process::exit(exit_code);
}
