// venv-wrapper - main entry point
use clap::Parser;
use std::process;
use venv_wrapper::cli::Cli;

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.run() {
        Ok(code) => code,
        Err(e) => {
            let use_colors = cli.log_config().should_use_colors();
            eprintln!("{}", e.user_message(use_colors));
            e.exit_code()
        }
    };

    process::exit(exit_code);
}
