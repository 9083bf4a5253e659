use std::process::ExitCode;

use clap::Parser;

use gdrive_fetch::*;

fn main() -> ExitCode {
    env_logger::init();
    let args = Cli::parse();
    match handle_download(&args) {
        Ok(saved) => {
            println!("\n{}", saved_message(&saved));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
