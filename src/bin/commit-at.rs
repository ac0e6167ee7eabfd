use actimate::cli::{CommitAtCli, init_logging};
use actimate::git::{CommitRequest, SystemCommandExecutor, commit_with_date};
use clap::Parser;
use owo_colors::OwoColorize;
use std::process;

fn main() {
    let cli = CommitAtCli::parse();
    init_logging(false, cli.verbose);

    let request = CommitRequest::from(cli);
    match commit_with_date(&SystemCommandExecutor::new(), &request) {
        Ok(()) => {
            println!(
                "{} committed at {}",
                "✓".green(),
                request.date.trim().bold()
            );
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            process::exit(e.exit_code());
        }
    }
}
