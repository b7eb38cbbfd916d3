//! parca-operator - deploys and operates the Parca profiling server

use clap::Parser;

use parca_operator::cli::Cli;
use parca_operator::domain::ContractViolation;
use parca_operator::output::json::format_error;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    parca_operator::logging::init(cli.quiet);

    if let Err(e) = cli.run().await {
        if json {
            let code = if e.downcast_ref::<ContractViolation>().is_some() {
                "contract_violation"
            } else {
                "error"
            };
            match format_error(&format!("{e:#}"), code) {
                Ok(out) => println!("{out}"),
                Err(_) => eprintln!("Error: {e:#}"),
            }
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
