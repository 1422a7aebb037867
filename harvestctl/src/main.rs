use clap::Parser;

fn main() {
    let cli = harvestctl::Cli::parse();
    harvestctl::init_tracing(cli.verbose);
    if let Err(err) = harvestctl::run(cli) {
        eprintln!("error [{}]: {err}", err.code());
        std::process::exit(1);
    }
}
