use clap::Parser;

fn main() {
    let cli = teralinkctl::Cli::parse();
    teralinkctl::init_tracing();
    if let Err(err) = teralinkctl::run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
