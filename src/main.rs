mod cli;

use clap::Parser;
use cli::Cli;

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = cmin::driver::run(&cli.bits, &cli.input, cli.output.as_deref()) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
