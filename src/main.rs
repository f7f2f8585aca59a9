use colored::Colorize;
use schema_forge::cli::CommandLineInterface;

fn main() {
    let cli = CommandLineInterface::load();
    let level = if cli.verbose() { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(error) = cli.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
