pub mod cli;
pub mod logging;

use colored::Colorize;

fn main() {
    let command_line_interface = cli::CommandLineInterface::load();
    logging::init_logging(command_line_interface.verbose);
    if let Err(error) = command_line_interface.run() {
        eprintln!("{} {error:#}", "error:".red().bold());
        std::process::exit(1);
    }
}
