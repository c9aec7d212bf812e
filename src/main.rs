use touchscreen_harness::cli;
use touchscreen_harness::error::Error;
use touchscreen_harness::logger;

fn main() -> Result<(), Error> {
    let args = match cli::parse_from(std::env::args_os()) {
        Err(Error::Cli(error)) => error.exit(),
        args => args?,
    };
    logger::init(args.log_level).map_err(|error| Error::Usage(error.to_string()))?;
    cli::run(args.command, std::io::stdout())
}
