mod cli;
mod cpu_kernel;
mod rng;
mod scene;
mod sink;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let verbose = args.iter().any(|a| a == "--verbose");
    env_logger::Builder::from_default_env()
        .filter_level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let args: Vec<String> = args.into_iter().filter(|a| a != "--verbose").collect();
    let options = cli::DemoOptions::parse(&args)?;
    cli::run(options)
}
