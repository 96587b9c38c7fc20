use ble_sniffer::app::{self, Options};
use clap::Parser;
use log::LevelFilter;
use std::panic::{self, PanicHookInfo};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Log to stderr so stdout stays free for piping. `RUST_LOG` overrides the
/// level chosen by `-v`/`-q`.
fn init_logging(options: &Options) {
    let level = if options.verbose {
        LevelFilter::Debug
    } else if options.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_secs()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Keep exit codes meaningful for scripts that wrap the capture
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    init_logging(&options);

    match app::run(options).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
