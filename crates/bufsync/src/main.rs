//
// main.rs
//
// Command-line entry point
//

use std::env;
use std::path::PathBuf;

use bufsync::cli::replay::{self, ReplayArgs};

fn print_usage() {
    println!(
        "bufsync {}, editor buffer synchronization for language servers.",
        env!("CARGO_PKG_VERSION")
    );
    print!(
        r#"
Usage: bufsync [OPTIONS]

Available options:

--replay <file>              Replay editor events (JSON lines) and print the
                             resulting analysis server notifications
--settings <file>            Bridge settings (JSON) used for the replay
--structure                  After the replay, print each document's parsed structure
--version                    Print the version
--help                       Print this help message

"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut argv = env::args();
    argv.next(); // skip executable name

    let mut events: Option<PathBuf> = None;
    let mut settings: Option<PathBuf> = None;
    let mut structure = false;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--replay" => {
                let path = argv
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--replay requires a file"))?;
                events = Some(PathBuf::from(path));
            }
            "--settings" => {
                let path = argv
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--settings requires a file"))?;
                settings = Some(PathBuf::from(path));
            }
            "--structure" => structure = true,
            "--version" => {
                println!("bufsync {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_usage();
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("Unknown argument: '{other}'"));
            }
        }
    }

    let Some(events) = events else {
        print_usage();
        return Ok(());
    };

    env_logger::init();

    replay::run(ReplayArgs {
        events,
        settings,
        structure,
    })
    .await
}
