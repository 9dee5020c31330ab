mod cli;
mod paths;
mod run;
mod settings;
mod simulate;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
