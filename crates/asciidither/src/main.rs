mod bootstrap;
mod cli;
mod control;
mod paths;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let args = cli::parse();
    run::run(args)
}
