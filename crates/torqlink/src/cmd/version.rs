use clap::Args;

use crate::exit::{CliResult, SUCCESS};

#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("torqlink {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!("rustc-min {}", env!("CARGO_PKG_RUST_VERSION"));
        println!("default-port 4545");
    }
    Ok(SUCCESS)
}
