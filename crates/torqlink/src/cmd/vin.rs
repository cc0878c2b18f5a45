use clap::Args;

use crate::cmd::{await_command, connect, ConnectArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat};

#[derive(Args, Debug)]
pub struct VinArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
    /// Vehicle identification number, up to 25 ASCII characters.
    pub vin: String,
}

pub fn run(args: VinArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, rx) = connect(&args.connection)?;

    let command_id = client
        .download_vin(&args.vin)
        .map_err(|e| client_error("vin download", e))?;
    await_command(&rx, command_id, "vin download")?;

    print_state(&client.get_state(), format);
    client.disconnect();
    Ok(SUCCESS)
}
