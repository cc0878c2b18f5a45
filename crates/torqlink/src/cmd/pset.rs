use clap::Args;

use crate::cmd::{await_command, connect, ConnectArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat};

#[derive(Args, Debug)]
pub struct PsetArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
    /// Parameter set id (0..=999).
    pub id: u16,
}

pub fn run(args: PsetArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, rx) = connect(&args.connection)?;

    let command_id = client
        .select_parameter_set(args.id)
        .map_err(|e| client_error("parameter set select", e))?;
    await_command(&rx, command_id, "parameter set select")?;

    print_state(&client.get_state(), format);
    client.disconnect();
    Ok(SUCCESS)
}
