use clap::Args;

use crate::cmd::{await_command, connect, ConnectArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat};

#[derive(Args, Debug)]
pub struct JobArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
    /// Job id (0..=9999).
    pub id: u16,
}

pub fn run(args: JobArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, rx) = connect(&args.connection)?;

    let command_id = client
        .select_job(args.id)
        .map_err(|e| client_error("job select", e))?;
    await_command(&rx, command_id, "job select")?;

    print_state(&client.get_state(), format);
    client.disconnect();
    Ok(SUCCESS)
}
