use clap::Args;

use crate::cmd::{await_command, connect, BatchAction, ConnectArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat};

#[derive(Args, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
    /// Batch maintenance action.
    #[arg(value_enum)]
    pub action: BatchAction,
}

pub fn run(args: BatchArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, rx) = connect(&args.connection)?;

    let (command_id, context) = match args.action {
        BatchAction::Reset => (
            client
                .reset_batch()
                .map_err(|e| client_error("batch reset", e))?,
            "batch reset",
        ),
        BatchAction::Decrement => (
            client
                .decrement_batch()
                .map_err(|e| client_error("batch decrement", e))?,
            "batch decrement",
        ),
    };

    await_command(&rx, command_id, context)?;
    print_state(&client.get_state(), format);
    client.disconnect();
    Ok(SUCCESS)
}
