use clap::Args;

use crate::cmd::{await_command, connect, ConnectArgs, ToolAction};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_state, OutputFormat};

#[derive(Args, Debug)]
pub struct ToolArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
    /// What to do with the tool.
    #[arg(value_enum)]
    pub action: ToolAction,
}

pub fn run(args: ToolArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, rx) = connect(&args.connection)?;

    let (command_id, context) = match args.action {
        ToolAction::Enable => (
            client.enable_tool().map_err(|e| client_error("enable", e))?,
            "enable tool",
        ),
        ToolAction::Disable => (
            client
                .disable_tool()
                .map_err(|e| client_error("disable", e))?,
            "disable tool",
        ),
        // The start path runs the full interlock gate; a violation
        // surfaces here before anything hits the wire.
        ToolAction::Start => (
            client
                .start_tightening()
                .map_err(|e| client_error("start", e))?,
            "start tightening",
        ),
    };

    await_command(&rx, command_id, context)?;
    print_state(&client.get_state(), format);
    client.disconnect();
    Ok(SUCCESS)
}
