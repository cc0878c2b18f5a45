use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use torqlink_client::Event;

use crate::cmd::{connect, ConnectArgs};
use crate::exit::{CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_event, print_state, OutputFormat};

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub connection: ConnectArgs,
    /// Exit after printing N events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Include state-changed events (noisy).
    #[arg(long)]
    pub state: bool,
}

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let (client, rx) = connect(&args.connection)?;

    print_state(&client.get_state(), format);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let event = match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        if matches!(event, Event::StateChanged { .. }) && !args.state {
            continue;
        }

        print_event(&event, format);
        printed = printed.saturating_add(1);

        if matches!(event, Event::Disconnected) {
            break;
        }
        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    client.disconnect();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
