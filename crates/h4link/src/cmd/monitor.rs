use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::cmd::{open_line, MonitorArgs};
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let (mut transport, queue) = open_line(&args.line)?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        transport
            .poll()
            .map_err(|err| transport_error("receive failed", err))?;

        while let Some(packet) = queue.pop() {
            print_packet(&packet, format);
            printed = printed.saturating_add(1);

            if args.count.is_some_and(|count| printed >= count) {
                let _ = transport.close();
                return Ok(SUCCESS);
            }
        }
    }

    info!(printed, "monitor interrupted");
    transport
        .close()
        .map_err(|err| transport_error("close failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
