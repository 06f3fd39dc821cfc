use h4link_frame::{DEFAULT_MAX_PACKET_SIZE, DEFAULT_PRE_BUFFER_SIZE};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("h4link {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: h4link");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("H4LINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "packet_buffer: pre={} max={}",
        DEFAULT_PRE_BUFFER_SIZE, DEFAULT_MAX_PACKET_SIZE
    );
    println!("serial_driver: {}", if cfg!(unix) { "posix-tty" } else { "none" });

    Ok(SUCCESS)
}
