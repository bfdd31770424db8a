use gpuremote_peer::HandshakeConfig;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("gpuremote {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: gpuremote");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    let handshake = HandshakeConfig::default();
    println!(
        "protocol: {} {}",
        handshake.protocol_name, handshake.protocol_version
    );
    println!(
        "target: {}",
        option_env!("GPUREMOTE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: client={}, host={}, cli=true",
        cfg!(feature = "client"),
        cfg!(feature = "host")
    );

    Ok(SUCCESS)
}
