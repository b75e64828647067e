use mxbridge_codec::ValueType;
use mxbridge_wire::{PROTOCOL_NAME, PROTOCOL_VERSION};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("mxbridge {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: mxbridge");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("protocol: {PROTOCOL_NAME} v{PROTOCOL_VERSION}");
    let tags: Vec<String> = ValueType::ALL
        .iter()
        .map(|vt| format!("{}={}", vt.name(), vt.code()))
        .collect();
    println!("value_types: {}", tags.join(", "));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "build_target: {}",
        option_env!("MXBRIDGE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));

    Ok(SUCCESS)
}
