use serde::Serialize;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    profile: &'static str,
    os: &'static str,
    arch: &'static str,
    git_hash: &'static str,
}

impl VersionOutput {
    fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            target: option_env!("SFU_SIGNAL_BUILD_TARGET").unwrap_or("unknown"),
            profile: option_env!("SFU_SIGNAL_BUILD_PROFILE").unwrap_or("unknown"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            git_hash: option_env!("GIT_HASH").unwrap_or("unknown"),
        }
    }
}

pub fn run(args: VersionArgs, format: OutputFormat) -> CliResult<i32> {
    let out = VersionOutput::current();
    if !args.extended {
        println!("{} {}", out.name, out.version);
        return Ok(SUCCESS);
    }

    if format == OutputFormat::Json {
        print_json(&out);
        return Ok(SUCCESS);
    }

    println!("name: {}", out.name);
    println!("version: {}", out.version);
    println!("target: {}", out.target);
    println!("profile: {}", out.profile);
    println!("target_os: {}", out.os);
    println!("target_arch: {}", out.arch);
    println!("git_hash: {}", out.git_hash);
    Ok(SUCCESS)
}
