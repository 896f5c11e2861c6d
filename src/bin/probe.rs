//! probe - print a container's native resolution and estimated frame rate
//!
//! Output is a single line: `<height> <width> <fps>`.

use anyhow::Result;
use clap::Parser;

use framesync::SampledFrameSource;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file to probe.
    path: String,
    /// Sampling rate used while probing; 0 reads every frame.
    #[arg(long, default_value_t = 0)]
    sfps: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let info = SampledFrameSource::probe(&args.path, args.sfps)?;
    println!("{} {} {}", info.height, info.width, info.fps);
    Ok(())
}
