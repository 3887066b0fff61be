// LayoutLink - Layout and audio routing control client
use clap::Parser;
use layoutlink::cli::output::{ConsoleWriter, OutputWriter};
use layoutlink::cli::{execute_command, Args};
use layoutlink::LayoutLinkError;

#[tokio::main]
async fn main() -> Result<(), LayoutLinkError> {
    let args = Args::parse();
    let errors = ConsoleWriter::new(args.format, false);

    if let Err(e) = execute_command(args).await {
        errors.write_error(&e.to_string())?;
        std::process::exit(1);
    }
    Ok(())
}
