use std::{
    error::Error,
    io::{self, Write},
    time::Duration,
};

use clap::Parser;
use kino::{
    Command, ContentType, QueryClient,
    cli::{CliError, print_instructions, prompt, request_content},
    config::DEFAULT_ADDRESS,
    protocol::TransportOptions,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server address
    #[arg(env = "KINO_ADDRESS", default_value = DEFAULT_ADDRESS)]
    address: String,
    /// Content type of requests: text, json or binary
    #[arg(long, default_value = "text")]
    content_type: String,
    /// Encoding of requests: utf-8 or ascii
    #[arg(long, default_value = "utf-8")]
    encoding: String,
    /// Send a single request and exit
    #[arg(long)]
    request: Option<String>,
    /// Give up on a server that stalls a read phase for this many milliseconds
    #[arg(long, env = "KINO_PHASE_TIMEOUT_MS")]
    phase_timeout_ms: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let content_type: ContentType = cli.content_type.parse()?;
    let options = TransportOptions {
        phase_timeout: cli.phase_timeout_ms.map(Duration::from_millis),
        ..Default::default()
    };
    let client = QueryClient::with_options(cli.address, options);
    let mut stdout = io::stdout().lock();

    if let Some(request) = cli.request {
        return send(&client, &request, &content_type, &cli.encoding, &mut stdout);
    }

    print_instructions(&mut stdout)?;
    let stdin = io::stdin();

    loop {
        let line = match prompt(stdin.lock(), &mut stdout) {
            Ok(Command::Exit) => break,
            Ok(Command::Request(line)) => line,
            Err(CliError::Io(e)) => return Err(e.into()),
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        if let Err(e) = send(&client, &line, &content_type, &cli.encoding, &mut stdout) {
            eprintln!("error: {e}");
        }
    }

    Ok(())
}

fn send<W: Write>(
    client: &QueryClient,
    line: &str,
    content_type: &ContentType,
    encoding: &str,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    let content = request_content(line, content_type)?;
    let (header, answer) = client.exchange(&content, content_type, encoding)?;

    writeln!(out, "header: {}", serde_json::to_string(&header)?)?;
    writeln!(out, "answer: {answer}")?;
    Ok(())
}
