use std::error::Error;
use std::thread;
use std::time::Duration;

use clap::Parser;
use port_agent_client::{Callbacks, Client, Config};
use port_agent_logging::Verbosity;

/// Connects to a port agent and prints the data it relays.
#[derive(Parser, Debug)]
#[command(name = "port-agent-demo", version, about)]
struct Args {
    /// Port agent host.
    #[arg(long)]
    host: String,

    /// Data port to connect to.
    #[arg(long)]
    data_port: u16,

    /// Command port, required for `--break` and `--heartbeat-interval`.
    #[arg(long)]
    command_port: Option<u16>,

    /// Heartbeat interval in seconds (0 disables the watchdog).
    #[arg(long, default_value_t = 0)]
    heartbeat_interval: u32,

    /// Send a break condition once connected, then exit.
    #[arg(long)]
    r#break: bool,

    /// Increase log verbosity; repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let verbosity = match args.verbose {
        0 => Verbosity::Normal,
        1 => Verbosity::Verbose,
        _ => Verbosity::Debug,
    };
    let _ = port_agent_logging::init(verbosity);

    let mut builder = Config::builder(args.host, args.data_port);
    if let Some(command_port) = args.command_port {
        builder = builder.command_port(command_port);
    }
    let config = builder.build();

    let callbacks = Callbacks::new()
        .on_data(|packet| {
            println!(
                "data ({} bytes, valid={})",
                packet.payload_length(),
                packet.is_valid()
            );
        })
        .on_error(|message| eprintln!("port agent client error: {message}"));

    let client = Client::new(config, callbacks);
    client.init_comms()?;

    if args.heartbeat_interval > 0 {
        client.set_heartbeat_interval(args.heartbeat_interval, 0)?;
    }

    if args.r#break {
        client.send_break()?;
        return Ok(());
    }

    loop {
        thread::sleep(Duration::from_secs(1));
    }
}
