//! ShardFS CLI Client
//!
//! Command-line interface for talking to a ShardFS coordinator.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use shardfs::client::{Client, Retrieved};

/// ShardFS CLI
#[derive(Parser, Debug)]
#[command(name = "shardfs-cli")]
#[command(about = "CLI for the ShardFS sharded file store")]
#[command(version)]
struct Args {
    /// Coordinator address
    #[arg(short, long, default_value = "127.0.0.1:12345")]
    server: String,

    /// Connect and read/write timeout in milliseconds (0 = none)
    #[arg(short, long, default_value = "0")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload a file
    Put {
        /// Local file to upload
        path: PathBuf,

        /// Name to store it under (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Download a file
    Get {
        /// Stored file name
        name: String,

        /// Where to write it (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the coordinator's files
    Ls,

    /// Delete a file everywhere
    Rm {
        /// Stored file name
        name: String,
    },
}

fn main() {
    let args = Args::parse();

    let mut client = Client::new(&args.server);
    if args.timeout_ms > 0 {
        client = client.with_timeout(Duration::from_millis(args.timeout_ms));
    }

    if let Err(e) = run(&client, args.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(client: &Client, command: Commands) -> shardfs::Result<()> {
    match command {
        Commands::Put { path, name } => {
            let ack = client.put_file(&path, name.as_deref())?;
            println!("{}", ack);
        }
        Commands::Get { name, output } => match client.get(&name)? {
            Retrieved::Found(data) => match output {
                Some(path) => {
                    File::create(&path)?.write_all(&data)?;
                    eprintln!("{} bytes written to {}", data.len(), path.display());
                }
                None => io::stdout().lock().write_all(&data)?,
            },
            Retrieved::Missing(message) => {
                eprintln!("{}", message);
                std::process::exit(2);
            }
        },
        Commands::Ls => {
            let names = client.list()?;
            println!("{} file(s)", names.len());
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Rm { name } => {
            for line in client.remove(&name)? {
                println!("{}", line);
            }
        }
    }
    Ok(())
}
