use clap::{Parser, Subcommand};
use std::path::PathBuf;

use screen_recorder::capture::{format_elapsed, CaptureController};
use screen_recorder::client::{RecorderClient, UploadStatus};
use screen_recorder::config::ServerConfig;
use screen_recorder::constants::MAX_RECORDING_SECONDS;
use screen_recorder::serve;
use screen_recorder::source::{CaptureInput, ReaderSource};

const DEFAULT_SERVER: &str = "http://localhost:5000";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Record screen captures, upload them, and serve them back"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the recordings HTTP server
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Port to listen on (overrides config file and PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Record from a capture stream until Ctrl-C, end of input, or the time limit
    Record {
        /// Capture input file or pipe, "-" for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Save the finished recording to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Upload the finished recording
        #[arg(long)]
        upload: bool,

        /// Recordings server URL
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Upload an existing recording file
    Upload {
        file: PathBuf,

        /// Recordings server URL
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// List uploaded recordings, newest first
    List {
        /// Recordings server URL
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Download one recording by id
    Fetch {
        id: i64,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// Recordings server URL
        #[arg(short, long, default_value = DEFAULT_SERVER)]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match args.command {
        Command::Serve { config, port } => run_serve(config, port).await,
        Command::Record {
            input,
            output,
            upload,
            server,
        } => run_record(input, output, upload, server).await,
        Command::Upload { file, server } => {
            let client = RecorderClient::new(&server)?;
            let result = client.upload_file(&file).await;
            println!("{}", UploadStatus::from_result(&result).message());
            let response = result?;
            println!(
                "Recording {}: {} ({} bytes, {})",
                response.recording.id,
                response.recording.filename,
                response.recording.filesize,
                response.recording.created_at
            );
            Ok(())
        }
        Command::List { server } => {
            let client = RecorderClient::new(&server)?;
            let recordings = client.list().await?;
            if recordings.is_empty() {
                println!("No recordings found.");
            }
            for entry in recordings {
                println!(
                    "{:>6}  {:<20} {:>12} bytes  {}  {}",
                    entry.recording.id,
                    entry.recording.filename,
                    entry.recording.filesize,
                    entry.recording.created_at,
                    entry.url
                );
            }
            Ok(())
        }
        Command::Fetch { id, output, server } => {
            let client = RecorderClient::new(&server)?;
            let bytes = client.fetch(id).await?;
            tokio::fs::write(&output, &bytes).await?;
            println!("Saved {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
    }
}

async fn run_serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &config_path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    if let Ok(env_port) = std::env::var("PORT") {
        config.port = env_port
            .parse()
            .map_err(|e| format!("Invalid PORT '{}': {}", env_port, e))?;
    }
    if let Some(port) = port {
        config.port = port;
    }

    serve::serve(config).await.map_err(|e| e as Box<dyn std::error::Error>)
}

async fn run_record(
    input: String,
    output: Option<PathBuf>,
    upload: bool,
    server: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let input = if input == "-" {
        CaptureInput::Stdin
    } else {
        CaptureInput::File(PathBuf::from(input))
    };

    let mut controller = CaptureController::new(ReaderSource::new(input));
    if let Err(e) = controller.start() {
        return Err(format!("Could not start recording: {}", e).into());
    }
    println!(
        "Recording (limit {}), press Ctrl-C to stop",
        format_elapsed(MAX_RECORDING_SECONDS)
    );

    let mut shown = 0;
    while controller.is_recording() {
        tokio::select! {
            event = controller.next_event() => match event {
                Some(event) => controller.apply(event),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                controller.stop();
            }
        }
        if controller.is_recording() && controller.elapsed_secs() != shown {
            shown = controller.elapsed_secs();
            eprint!("\r{}", format_elapsed(shown));
        }
    }
    eprintln!();

    let recording = controller
        .finalized()
        .cloned()
        .ok_or("Recording produced no output")?;
    println!(
        "Recorded {} ({} bytes)",
        format_elapsed(recording.duration_secs()),
        recording.len()
    );

    if let Some(path) = output {
        recording.save_to(&path).await?;
        println!("Saved to {}", path.display());
    }

    if upload {
        let client = RecorderClient::new(&server)?;
        let result = client.upload(Some(&recording)).await;
        println!("{}", UploadStatus::from_result(&result).message());
        if let Ok(Some(response)) = result {
            println!("Recording id: {}", response.recording.id);
        }
    }

    Ok(())
}
