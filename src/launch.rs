use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use exitcode::ExitCode;
use sflow::config::Config;
use sflow::datagram::Datagram;
use sflow::{listen, trace};
use tracing::{error, info};

#[derive(FromArgs)]
#[argh(
    description = "Decode sFlow v5 datagrams into JSON",
    help_triggers("-h", "--help")
)]
pub struct RootCommand {
    #[argh(switch, short = 'v', description = "show version")]
    version: bool,

    #[argh(
        option,
        short = 'l',
        default = "\"info\".to_string()",
        description = "log level"
    )]
    log_level: String,

    #[argh(switch, description = "emit logs as JSON")]
    log_json: bool,

    #[argh(subcommand)]
    sub_commands: Option<SubCommands>,
}

impl RootCommand {
    #![allow(clippy::print_stdout)]
    fn show_version(&self) {
        println!("sflow {}", env!("CARGO_PKG_VERSION"));
    }

    fn init_trace(&self) {
        let levels = std::env::var("SFLOW_LOG").unwrap_or_else(|_| match self.log_level.as_str() {
            "off" => "off".to_owned(),
            level => format!("sflow={level}"),
        });
        let color = std::io::stderr().is_terminal();

        trace::init(color, self.log_json, &levels);
    }

    pub fn run(&self) -> Result<(), ExitCode> {
        if self.version {
            self.show_version();
            return Ok(());
        }

        self.init_trace();

        let Some(sub_command) = &self.sub_commands else {
            error!(message = "No command given, see --help");
            return Err(exitcode::USAGE);
        };

        match sub_command {
            SubCommands::Decode(decode) => decode.run(),
            SubCommands::Listen(listen) => listen.run(),
        }
    }
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommands {
    Decode(Decode),
    Listen(Listen),
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "decode",
    description = "Decode one raw datagram from a file and print it as JSON",
    help_triggers("-h", "--help")
)]
struct Decode {
    #[argh(positional, description = "file holding the datagram")]
    path: PathBuf,

    #[argh(switch, short = 'p', description = "indent the output")]
    pretty: bool,
}

impl Decode {
    #![allow(clippy::print_stdout)]
    fn run(&self) -> Result<(), ExitCode> {
        let data = std::fs::read(&self.path).map_err(|err| {
            error!(message = "Read datagram failed", path = ?self.path, %err);
            exitcode::NOINPUT
        })?;

        let datagram = Datagram::decode(&data).map_err(|err| {
            error!(message = "Decode datagram failed", path = ?self.path, %err);
            exitcode::DATAERR
        })?;

        let output = if self.pretty {
            serde_json::to_string_pretty(&datagram)
        } else {
            serde_json::to_string(&datagram)
        }
        .map_err(|err| {
            error!(message = "Serialize datagram failed", %err);
            exitcode::SOFTWARE
        })?;

        println!("{output}");

        Ok(())
    }
}

#[derive(FromArgs)]
#[argh(
    subcommand,
    name = "listen",
    description = "Receive datagrams over UDP and print each one as JSON",
    help_triggers("-h", "--help")
)]
struct Listen {
    #[argh(option, short = 'c', long = "config", description = "read configuration from file")]
    config: Option<PathBuf>,
}

impl Listen {
    fn run(&self) -> Result<(), ExitCode> {
        let config = match &self.config {
            Some(path) => Config::load(path).map_err(handle_config_errors)?,
            None => Config::default(),
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("sflow-worker")
            .enable_io()
            .enable_time()
            .build()
            .map_err(|err| {
                error!(message = "Build runtime failed", %err);
                exitcode::OSERR
            })?;

        runtime.block_on(async move {
            let socket = listen::bind(&config).await.map_err(|err| {
                error!(message = "Bind UDP socket failed", addr = %config.listen, %err);
                exitcode::UNAVAILABLE
            })?;

            let shutdown = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    error!(message = "Listen for shutdown signal failed", %err);
                }

                info!(message = "Shutdown signal received");
            };

            listen::serve(socket, config.pretty, std::io::stdout().lock(), shutdown)
                .await
                .map_err(|err| {
                    error!(message = "Listener stopped", %err);
                    exitcode::IOERR
                })
        })?;

        runtime.shutdown_timeout(Duration::from_secs(5));

        Ok(())
    }
}

fn handle_config_errors(errors: Vec<String>) -> ExitCode {
    for err in errors {
        error!(message = "configuration error", %err);
    }

    exitcode::CONFIG
}
