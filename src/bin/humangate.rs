//! humangate CLI
//!
//! Commands:
//! - serve: Run the relay server in front of a classification service
//! - features: Replay a recorded session and print its feature vector
//! - submit: Replay a recorded session and run a full submit attempt
//! - doctor: Diagnose configuration and downstream reachability

use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use humangate::capture::parse_recording;
use humangate::config::{ClientConfig, RelayConfig};
use humangate::relay::{self, Relay, RelayClient, SimulatedRelay};
use humangate::submit::{SubmitOutcome, Submitter};
use humangate::{GateError, RelayError, GATE_VERSION, PRODUCER_NAME};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "humangate=info,tower_http=info";

/// humangate - Passive behavioral bot detection for login forms
#[derive(Parser)]
#[command(name = "humangate")]
#[command(version = GATE_VERSION)]
#[command(about = "Behavioral fingerprinting and classifier relay for login forms", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Listening port (overrides HUMANGATE_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Classification service base URL (overrides HUMANGATE_CLASSIFIER_URL)
        #[arg(long)]
        classifier_url: Option<String>,
    },

    /// Print the feature vector of a recorded session
    Features {
        /// Recording file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Print slot names next to values
        #[arg(long)]
        named: bool,
    },

    /// Replay a recorded session and submit it
    Submit {
        /// Recording file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Relay base URL (overrides HUMANGATE_RELAY_URL)
        #[arg(long)]
        relay_url: Option<String>,

        /// Draw a local random verdict instead of calling the relay
        #[arg(long)]
        simulate: bool,

        /// Seed for the simulated verdict
        #[arg(long, requires = "simulate")]
        seed: Option<u64>,
    },

    /// Diagnose configuration and downstream reachability
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is the normal case
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), GateCliError> {
    match cli.command {
        Commands::Serve {
            port,
            classifier_url,
        } => cmd_serve(port, classifier_url).await,

        Commands::Features { input, named } => cmd_features(&input, named),

        Commands::Submit {
            input,
            relay_url,
            simulate,
            seed,
        } => cmd_submit(&input, relay_url, simulate, seed).await,

        Commands::Doctor { json } => cmd_doctor(json).await,
    }
}

fn read_input(input: &Path) -> Result<String, GateCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

async fn cmd_serve(port: Option<u16>, classifier_url: Option<String>) -> Result<(), GateCliError> {
    let mut config = RelayConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(url) = classifier_url {
        config.classifier_url = url;
    }

    relay::serve(config).await?;
    Ok(())
}

fn cmd_features(input: &Path, named: bool) -> Result<(), GateCliError> {
    let recording = parse_recording(&read_input(input)?)?;
    let vector = recording.feature_vector()?;

    if named {
        for (index, (name, value)) in vector.named().into_iter().enumerate() {
            println!("{:>2}  {:<28} {}", index, name, value);
        }
    } else {
        println!("{}", serde_json::to_string(&vector)?);
    }
    Ok(())
}

async fn cmd_submit(
    input: &Path,
    relay_url: Option<String>,
    simulate: bool,
    seed: Option<u64>,
) -> Result<(), GateCliError> {
    let recording = parse_recording(&read_input(input)?)?;

    let outcome = if simulate {
        let relay = match seed {
            Some(seed) => SimulatedRelay::with_seed(seed),
            None => SimulatedRelay::new(),
        };
        submit_recording(relay, recording).await?
    } else {
        let mut config = ClientConfig::from_env();
        if let Some(url) = relay_url {
            config.relay_url = url;
        }
        config.validate()?;
        submit_recording(RelayClient::new(config)?, recording).await?
    };

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    match outcome {
        SubmitOutcome::Allowed { .. } | SubmitOutcome::Denied { .. } => Ok(()),
        SubmitOutcome::Invalid { .. } => Err(GateCliError::SubmitRejected("invalid credentials")),
        SubmitOutcome::Failed { .. } | SubmitOutcome::Busy => {
            Err(GateCliError::SubmitRejected("no verdict"))
        }
    }
}

async fn submit_recording<R: Relay>(
    relay: R,
    recording: humangate::Recording,
) -> Result<SubmitOutcome, GateCliError> {
    let capture = recording.replay()?;
    let mut form = recording.form;
    let submitter = Submitter::new(relay);
    Ok(submitter
        .submit(&mut form, &capture, &recording.probes, recording.submitted_at)
        .await)
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl DoctorCheck {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
        }
    }
}

async fn cmd_doctor(json: bool) -> Result<(), GateCliError> {
    let relay_config = RelayConfig::from_env();
    let client_config = ClientConfig::from_env();
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck::new(
        "version",
        CheckStatus::Ok,
        format!("humangate version {}", GATE_VERSION),
    ));

    checks.push(match relay_config.validate() {
        Ok(()) => DoctorCheck::new(
            "relay_config",
            CheckStatus::Ok,
            format!(
                "port {}, forwarding to {} (timeout {}s)",
                relay_config.port,
                relay_config.predict_url(),
                relay_config.classifier_timeout_secs
            ),
        ),
        Err(e) => DoctorCheck::new("relay_config", CheckStatus::Error, e.to_string()),
    });

    checks.push(match client_config.validate() {
        Ok(()) => DoctorCheck::new(
            "client_config",
            CheckStatus::Ok,
            format!("checking against {}", client_config.check_url()),
        ),
        Err(e) => DoctorCheck::new("client_config", CheckStatus::Error, e.to_string()),
    });

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .map_err(|e| GateCliError::Gate(GateError::ConfigError(e.to_string())))?;

    let health_url = format!("{}/health", client_config.relay_url.trim_end_matches('/'));
    checks.push(match http.get(&health_url).send().await {
        Ok(r) if r.status().is_success() => {
            DoctorCheck::new("relay", CheckStatus::Ok, format!("{} is healthy", health_url))
        }
        Ok(r) => DoctorCheck::new(
            "relay",
            CheckStatus::Warning,
            format!("{} answered with status {}", health_url, r.status().as_u16()),
        ),
        Err(e) => DoctorCheck::new(
            "relay",
            CheckStatus::Warning,
            format!("relay not reachable: {}", e),
        ),
    });

    // Any HTTP answer means the classifier process is up
    checks.push(match http.get(&relay_config.classifier_url).send().await {
        Ok(r) => DoctorCheck::new(
            "classifier",
            CheckStatus::Ok,
            format!(
                "{} answered with status {}",
                relay_config.classifier_url,
                r.status().as_u16()
            ),
        ),
        Err(e) => DoctorCheck::new(
            "classifier",
            CheckStatus::Warning,
            format!("classifier not reachable: {}", e),
        ),
    });

    checks.push(if atty::is(atty::Stream::Stdin) {
        DoctorCheck::new("stdin", CheckStatus::Ok, "stdin is a TTY (pass recordings with --input <file>)")
    } else {
        DoctorCheck::new("stdin", CheckStatus::Ok, "stdin is a pipe (--input - ready)")
    });

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: GATE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("humangate Doctor Report");
        println!("=======================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(GateCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

#[derive(Debug)]
enum GateCliError {
    Io(io::Error),
    Gate(GateError),
    Json(serde_json::Error),
    Relay(RelayError),
    SubmitRejected(&'static str),
    DoctorFailed,
}

impl From<io::Error> for GateCliError {
    fn from(e: io::Error) -> Self {
        GateCliError::Io(e)
    }
}

impl From<GateError> for GateCliError {
    fn from(e: GateError) -> Self {
        GateCliError::Gate(e)
    }
}

impl From<serde_json::Error> for GateCliError {
    fn from(e: serde_json::Error) -> Self {
        GateCliError::Json(e)
    }
}

impl From<RelayError> for GateCliError {
    fn from(e: RelayError) -> Self {
        GateCliError::Relay(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<GateCliError> for CliError {
    fn from(e: GateCliError) -> Self {
        match e {
            GateCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            GateCliError::Gate(e @ GateError::ParseError(_))
            | GateCliError::Gate(e @ GateError::InvalidRecording(_)) => CliError {
                code: "RECORDING_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "A recording needs session_start, submitted_at and events inside that window"
                        .to_string(),
                ),
            },
            GateCliError::Gate(e @ GateError::ConfigError(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check HUMANGATE_* environment variables and flags".to_string()),
            },
            GateCliError::Gate(e) => CliError {
                code: "GATE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            GateCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            GateCliError::Relay(e) => CliError {
                code: "RELAY_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'humangate doctor' to check the relay".to_string()),
            },
            GateCliError::SubmitRejected(reason) => CliError {
                code: "SUBMIT_REJECTED".to_string(),
                message: format!("Submission produced {}", reason),
                hint: Some("See the printed outcome for details".to_string()),
            },
            GateCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report above".to_string()),
            },
        }
    }
}
