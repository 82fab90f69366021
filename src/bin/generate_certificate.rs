//! Generate a single donation certificate PDF from the command line.
//!
//! Exit codes: 0 success, 65 invalid input, 70 rendering failure, 74 file-system failure.

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use donation_certificate_server::certificate::engine::{select_engine, EngineKind, EngineOptions};
use donation_certificate_server::certificate::{
    parse_amount, CertificateError, CertificateGenerator, CertificateRequest, GeneratorOptions,
    ValidationError, ValidationErrors,
};

#[derive(Parser, Debug)]
#[command(name = "generate-certificate")]
#[command(about = "Generate a donation certificate PDF from an HTML template", long_about = None)]
struct Cli {
    /// Path to the HTML certificate template
    #[arg(long)]
    template: PathBuf,

    /// Output PDF path
    #[arg(long)]
    out: PathBuf,

    /// Donor name
    #[arg(long)]
    donor: String,

    /// Amount in INR (e.g. 500 or 1500.00)
    #[arg(long)]
    amount: String,

    /// Donation/receipt ID
    #[arg(long)]
    donation_id: String,

    /// Donation date, YYYY-MM-DD
    #[arg(long)]
    date: String,

    /// UPI / Razorpay / Bank Transfer
    #[arg(long)]
    payment_mode: Option<String>,

    /// Line shown under the donor name
    #[arg(long)]
    reason: Option<String>,

    #[arg(long)]
    org_name: Option<String>,

    #[arg(long)]
    org_subtitle: Option<String>,

    /// Hide the 80G tax note
    #[arg(long)]
    no_80g_note: bool,

    /// SHA-256 of the template to lock the layout
    #[arg(long)]
    lock_hash: Option<String>,

    /// PDF engine: chrome or wkhtmltopdf
    #[arg(long, default_value = "chrome")]
    engine: EngineKind,

    /// Give up rendering after this many seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

fn parse_request(cli: &Cli) -> Result<CertificateRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let amount = parse_amount(&cli.amount).map_err(|e| errors.add(e)).ok();
    let date = NaiveDate::parse_from_str(cli.date.trim(), "%Y-%m-%d")
        .map_err(|_| errors.add(ValidationError::invalid_date_format(&cli.date)))
        .ok();

    let (Some(amount), Some(date)) = (amount, date) else {
        return Err(errors);
    };

    let mut request = CertificateRequest::new(&cli.donor, amount, &cli.donation_id, date);
    request.payment_mode = cli.payment_mode.clone();
    request.show_80g_note = !cli.no_80g_note;
    if let Some(reason) = &cli.reason {
        request.reason_text = reason.clone();
    }
    if let Some(org_name) = &cli.org_name {
        request.org_name = org_name.clone();
    }
    if let Some(org_subtitle) = &cli.org_subtitle {
        request.org_subtitle = org_subtitle.clone();
    }
    Ok(request)
}

fn generator_options(cli: &Cli) -> Result<GeneratorOptions, CertificateError> {
    let template_name = cli
        .template
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CertificateError::TemplateNotFound(cli.template.display().to_string())
        })?;
    let template_dir = cli
        .template
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(GeneratorOptions {
        template_dir,
        template_name,
        expected_template_sha256: cli.lock_hash.clone(),
        render_timeout: Duration::from_secs(cli.timeout_secs.max(1)),
    })
}

async fn execute(cli: Cli) -> Result<PathBuf, CertificateError> {
    let request = parse_request(&cli)?;
    let options = generator_options(&cli)?;

    let engine_options = EngineOptions {
        chrome_path: std::env::var_os("CHROME_PATH").map(PathBuf::from),
        wkhtmltopdf_path: std::env::var_os("WKHTMLTOPDF_PATH").map(PathBuf::from),
        ..EngineOptions::default()
    };
    let engine = select_engine(cli.engine, &engine_options)?;
    let generator = CertificateGenerator::new(options, engine)?;
    let out = generator.generate(&request, &cli.out).await?;

    Ok(std::fs::canonicalize(&out).unwrap_or(out))
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match execute(cli).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
