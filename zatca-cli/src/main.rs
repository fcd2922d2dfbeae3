use anyhow::{Context, Result, bail};
use base64ct::{Base64, Encoding};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use zatca_core::certificate::CertificateInfo;
use zatca_core::invoice::QrPayload;
use zatca_core::invoice::hash::invoice_hash;
use zatca_core::invoice::qr::{TAG_CERTIFICATE_SIGNATURE, TAG_PUBLIC_KEY};
use zatca_core::invoice::sign::InvoiceSigner;
use zatca_core::invoice::verify::{verify_signed_invoice, verify_with_embedded_certificate};
use zatca_core::ledger::{Ledger, NdjsonLedgerStore};

#[derive(Parser)]
#[command(name = "zatca")]
#[command(about = "Hash, sign and verify ZATCA e-invoices")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical invoice hash.
    Hash { xml: PathBuf },
    /// Sign an invoice with a certificate and private key.
    Sign {
        #[arg(long)]
        cert: PathBuf,
        #[arg(long)]
        key: PathBuf,
        xml: PathBuf,
        /// Write the signed invoice here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check the digests and signature of a signed invoice.
    Verify {
        xml: PathBuf,
        /// Verify against this certificate instead of the embedded one.
        #[arg(long)]
        cert: Option<PathBuf>,
    },
    Qr {
        #[command(subcommand)]
        command: QrCommands,
    },
    Cert {
        #[command(subcommand)]
        command: CertCommands,
    },
    Chain {
        #[command(subcommand)]
        command: ChainCommands,
    },
}

#[derive(Subcommand)]
enum QrCommands {
    /// Print every TLV field of a base64 QR payload.
    Decode { payload: String },
    /// Report problems with a base64 QR payload.
    Validate { payload: String },
}

#[derive(Subcommand)]
enum CertCommands {
    /// Print the values used in signatures and QR codes.
    Info { pem: PathBuf },
}

#[derive(Subcommand)]
enum ChainCommands {
    /// Replay an NDJSON ledger and report breaks.
    Verify {
        ledger: PathBuf,
        #[arg(long)]
        from: Option<u64>,
        #[arg(long)]
        to: Option<u64>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Hash { xml } => {
            let hash = invoice_hash(&read_text(&xml)?).context("failed to hash invoice")?;
            println!("{hash}");
        }
        Commands::Sign {
            cert,
            key,
            xml,
            out,
        } => {
            let signer = InvoiceSigner::from_pem(&read_text(&cert)?, &read_text(&key)?)
                .context("failed to load signing credentials")?;
            let signed = signer
                .sign_xml(&read_text(&xml)?)
                .context("failed to sign invoice")?;
            tracing::debug!(input = %xml.display(), "invoice signed");
            match out {
                Some(path) => fs::write(&path, &signed)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{signed}"),
            }
        }
        Commands::Verify { xml, cert } => {
            let text = read_text(&xml)?;
            let valid = match cert {
                Some(path) => {
                    let key = CertificateInfo::from_pem(&read_text(&path)?)?.verifying_key()?;
                    verify_signed_invoice(&text, &key)
                }
                None => verify_with_embedded_certificate(&text),
            }
            .context("failed to verify invoice")?;
            if !valid {
                bail!("signature verification failed for {}", xml.display());
            }
            println!("valid");
        }
        Commands::Qr { command } => match command {
            QrCommands::Decode { payload } => {
                let qr = QrPayload::decode(&payload).context("failed to decode qr payload")?;
                for tag in qr.tags() {
                    let Some(value) = qr.value(tag) else { continue };
                    if tag == TAG_PUBLIC_KEY || tag == TAG_CERTIFICATE_SIGNATURE {
                        println!("{tag}: {}", hex::encode(value));
                    } else {
                        println!("{tag}: {}", String::from_utf8_lossy(value));
                    }
                }
            }
            QrCommands::Validate { payload } => {
                let qr = QrPayload::decode(&payload).context("failed to decode qr payload")?;
                let issues = qr.validate();
                if !issues.is_empty() {
                    for issue in &issues {
                        eprintln!("{issue}");
                    }
                    bail!("qr payload has {} issue(s)", issues.len());
                }
                println!("valid");
            }
        },
        Commands::Cert { command } => match command {
            CertCommands::Info { pem } => {
                let info = CertificateInfo::from_pem(&read_text(&pem)?)
                    .context("failed to parse certificate")?;
                println!("issuer: {}", info.issuer_name());
                println!("serial: {}", info.serial_number());
                println!("digest: {}", info.digest());
                println!("not_after: {}", info.not_after().to_rfc3339());
                println!("public_key: {}", Base64::encode_string(info.public_key_der()));
            }
        },
        Commands::Chain { command } => match command {
            ChainCommands::Verify { ledger, from, to } => {
                let store = NdjsonLedgerStore::open(&ledger)
                    .with_context(|| format!("failed to open {}", ledger.display()))?;
                let ledger = Ledger::new(store);
                let from = from.unwrap_or(1);
                let mismatches = match to {
                    Some(to) => ledger.verify_chain(from..=to),
                    None => ledger.verify_chain(from..),
                }
                .context("failed to replay hash chain")?;
                if !mismatches.is_empty() {
                    for mismatch in &mismatches {
                        println!("{mismatch}");
                    }
                    return Ok(ExitCode::from(2));
                }
                println!("chain intact");
            }
        },
    }

    Ok(ExitCode::SUCCESS)
}
