#![forbid(unsafe_code)]

//! Skeppsbron CLI — EBICS key setup, connection and transfers.

use base64::Engine;
use clap::{Parser, Subcommand};
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey};
use serde::{Deserialize, Serialize};
use skeppsbron_client::transport::HttpTransport;
use skeppsbron_client::{backup, keymgmt, transaction};
use skeppsbron_core::{Error, Result};
use skeppsbron_crypto::keys::{
    encode_rsa_private_key, format_key_letter_hash, generate_rsa_keypair, load_rsa_private_key,
    public_key_hash,
};
use skeppsbron_messages::request::OrderParams;
use skeppsbron_messages::{EbicsKeyState, EbicsSubscriberState};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "skeppsbron",
    about = "Skeppsbron — EBICS H004 client",
    version
)]
struct Cli {
    /// Connection file (JSON)
    #[arg(short, long, default_value = "connection.json")]
    connection: PathBuf,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a connection file with freshly generated subscriber keys
    Keygen {
        #[arg(long)]
        ebics_url: String,
        #[arg(long)]
        host_id: String,
        #[arg(long)]
        partner_id: String,
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        system_id: Option<String>,
    },

    /// Print the key hashes for the out-of-band key letter
    Letter,

    /// Query the host's supported protocol versions (HEV)
    Hev,

    /// Run INI/HIA/HPB as needed to make the subscriber usable
    Connect,

    /// Download statements (e.g. C52/C53) and print the order data
    Fetch {
        /// Three-letter order type
        #[arg(long, default_value = "C53")]
        order_type: String,
        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        start: Option<chrono::NaiveDate>,
        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        end: Option<chrono::NaiveDate>,
        /// Write the payload here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a payment initiation document (e.g. pain.001 as CCT)
    Submit {
        /// Payload file
        file: PathBuf,
        /// Three-letter order type
        #[arg(long, default_value = "CCT")]
        order_type: String,
    },

    /// Export a passphrase-protected key backup
    BackupExport {
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        passphrase: String,
    },

    /// Restore a connection file from a key backup
    BackupImport {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(long)]
        passphrase: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let transport = HttpTransport::new(Duration::from_secs(cli.timeout))?;

    match cli.command {
        Commands::Keygen { ebics_url, host_id, partner_id, user_id, system_id } => {
            let state = EbicsSubscriberState {
                ebics_url,
                host_id,
                partner_id,
                user_id,
                system_id,
                customer_sign_key: generate_rsa_keypair(2048)?,
                customer_auth_key: generate_rsa_keypair(2048)?,
                customer_enc_key: generate_rsa_keypair(2048)?,
                bank_auth_pub: None,
                bank_enc_pub: None,
                ini_state: EbicsKeyState::NotSent,
                hia_state: EbicsKeyState::NotSent,
            };
            save_connection(&cli.connection, &state)?;
            println!("wrote {}", cli.connection.display());
        }

        Commands::Letter => {
            let state = load_connection(&cli.connection)?;
            for (name, key) in [
                ("A006 signature key", &state.customer_sign_key),
                ("X002 authentication key", &state.customer_auth_key),
                ("E002 encryption key", &state.customer_enc_key),
            ] {
                println!("{name}:");
                println!("{}\n", format_key_letter_hash(&public_key_hash(&key.to_public_key())));
            }
        }

        Commands::Hev => {
            let state = load_connection(&cli.connection)?;
            let details =
                keymgmt::host_version_query(&transport, &state.ebics_url, &state.host_id).await?;
            println!("return code: {} ({})", details.return_code, details.report_text);
            for v in details.versions {
                println!("  {} {}", v.protocol, v.version);
            }
        }

        Commands::Connect => {
            let state = load_connection(&cli.connection)?;
            let outcome = keymgmt::connect(&transport, &state).await?;
            save_connection(&cli.connection, &outcome.state)?;
            println!(
                "ini: {:?}, hia: {:?}, bank keys: {}",
                outcome.state.ini_state,
                outcome.state.hia_state,
                if outcome.state.has_bank_keys() { "present" } else { "missing" }
            );
        }

        Commands::Fetch { order_type, start, end, output } => {
            let state = load_connection(&cli.connection)?;
            let params = match (start, end) {
                (Some(start), Some(end)) => OrderParams::DateRange { start, end },
                _ => OrderParams::Standard,
            };
            let outcome =
                transaction::download_transaction(&transport, &state, &order_type, &params)
                    .await?;
            match outcome {
                transaction::DownloadOutcome::Success(payload) => match output {
                    Some(path) => {
                        std::fs::write(&path, &payload)?;
                        println!("wrote {} bytes to {}", payload.len(), path.display());
                    }
                    None => print!("{}", String::from_utf8_lossy(&payload)),
                },
                transaction::DownloadOutcome::BankError(code) => {
                    eprintln!("bank rejected the download: {code}");
                    process::exit(2);
                }
            }
        }

        Commands::Submit { file, order_type } => {
            let state = load_connection(&cli.connection)?;
            let payload = std::fs::read(&file)?;
            let outcome = transaction::upload_transaction(
                &transport,
                &state,
                &order_type,
                &OrderParams::Standard,
                &payload,
            )
            .await?;
            match outcome {
                transaction::UploadOutcome::Success => println!("submitted {}", file.display()),
                transaction::UploadOutcome::BankError(code) => {
                    eprintln!("bank rejected the upload: {code}");
                    process::exit(2);
                }
            }
        }

        Commands::BackupExport { output, passphrase } => {
            let state = load_connection(&cli.connection)?;
            let doc = backup::export_backup(&state, &passphrase)?;
            std::fs::write(&output, serde_json::to_vec_pretty(&doc).map_err(json_err)?)?;
            println!("wrote backup to {}", output.display());
        }

        Commands::BackupImport { input, passphrase } => {
            let raw = std::fs::read(&input)?;
            let doc: backup::KeysBackup = serde_json::from_slice(&raw).map_err(json_err)?;
            let state = backup::import_backup(&doc, &passphrase)?;
            save_connection(&cli.connection, &state)?;
            println!("restored connection to {}", cli.connection.display());
        }
    }
    Ok(())
}

// ── Connection file ──────────────────────────────────────────────────

#[derive(Serialize, Deserialize)]
struct ConnectionFile {
    ebics_url: String,
    host_id: String,
    partner_id: String,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    system_id: Option<String>,
    /// PKCS#8 DER, base64
    sign_key: String,
    auth_key: String,
    enc_key: String,
    /// SPKI DER, base64; absent until HPB succeeded
    #[serde(skip_serializing_if = "Option::is_none", default)]
    bank_auth_pub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    bank_enc_pub: Option<String>,
    ini_state: String,
    hia_state: String,
}

fn load_connection(path: &Path) -> Result<EbicsSubscriberState> {
    let raw = std::fs::read(path)?;
    let file: ConnectionFile = serde_json::from_slice(&raw).map_err(json_err)?;
    let b64 = base64::engine::general_purpose::STANDARD;
    let private_key = |data: &str| -> Result<rsa::RsaPrivateKey> {
        load_rsa_private_key(&b64.decode(data).map_err(|e| Error::Base64(e.to_string()))?)
    };
    let public_key = |data: &Option<String>| -> Result<Option<rsa::RsaPublicKey>> {
        match data {
            None => Ok(None),
            Some(d) => {
                let der = b64.decode(d).map_err(|e| Error::Base64(e.to_string()))?;
                Ok(Some(rsa::RsaPublicKey::from_public_key_der(&der).map_err(
                    |e| Error::Key(format!("invalid bank public key: {e}")),
                )?))
            }
        }
    };
    Ok(EbicsSubscriberState {
        ebics_url: file.ebics_url,
        host_id: file.host_id,
        partner_id: file.partner_id,
        user_id: file.user_id,
        system_id: file.system_id,
        customer_sign_key: private_key(&file.sign_key)?,
        customer_auth_key: private_key(&file.auth_key)?,
        customer_enc_key: private_key(&file.enc_key)?,
        bank_auth_pub: public_key(&file.bank_auth_pub)?,
        bank_enc_pub: public_key(&file.bank_enc_pub)?,
        ini_state: parse_key_state(&file.ini_state)?,
        hia_state: parse_key_state(&file.hia_state)?,
    })
}

fn save_connection(path: &Path, state: &EbicsSubscriberState) -> Result<()> {
    let b64 = base64::engine::general_purpose::STANDARD;
    let public_key = |key: &Option<rsa::RsaPublicKey>| -> Result<Option<String>> {
        match key {
            None => Ok(None),
            Some(k) => Ok(Some(
                b64.encode(
                    k.to_public_key_der()
                        .map_err(|e| Error::Key(format!("public key encoding: {e}")))?
                        .as_bytes(),
                ),
            )),
        }
    };
    let file = ConnectionFile {
        ebics_url: state.ebics_url.clone(),
        host_id: state.host_id.clone(),
        partner_id: state.partner_id.clone(),
        user_id: state.user_id.clone(),
        system_id: state.system_id.clone(),
        sign_key: b64.encode(encode_rsa_private_key(&state.customer_sign_key)?),
        auth_key: b64.encode(encode_rsa_private_key(&state.customer_auth_key)?),
        enc_key: b64.encode(encode_rsa_private_key(&state.customer_enc_key)?),
        bank_auth_pub: public_key(&state.bank_auth_pub)?,
        bank_enc_pub: public_key(&state.bank_enc_pub)?,
        ini_state: key_state_name(state.ini_state).to_owned(),
        hia_state: key_state_name(state.hia_state).to_owned(),
    };
    std::fs::write(path, serde_json::to_vec_pretty(&file).map_err(json_err)?)?;
    Ok(())
}

fn key_state_name(state: EbicsKeyState) -> &'static str {
    match state {
        EbicsKeyState::Unknown => "unknown",
        EbicsKeyState::NotSent => "not-sent",
        EbicsKeyState::Sent => "sent",
    }
}

fn parse_key_state(name: &str) -> Result<EbicsKeyState> {
    match name {
        "unknown" => Ok(EbicsKeyState::Unknown),
        "not-sent" => Ok(EbicsKeyState::NotSent),
        "sent" => Ok(EbicsKeyState::Sent),
        other => Err(Error::Other(format!("unknown key state in connection file: {other}"))),
    }
}

fn json_err(e: serde_json::Error) -> Error {
    Error::Other(format!("JSON error: {e}"))
}
