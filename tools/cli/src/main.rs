//! CipherFlow CLI - Streaming encryption, digests and signatures.
//!
//! Reads stdin (or a file) in fixed-size chunks and feeds each chunk through
//! the transform as it arrives, writing output as soon as it is produced.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

use cipherflow_common::{Direction, Encoding};
use cipherflow_crypto::{CipherSpec, Finish, Outcome, PaddingMode, Transform};

#[derive(Parser)]
#[command(name = "cipherflow")]
#[command(about = "CipherFlow - Streaming cipher, digest and signature tool")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt input.
    Encrypt {
        #[command(flatten)]
        cipher: CipherArgs,

        #[command(flatten)]
        io: IoArgs,

        /// Encoding of the plaintext input.
        #[arg(long, default_value = "binary")]
        input_encoding: Encoding,

        /// Encoding of the ciphertext output.
        #[arg(long, default_value = "base64")]
        output_encoding: Encoding,
    },

    /// Decrypt input.
    Decrypt {
        #[command(flatten)]
        cipher: CipherArgs,

        #[command(flatten)]
        io: IoArgs,

        /// Encoding of the ciphertext input.
        #[arg(long, default_value = "base64")]
        input_encoding: Encoding,

        /// Encoding of the plaintext output.
        #[arg(long, default_value = "binary")]
        output_encoding: Encoding,

        /// Accept non-standard padding from legacy peers.
        #[arg(long)]
        tolerant: bool,
    },

    /// Compute a message digest.
    Hash {
        /// Digest algorithm, e.g. "sha256".
        #[arg(short, long, default_value = "sha256")]
        algorithm: String,

        #[command(flatten)]
        io: IoArgs,

        #[arg(long, default_value = "binary")]
        input_encoding: Encoding,

        #[arg(long, default_value = "hex")]
        output_encoding: Encoding,
    },

    /// Compute an HMAC.
    Hmac {
        /// Digest algorithm, e.g. "sha256".
        #[arg(short, long, default_value = "sha256")]
        algorithm: String,

        /// HMAC key as hex (prompted for as text if omitted).
        #[arg(short, long)]
        key: Option<String>,

        #[command(flatten)]
        io: IoArgs,

        #[arg(long, default_value = "binary")]
        input_encoding: Encoding,

        #[arg(long, default_value = "hex")]
        output_encoding: Encoding,
    },

    /// Sign input with a PEM private key.
    Sign {
        /// Signature scheme: ed25519, or a digest for RSA (RSA-SHA256).
        #[arg(short, long, default_value = "ed25519")]
        scheme: String,

        /// PEM private key file (PKCS#8, or PKCS#1 for RSA).
        #[arg(long)]
        private_key: PathBuf,

        #[command(flatten)]
        io: IoArgs,

        #[arg(long, default_value = "base64")]
        output_encoding: Encoding,
    },

    /// Verify a signature over input with a PEM public key or certificate.
    Verify {
        /// Signature scheme: ed25519, or a digest for RSA (RSA-SHA256).
        #[arg(short, long, default_value = "ed25519")]
        scheme: String,

        /// PEM public key or certificate file.
        #[arg(long)]
        public_key: PathBuf,

        /// Signature text.
        #[arg(long)]
        signature: String,

        #[arg(long, default_value = "base64")]
        signature_encoding: Encoding,

        #[command(flatten)]
        io: IoArgs,
    },
}

#[derive(Args)]
struct CipherArgs {
    /// Cipher algorithm, e.g. "aes-256-cbc".
    #[arg(short, long, default_value = "aes-256-cbc")]
    algorithm: String,

    /// Key as hex. Without it the key is derived from a password.
    #[arg(short, long, conflicts_with_all = ["password", "spec"])]
    key: Option<String>,

    /// IV as hex, used with --key.
    #[arg(long, requires = "key")]
    iv: Option<String>,

    /// Password for legacy key derivation (prompted for if omitted).
    #[arg(short, long, conflicts_with = "spec")]
    password: Option<String>,

    /// JSON cipher spec file.
    #[arg(long)]
    spec: Option<PathBuf>,

    /// Disable PKCS#7 padding.
    #[arg(long)]
    no_padding: bool,
}

#[derive(Args)]
struct IoArgs {
    /// Input file (default: stdin).
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Bytes read per update.
    #[arg(long, default_value_t = 4096)]
    chunk_size: usize,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Encrypt {
            cipher,
            io,
            input_encoding,
            output_encoding,
        } => cmd_cipher(
            Direction::Encrypt,
            &cipher,
            &io,
            input_encoding,
            output_encoding,
            PaddingMode::Strict,
        ),

        Commands::Decrypt {
            cipher,
            io,
            input_encoding,
            output_encoding,
            tolerant,
        } => {
            let padding = if tolerant {
                PaddingMode::Tolerant
            } else {
                PaddingMode::Strict
            };
            cmd_cipher(
                Direction::Decrypt,
                &cipher,
                &io,
                input_encoding,
                output_encoding,
                padding,
            )
        }

        Commands::Hash {
            algorithm,
            io,
            input_encoding,
            output_encoding,
        } => {
            let transform = Transform::digest(&algorithm).context("Failed to start digest")?;
            cmd_digest(transform, &io, input_encoding, output_encoding)
        }

        Commands::Hmac {
            algorithm,
            key,
            io,
            input_encoding,
            output_encoding,
        } => {
            let key = match key {
                Some(hex_key) => {
                    Zeroizing::new(hex::decode(hex_key).context("HMAC key is not valid hex")?)
                }
                None => prompt_secret("Enter HMAC key: ")?,
            };
            let transform =
                Transform::keyed_digest(&algorithm, &key).context("Failed to start HMAC")?;
            cmd_digest(transform, &io, input_encoding, output_encoding)
        }

        Commands::Sign {
            scheme,
            private_key,
            io,
            output_encoding,
        } => cmd_sign(&scheme, &private_key, &io, output_encoding),

        Commands::Verify {
            scheme,
            public_key,
            signature,
            signature_encoding,
            io,
        } => cmd_verify(&scheme, &public_key, &signature, signature_encoding, &io),
    }
}

/// Prompt for a secret without echo.
fn prompt_secret(prompt: &str) -> Result<Zeroizing<Vec<u8>>> {
    let secret = rpassword::prompt_password(prompt).context("Failed to read secret")?;
    Ok(Zeroizing::new(secret.into_bytes()))
}

/// Build the cipher spec from the command line options.
fn cipher_spec(direction: Direction, args: &CipherArgs) -> Result<CipherSpec> {
    let mut spec = if let Some(path) = &args.spec {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read spec {}", path.display()))?;
        let spec = CipherSpec::from_json(&json).context("Invalid cipher spec")?;
        if spec.direction != direction {
            bail!(
                "Spec {} is for {}, not {}",
                path.display(),
                spec.direction,
                direction
            );
        }
        spec
    } else if let Some(hex_key) = &args.key {
        let key = Zeroizing::new(hex::decode(hex_key).context("Key is not valid hex")?);
        let iv = match &args.iv {
            Some(hex_iv) => hex::decode(hex_iv).context("IV is not valid hex")?,
            None => Vec::new(),
        };
        CipherSpec::with_key_iv(&args.algorithm, direction, &key, &iv)
    } else {
        let password = match &args.password {
            Some(password) => Zeroizing::new(password.clone().into_bytes()),
            None => prompt_secret("Enter password: ")?,
        };
        if password.is_empty() {
            bail!("Password cannot be empty");
        }
        CipherSpec::with_password(&args.algorithm, direction, &password)
    };

    if args.no_padding {
        spec.padding = false;
    }
    Ok(spec)
}

/// Open the input source.
fn open_input(io_args: &IoArgs) -> Result<Box<dyn Read>> {
    if io_args.chunk_size == 0 {
        bail!("Chunk size must be positive");
    }
    match &io_args.input {
        Some(path) => {
            let file = fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

/// Read `input` chunk by chunk, passing each chunk to `step` and writing
/// whatever it returns.
fn pump<F>(input: &mut dyn Read, chunk_size: usize, out: &mut dyn Write, mut step: F) -> Result<u64>
where
    F: FnMut(&[u8]) -> Result<Vec<u8>>,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut total = 0u64;
    loop {
        let n = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("Failed to read input"),
        };
        total += n as u64;
        let output = step(&buffer[..n])?;
        out.write_all(&output).context("Failed to write output")?;
    }
    Ok(total)
}

/// Encrypt or decrypt.
fn cmd_cipher(
    direction: Direction,
    args: &CipherArgs,
    io_args: &IoArgs,
    input_encoding: Encoding,
    output_encoding: Encoding,
    padding: PaddingMode,
) -> Result<ExitCode> {
    let spec = cipher_spec(direction, args)?;
    info!(algorithm = %spec.algorithm, %direction, "Starting cipher");

    let stream = spec.open().context("Failed to initialize cipher")?;
    let mut transform = Transform::from_cipher(stream);

    let mut input = open_input(io_args)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let total = pump(&mut input, io_args.chunk_size, &mut out, |chunk| {
        transform
            .update(chunk, input_encoding, output_encoding)
            .context("Cipher update failed")
    })?;

    let outcome = transform
        .finish(Finish::Cipher {
            output_encoding,
            padding,
        })
        .context("Cipher finalization failed")?;
    if let Outcome::Data(tail) = outcome {
        out.write_all(&tail)?;
    }
    if output_encoding != Encoding::Binary {
        writeln!(out)?;
    }
    out.flush()?;

    debug!(input_bytes = total, "Cipher complete");
    Ok(ExitCode::SUCCESS)
}

/// Hash or HMAC.
fn cmd_digest(
    mut transform: Transform,
    io_args: &IoArgs,
    input_encoding: Encoding,
    output_encoding: Encoding,
) -> Result<ExitCode> {
    let mut input = open_input(io_args)?;
    let mut sink = io::sink();

    pump(&mut input, io_args.chunk_size, &mut sink, |chunk| {
        transform
            .update(chunk, input_encoding, output_encoding)
            .context("Digest update failed")
    })?;

    let outcome = transform
        .finish(Finish::Digest { output_encoding })
        .context("Digest finalization failed")?;
    write_outcome(outcome, output_encoding)
}

/// Sign input.
fn cmd_sign(
    scheme: &str,
    private_key: &Path,
    io_args: &IoArgs,
    output_encoding: Encoding,
) -> Result<ExitCode> {
    let pem = Zeroizing::new(
        fs::read(private_key)
            .with_context(|| format!("Failed to read {}", private_key.display()))?,
    );
    let mut transform = Transform::sign(scheme).context("Failed to start signature")?;

    let mut input = open_input(io_args)?;
    let mut sink = io::sink();
    pump(&mut input, io_args.chunk_size, &mut sink, |chunk| {
        transform
            .update(chunk, Encoding::Binary, Encoding::Binary)
            .context("Signature update failed")
    })?;

    let outcome = transform
        .finish(Finish::Sign {
            private_key_pem: &pem,
            output_encoding,
        })
        .context("Signing failed")?;
    write_outcome(outcome, output_encoding)
}

/// Verify a signature over input.
fn cmd_verify(
    scheme: &str,
    public_key: &Path,
    signature: &str,
    signature_encoding: Encoding,
    io_args: &IoArgs,
) -> Result<ExitCode> {
    let pem = fs::read(public_key)
        .with_context(|| format!("Failed to read {}", public_key.display()))?;
    let mut transform = Transform::verify(scheme).context("Failed to start verification")?;

    let mut input = open_input(io_args)?;
    let mut sink = io::sink();
    pump(&mut input, io_args.chunk_size, &mut sink, |chunk| {
        transform
            .update(chunk, Encoding::Binary, Encoding::Binary)
            .context("Verification update failed")
    })?;

    let outcome = transform
        .finish(Finish::Verify {
            key_pem: &pem,
            signature: signature.trim().as_bytes(),
            signature_encoding,
        })
        .context("Verification failed")?;

    match outcome {
        Outcome::Verified(true) => {
            println!("Verified OK");
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            println!("Verification failure");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Write a one-shot result to stdout.
fn write_outcome(outcome: Outcome, encoding: Encoding) -> Result<ExitCode> {
    let Some(data) = outcome.into_data() else {
        bail!("Operation produced no output");
    };
    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(&data)?;
    if encoding != Encoding::Binary {
        writeln!(out)?;
    }
    out.flush()?;
    Ok(ExitCode::SUCCESS)
}
