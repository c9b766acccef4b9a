use rsa_docsign::codec::{to_decimal, to_hex};
use rsa_docsign::io::{
    read_keypair, read_parameters, read_private_key, read_public_key, read_signature,
    signature_path, write_bundle, write_keypair, write_parameters, write_signature,
};
use rsa_docsign::{
    classify, derive_ed_decimal, encode_native, generate_keypair, generate_native,
    import_bundle, sign_reader, validate_or_build_key_decimal, verify_reader, DigestAlgorithm,
    EncodedKeyPair, Key, KeyExport, KeyGenConfig, KeyParameters, Result,
};

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rsa-docsign", version, about = "Sign and verify documents with RSA")]
struct Args {
    /// Digest algorithm: MD5, SHA1, SHA256 or SHA512
    #[arg(long, global = true, default_value = "SHA256", env = "RSA_DOCSIGN_DIGEST")]
    digest: String,

    /// Directory holding public.key / private.key
    #[arg(long, global = true, default_value = "keys", env = "RSA_DOCSIGN_KEY_DIR")]
    key_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Form {
    /// {e,n} / {d,n} JSON halves, textbook RSA
    Json,
    /// base64 SPKI / PKCS#8 DER, PKCS#1 v1.5
    Native,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a key pair, from two primes or at random
    Keygen {
        #[arg(short, long, requires = "q")]
        p: Option<String>,
        #[arg(short, long, requires = "p")]
        q: Option<String>,
        #[arg(long, value_enum, default_value = "json")]
        form: Form,
        /// Modulus size for random keys
        #[arg(long, default_value_t = 1024, env = "RSA_DOCSIGN_KEY_BITS")]
        bits: u64,
    },
    /// Print the (e, d) derived from two primes
    Derive { p: String, q: String },
    /// Write a detached signature for a file
    Sign {
        input: PathBuf,
        /// Defaults to <input>.sig
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Check a detached signature
    Verify {
        input: PathBuf,
        /// Defaults to <input>.sig
        #[arg(short, long)]
        signature: Option<PathBuf>,
    },
    /// Write the key pair as an export bundle
    Export {
        #[arg(long)]
        name: String,
        #[arg(long = "type", default_value = "detached")]
        signature_type: String,
        output: PathBuf,
    },
    /// Validate an export bundle and install its key pair
    Import { bundle: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!("{err}");
            ExitCode::from(2)
        }
    }
}

/// Ok(false) when a signature did not verify
fn run(args: Args) -> Result<bool> {
    let selection = DigestAlgorithm::select(Some(&args.digest));
    if let Some(name) = &selection.unrecognized {
        warn!(%name, "falling back to {}", selection.algorithm);
    }
    let algorithm = selection.algorithm;

    match args.command {
        Command::Keygen { p, q, form, bits } => {
            let params = match (p, q) {
                (Some(p), Some(q)) => {
                    let (e, d) = derive_ed_decimal(&p, &q)?;
                    Some(validate_or_build_key_decimal(
                        Some(&p),
                        Some(&q),
                        &to_decimal(&e),
                        &to_decimal(&d),
                        None,
                    )?)
                }
                _ => None,
            };

            let (pair, params) = match (form, params) {
                (Form::Json, Some(params)) => (EncodedKeyPair::from_parameters(&params), Some(params)),
                (Form::Native, Some(params)) => (encode_native(&params)?, Some(params)),
                (Form::Json, None) => {
                    let config = KeyGenConfig {
                        prime_bits: bits / 2,
                        ..KeyGenConfig::default()
                    };
                    let params = generate_keypair(&config)?;
                    (EncodedKeyPair::from_parameters(&params), Some(params))
                }
                (Form::Native, None) => (generate_native(bits as usize)?, None),
            };
            if let Some(params) = &params {
                print_parameters(params);
            }

            write_keypair(&pair, &args.key_dir)?;
            write_parameters(params.as_ref(), &args.key_dir)?;
            info!(dir = %args.key_dir.display(), "key pair written");
            Ok(true)
        }
        Command::Derive { p, q } => {
            let (e, d) = derive_ed_decimal(&p, &q)?;
            println!("e: {}", to_decimal(&e));
            println!("d: {}", to_decimal(&d));
            Ok(true)
        }
        Command::Sign { input, output } => {
            let key = read_private_key(&args.key_dir)?;
            let signature = sign_reader(open(&input)?, &key, algorithm)?;

            let output = output.unwrap_or_else(|| signature_path(&input));
            write_signature(&signature, &output)?;
            info!(%algorithm, signature = %output.display(), "signed");
            Ok(true)
        }
        Command::Verify { input, signature } => {
            let key = read_public_key(&args.key_dir)?;
            let signature = read_signature(&signature.unwrap_or_else(|| signature_path(&input)))?;
            let result = verify_reader(open(&input)?, &signature, &key, algorithm)?;

            println!("valid: {}", result.valid);
            println!("{}", result.diagnostic);
            if let Some(kind) = classify(&result) {
                println!("likely cause: {}", kind.describe());
            }
            Ok(result.valid)
        }
        Command::Export {
            name,
            signature_type,
            output,
        } => {
            let pair = read_keypair(&args.key_dir)?;
            let params = match read_parameters(&args.key_dir)? {
                Some(params) => Some(params),
                None => json_parameters(&pair)?,
            };
            let bundle = KeyExport::new(&name, &signature_type, &pair, params.as_ref());
            write_bundle(&bundle, &output)?;
            info!(bundle = %output.display(), "exported");
            Ok(true)
        }
        Command::Import { bundle } => {
            let imported = import_bundle(&fs::read_to_string(&bundle)?)?;
            write_keypair(&imported.export.pair(), &args.key_dir)?;
            write_parameters(Some(&imported.parameters), &args.key_dir)?;
            info!(name = %imported.export.signature_name, "imported");
            Ok(true)
        }
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

/// e and d for a JSON pair without a parameters file; blob pairs carry
/// their own parameters
fn json_parameters(pair: &EncodedKeyPair) -> Result<Option<KeyParameters>> {
    match pair.decode()? {
        (Key::Json(public), Key::Json(private)) => Ok(Some(KeyParameters {
            p: None,
            q: None,
            e: public.exponent,
            d: private.exponent,
            n: public.n,
        })),
        _ => Ok(None),
    }
}

fn print_parameters(params: &KeyParameters) {
    println!("{params}");
    println!("n (hex): {}", to_hex(&params.n.to_bytes_be()));
}
