use anyhow::{Context, Result};
use clap::Parser;
use flowgate_crypto::RsaKeyPairManager;

const SEPARATOR: &str =
    "================================================================================";

/// Generates the RSA-2048 key pair for the flow endpoint.
///
/// The private key goes into the endpoint's .env file, passphrase-protected;
/// the public key is uploaded to the platform, which uses it to wrap the
/// per-request symmetric keys.
#[derive(Parser)]
struct Args {
    /// Passphrase protecting the generated private key
    passphrase: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let key_manager = RsaKeyPairManager::generate().context("Failed to generate RSA key pair")?;
    let private_pem = key_manager
        .private_key_encrypted_pem(&args.passphrase)
        .context("Failed to encrypt private key")?;
    let public_pem = key_manager
        .public_key_pem()
        .context("Failed to serialize public key")?;

    println!("Successfully created your public private key pair!");
    println!();
    println!("{SEPARATOR}");
    println!("COPY PASSPHRASE & PRIVATE KEY BELOW TO .env FILE");
    println!("{SEPARATOR}");
    println!("PASSPHRASE=\"{}\"", args.passphrase);
    println!();
    println!("PRIVATE_KEY=\"{private_pem}\"");
    println!("{SEPARATOR}");
    println!();
    println!("{SEPARATOR}");
    println!("COPY PUBLIC KEY BELOW AND UPLOAD TO THE PLATFORM");
    println!("{SEPARATOR}");
    println!("{public_pem}");
    println!("{SEPARATOR}");

    Ok(())
}
