//! Token commands.
//!
//! `passport token sign` - Sign a token for a user.
//! `passport token verify` - Verify a token and print its claims.
//! `passport token inspect` - Decode a token without verifying it.

use anyhow::Context;
use passport_core::{Claims, PassportConfig, Token, parse_duration};
use passport_token::{
    RsaTokenParser, RsaTokenSigner, TokenParser, TokenSigner, inspect_token_unverified,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Load the optional configuration file.
fn load_config(path: Option<&Path>) -> anyhow::Result<Option<PassportConfig>> {
    path.map(|p| {
        PassportConfig::load(p)
            .with_context(|| format!("Failed to load configuration from: {}", p.display()))
    })
    .transpose()
}

/// Read key material from a file path, or take it verbatim if it is inline PEM.
fn read_key(key: &str) -> anyhow::Result<String> {
    let path = Path::new(key);
    if path.exists() {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()));
    }
    if key.trim_start().starts_with("-----BEGIN") {
        return Ok(key.to_string());
    }
    anyhow::bail!("Key file not found: {}", path.display())
}

/// Build a signer from `--key` / `PASSPORT_PRIVATE_KEY`, falling back to the config file.
fn resolve_signer(
    private_key: Option<String>,
    config: Option<&PassportConfig>,
) -> anyhow::Result<RsaTokenSigner> {
    match (private_key, config) {
        (Some(key), config) => {
            let pem = read_key(&key)?;
            let signer = RsaTokenSigner::from_pem(pem.as_bytes())
                .context("Failed to parse private key. Expected a PEM-encoded RSA private key")?;
            match config {
                Some(config) => Ok(signer.with_default_ttl(config.token.default_ttl()?)),
                None => Ok(signer),
            }
        }
        (None, Some(config)) => RsaTokenSigner::from_config(&config.token)
            .context("Failed to load private key from configuration"),
        (None, None) => anyhow::bail!(
            "Private key not provided. Either pass --key <path> or set PASSPORT_PRIVATE_KEY env var"
        ),
    }
}

/// Build a parser from `--key` / `PASSPORT_PUBLIC_KEY`, falling back to the config file.
fn resolve_parser(
    public_key: Option<String>,
    config: Option<&PassportConfig>,
) -> anyhow::Result<RsaTokenParser> {
    match (public_key, config) {
        (Some(key), config) => {
            let pem = read_key(&key)?;
            let parser = RsaTokenParser::from_pem(pem.as_bytes())
                .context("Failed to parse public key. Expected a PEM-encoded RSA public key")?;
            Ok(match config {
                Some(config) => parser.with_leeway(config.token.leeway_secs()?),
                None => parser,
            })
        }
        (None, Some(config)) => RsaTokenParser::from_config(&config.token)
            .context("Failed to load public key from configuration"),
        (None, None) => anyhow::bail!(
            "Public key not provided. Either pass --key <path> or set PASSPORT_PUBLIC_KEY env var"
        ),
    }
}

/// Take the token verbatim, or read it from a file if the argument is a path.
fn read_token(token: String) -> anyhow::Result<Token> {
    if Path::new(&token).exists() {
        let raw = fs::read_to_string(&token)
            .with_context(|| format!("Failed to read token file: {}", token))?;
        return Ok(Token::new(raw.trim()));
    }
    Ok(Token::new(token))
}

/// Sign a token for `user_id`.
pub fn sign(
    private_key: Option<String>,
    config: Option<PathBuf>,
    user_id: u64,
    ttl: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let signer = resolve_signer(private_key, config.as_ref())?;

    let ttl = match &ttl {
        Some(ttl) => parse_duration(ttl)?,
        None => signer.default_ttl(),
    };
    let token = signer.sign(&Claims::new(user_id), ttl)?;
    tracing::debug!(user_id, %ttl, "Token signed");

    if let Some(output_path) = output {
        fs::write(&output_path, token.as_str())
            .with_context(|| format!("Failed to write token to: {}", output_path.display()))?;
        println!("✔ Token written to: {}", output_path.display());
        println!("  User: {}", user_id);
        if let Some(expires_at) = inspect_token_unverified(&token)?.expires_at {
            println!("  Expires: {}", expires_at);
        }
    } else {
        println!("{}", token);
    }

    Ok(())
}

/// Verify a token and print its claims.
///
/// Fails when the token does not verify, so the process exits non-zero.
pub fn verify(
    public_key: Option<String>,
    config: Option<PathBuf>,
    token: String,
) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let parser = resolve_parser(public_key, config.as_ref())?;
    let token = read_token(token)?;

    match parser.parse(&token) {
        Ok(claims) => {
            println!("✔ Token is valid");
            println!();
            println!("Token Details:");
            println!("  User: {}", claims.user_id);
            Ok(())
        }
        Err(e) => {
            println!("✖ Token verification failed: {}", e);
            if let Some(code) = e.code() {
                println!("  Code: {}", code);
            }
            Err(e).context("Token verification failed")
        }
    }
}

/// Decode a token without verifying it.
pub fn inspect(token: String) -> anyhow::Result<()> {
    let token = read_token(token)?;
    let info = inspect_token_unverified(&token)?;

    println!("Token Information (unverified):");
    println!("  Algorithm: {:?}", info.algorithm);
    println!(
        "  Subject: {}",
        info.subject.as_deref().unwrap_or("(none)")
    );
    match info.expires_at {
        Some(at) if info.is_expired() => println!("  Expires: {} (expired)", at),
        Some(at) => println!("  Expires: {}", at),
        None => println!("  Expires: (none)"),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&info.payload)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PRIVATE_KEY: &str = include_str!("../../../passport-token/tests/fixtures/signing_key.pem");
    const PUBLIC_KEY: &str =
        include_str!("../../../passport-token/tests/fixtures/signing_key.pub.pem");
    const OTHER_PUBLIC_KEY: &str =
        include_str!("../../../passport-token/tests/fixtures/other_key.pub.pem");

    fn write_keys(dir: &Path) -> (String, String) {
        let private_path = dir.join("private.pem");
        let public_path = dir.join("public.pem");
        fs::write(&private_path, PRIVATE_KEY).unwrap();
        fs::write(&public_path, PUBLIC_KEY).unwrap();
        (
            private_path.to_string_lossy().to_string(),
            public_path.to_string_lossy().to_string(),
        )
    }

    #[test]
    fn test_sign_then_verify_with_key_files() {
        let dir = tempdir().unwrap();
        let (private_key, public_key) = write_keys(dir.path());
        let token_path = dir.path().join("token.jwt");

        sign(Some(private_key), None, 42, Some("5m".to_string()), Some(token_path.clone())).unwrap();

        assert!(token_path.exists());
        let token = fs::read_to_string(&token_path).unwrap();
        assert_eq!(token.split('.').count(), 3);

        verify(Some(public_key), None, token_path.to_string_lossy().to_string()).unwrap();
    }

    #[test]
    fn test_inline_pem_keys() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.jwt");

        sign(Some(PRIVATE_KEY.to_string()), None, 1, None, Some(token_path.clone())).unwrap();

        let token = fs::read_to_string(&token_path).unwrap();
        verify(Some(PUBLIC_KEY.to_string()), None, token).unwrap();
    }

    #[test]
    fn test_verify_rejects_expired_token() {
        let dir = tempdir().unwrap();
        let (private_key, public_key) = write_keys(dir.path());
        let token_path = dir.path().join("token.jwt");

        sign(Some(private_key), None, 7, Some("-1m".to_string()), Some(token_path.clone())).unwrap();

        let err = verify(Some(public_key), None, token_path.to_string_lossy().to_string())
            .unwrap_err();
        let token_err = err.downcast_ref::<passport_token::TokenError>().unwrap();
        assert!(token_err.is_token_expired());
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.jwt");
        sign(Some(PRIVATE_KEY.to_string()), None, 7, None, Some(token_path.clone())).unwrap();

        let token = fs::read_to_string(&token_path).unwrap();
        assert!(verify(Some(OTHER_PUBLIC_KEY.to_string()), None, token).is_err());
    }

    #[test]
    fn test_missing_key_is_reported() {
        let err = sign(None, None, 1, None, None).unwrap_err();
        assert!(err.to_string().contains("PASSPORT_PRIVATE_KEY"));

        let err = verify(None, None, "abc".to_string()).unwrap_err();
        assert!(err.to_string().contains("PASSPORT_PUBLIC_KEY"));
    }

    #[test]
    fn test_keys_from_config_file() {
        let dir = tempdir().unwrap();
        let (private_key, public_key) = write_keys(dir.path());
        let config_path = dir.path().join("passport.yaml");
        fs::write(
            &config_path,
            format!(
                "token:\n  private_key_file: {}\n  public_key_file: {}\n  default_ttl: 1h\n",
                private_key, public_key
            ),
        )
        .unwrap();
        let token_path = dir.path().join("token.jwt");

        sign(None, Some(config_path.clone()), 9, None, Some(token_path.clone())).unwrap();
        verify(None, Some(config_path), token_path.to_string_lossy().to_string()).unwrap();
    }

    #[test]
    fn test_config_leeway_out_of_range_is_reported() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("passport.yaml");
        fs::write(&config_path, "token:\n  leeway_secs: 10000000\n").unwrap();

        let err = verify(Some(PUBLIC_KEY.to_string()), Some(config_path), "abc".to_string())
            .unwrap_err();
        assert!(err.to_string().contains("leeway"));
    }

    #[test]
    fn test_inspect_token_file() {
        let dir = tempdir().unwrap();
        let token_path = dir.path().join("token.jwt");
        sign(Some(PRIVATE_KEY.to_string()), None, 3, None, Some(token_path.clone())).unwrap();

        inspect(token_path.to_string_lossy().to_string()).unwrap();
        assert!(inspect("not-a-token".to_string()).is_err());
    }

    #[test]
    fn test_invalid_ttl() {
        let err = sign(Some(PRIVATE_KEY.to_string()), None, 1, Some("soon".to_string()), None);
        assert!(err.is_err());
    }
}
