//! Connectivity self-check for the Anthropic credential.
//!
//! Run before the chat to confirm the key works. A missing or placeholder
//! key fails immediately with setup instructions, before any request is
//! made.

use crate::provider::{AnthropicClient, Turn};
use marina_common::config::{config_path, Config};
use marina_common::{Error, Result, ResultExt};

/// Canned prompt whose reply proves the round trip works.
const TEST_PROMPT: &str = "Spune 'Salut! Conexiunea funcționează! 🎉' și nimic altceva.";

/// Token ceiling for the one-sentence canned reply.
const TEST_MAX_TOKENS: i64 = 100;

/// Keys copied from the setup template start with this prefix.
const PLACEHOLDER_KEY_PREFIX: &str = "sk-ant-api03-XXXX";

/// Check that an API key is present and not the setup-template placeholder.
pub fn validate_api_key(api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() || api_key.starts_with(PLACEHOLDER_KEY_PREFIX) {
        return Err(Error::Config(
            "API key missing or still the placeholder".into(),
        ));
    }
    Ok(())
}

/// Run the self-check and return the provider's raw reply text.
///
/// No request is issued when the credential fails validation.
pub async fn run_check(config: &Config) -> Result<String> {
    validate_api_key(&config.anthropic.api_key)?;
    probe(config).await.context("Connectivity check failed")
}

async fn probe(config: &Config) -> Result<String> {
    let client = AnthropicClient::with_base_url(
        &config.anthropic.api_key,
        &config.anthropic.base_url,
        &config.anthropic.model,
    );
    client
        .complete(None, &[Turn::user(TEST_PROMPT)], TEST_MAX_TOKENS)
        .await
}

/// Run the self-check, printing a verdict. Exits non-zero on any failure.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    if let Err(e) = validate_api_key(&config.anthropic.api_key) {
        println!("❌ API key lipsește sau e cel default!");
        println!();
        println!("Ce trebuie să faci:");
        println!("  1. Du-te la https://console.anthropic.com/");
        println!("  2. Creează un cont (sau loghează-te)");
        println!("  3. Settings → API Keys → Create Key");
        println!("  4. Salvează key-ul în {}:", config_path().display());
        println!("     {{\"anthropic\": {{\"api_key\": \"sk-ant-api03-cheia-ta-aici\"}}}}");
        println!();
        println!("📌 Poți folosi și variabila de mediu ANTHROPIC_API_KEY");
        return Err(e.into());
    }

    let preview: String = config.anthropic.api_key.chars().take(20).collect();
    println!("✅ API key găsit!");
    println!("   Primele caractere: {preview}...");
    println!();

    println!("📡 Trimit mesaj de test la Claude...");
    println!();

    match probe(config).await {
        Ok(reply) => {
            println!("🤖 Claude: {reply}");
            println!();
            println!("{}", "=".repeat(45));
            println!("  ✅ TOTUL FUNCȚIONEAZĂ!");
            println!("  Acum poți rula: marina chat");
            println!("{}", "=".repeat(45));
            Ok(())
        }
        Err(e) if e.is_auth() => {
            println!("❌ API key-ul e invalid! Verifică din nou.");
            Err(e.into())
        }
        Err(e) => {
            println!("❌ Eroare: {e}");
            Err(e.into())
        }
    }
}
