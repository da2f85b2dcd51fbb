//! Interactive terminal conversation with the assistant persona.
//!
//! The conversation history lives in this process and is resent whole on
//! every turn; the persona instruction never changes between turns.

use crate::provider::{AnthropicClient, Role, Turn};
use marina_common::config::{config_path, Config};
use marina_common::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Persona instruction sent with every completion request.
pub const SYSTEM_PROMPT: &str = r#"Ești asistentul virtual de pe site-ul dr. Marina Cociug — medic pediatru și consultant IBCLC certificat în alăptare.

MISIUNEA TA:
Ajuți mamele să găsească informațiile de care au nevoie și le ghidezi spre serviciul potrivit.

SERVICIILE DR. MARINA (consultații online, £39 fiecare):

1. 🤱 Consultație Alăptare
   - Pentru: mame care au dificultăți cu alăptarea, dureri, producție scăzută, poziții
   - Include: evaluare completă + plan personalizat
   - Potrivit pentru: sarcină tardivă sau după naștere

2. 🥣 Consultație Diversificare
   - Pentru: mame cu bebeluși de ~6 luni, gata de primele alimente solide
   - Include: plan alimentar pe etape, rețete, sfaturi practice
   - Recomandat de la 6 luni

3. 🌙 Consultație Înțărcare
   - Pentru: mame care vor să încheie alăptarea natural și fără stres
   - Include: plan gradual personalizat, suport emoțional
   - La orice vârstă a copilului

4. 💬 Comunitate Telegram
   - Grup privat de suport pentru mame
   - Acces la informații, discuții, și suportul dr. Marina

REGULILE TALE:
- Vorbești în ROMÂNĂ, cald și empatic, ca o prietenă care înțelege
- NU dai sfaturi medicale specifice — ghidezi mereu spre consultație
- Când mama exprimă o problemă concretă, sugerezi serviciul potrivit
- Când mama vrea să se programeze, o direcționezi spre pagina de programare
- Răspunsuri scurte și clare, nu eseuri — mamele sunt ocupate!
- Folosești ocazional emoji-uri relevante, dar nu exagerat
- Sloganul nostru: "Mame citite = mame liniștite" 📚

EXEMPLE DE REDIRECȚIONARE:
- "Vreau să mă programez" → "Poți face programarea aici: marina-cociug.com/programare 📅"
- "Cât costă?" → "Fiecare consultație este £39 și include evaluare completă + plan personalizat."
- "Bebelușul nu vrea să sugă" → Exprimă empatie, apoi sugerează Consultația de Alăptare

IMPORTANT:
Nu inventa informații medicale. Dacă nu știi ceva, spune sincer că dr. Marina poate oferi răspunsul în cadrul unei consultații personalizate."#;

/// Token ceiling per assistant reply.
const MAX_REPLY_TOKENS: i64 = 500;

const EXIT_COMMANDS: &[&str] = &["exit", "quit", "q"];

/// Accumulated conversation state for one terminal session.
#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Submit one user message and append the assistant's reply.
    ///
    /// The pending user turn survives a failure only when that failure is
    /// retriable, so resubmitting the same text after a rate limit does not
    /// append a duplicate.
    pub async fn submit_turn(
        &mut self,
        client: &AnthropicClient,
        user_text: &str,
    ) -> Result<String> {
        let resubmission = matches!(
            self.turns.last(),
            Some(last) if last.role == Role::User && last.content == user_text
        );
        if !resubmission {
            self.turns.push(Turn::user(user_text));
        }

        match client
            .complete(Some(SYSTEM_PROMPT), &self.turns, MAX_REPLY_TOKENS)
            .await
        {
            Ok(reply) => {
                self.turns.push(Turn::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                if !e.is_rate_limited() {
                    self.turns.pop();
                }
                Err(e)
            }
        }
    }
}

/// Run the terminal chat loop.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let client = AnthropicClient::with_base_url(
        &config.anthropic.api_key,
        &config.anthropic.base_url,
        &config.anthropic.model,
    );
    let mut conversation = Conversation::new();

    println!("{}", "=".repeat(55));
    println!("  🤱 Marina AI Chatbot — Versiunea Terminal");
    println!("  Site: marina-cociug.com");
    println!("  Scrie 'exit' pentru a închide");
    println!("{}", "=".repeat(55));
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("👩 Mama: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        if EXIT_COMMANDS.contains(&input.to_lowercase().as_str()) {
            println!("\n🤱 Chatbot: La revedere! Mame citite = mame liniștite! 📚\n");
            break;
        }

        if input.is_empty() {
            continue;
        }

        match conversation.submit_turn(&client, input).await {
            Ok(reply) => println!("\n🤱 Chatbot: {reply}\n"),
            Err(e) if e.is_auth() => {
                println!("\n❌ API key invalid! Verifică configurația.\n");
                println!("   Pași:");
                println!("   1. Du-te la https://console.anthropic.com/");
                println!("   2. Creează un API key");
                println!(
                    "   3. Salvează-l în {} sau exportă ANTHROPIC_API_KEY",
                    config_path().display()
                );
                break;
            }
            Err(e) if e.is_rate_limited() => {
                println!("\n⏳ Prea multe cereri. Așteaptă câteva secunde și încearcă din nou.\n");
            }
            Err(e) => {
                println!("\n❌ Eroare: {e}\n");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> AnthropicClient {
        AnthropicClient::with_base_url("sk-test", server.uri(), "claude-sonnet-4-20250514")
    }

    fn text_reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
    }

    #[tokio::test]
    async fn two_turns_accumulate_alternating_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(text_reply("răspuns"))
            .mount(&server)
            .await;

        let client = client(&server);
        let mut conversation = Conversation::new();

        conversation.submit_turn(&client, "prima").await.unwrap();
        conversation.submit_turn(&client, "a doua").await.unwrap();

        let turns = conversation.turns();
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "prima");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[2].role, Role::User);
        assert_eq!(turns[2].content, "a doua");
        assert_eq!(turns[3].role, Role::Assistant);
    }

    #[tokio::test]
    async fn request_carries_system_and_full_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(text_reply("ok"))
            .mount(&server)
            .await;

        let client = client(&server);
        let mut conversation = Conversation::new();
        conversation.submit_turn(&client, "prima").await.unwrap();
        conversation.submit_turn(&client, "a doua").await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);

        let second: serde_json::Value = requests[1].body_json().unwrap();
        assert_eq!(second["system"], SYSTEM_PROMPT);
        assert_eq!(second["model"], "claude-sonnet-4-20250514");
        assert_eq!(second["max_tokens"], 500);
        let messages = second["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "a doua");
    }

    #[tokio::test]
    async fn rate_limit_keeps_turn_and_resubmission_does_not_duplicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(text_reply("acum merge"))
            .mount(&server)
            .await;

        let client = client(&server);
        let mut conversation = Conversation::new();

        let err = conversation.submit_turn(&client, "salut").await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(conversation.len(), 1);

        let reply = conversation.submit_turn(&client, "salut").await.unwrap();
        assert_eq!(reply, "acum merge");
        assert_eq!(conversation.len(), 2);

        let requests = server.received_requests().await.unwrap();
        let retried: serde_json::Value = requests[1].body_json().unwrap();
        assert_eq!(retried["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn generic_failure_rolls_back_pending_turn() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client(&server);
        let mut conversation = Conversation::new();

        assert!(conversation.submit_turn(&client, "salut").await.is_err());
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn auth_failure_is_detectable_and_rolls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client(&server);
        let mut conversation = Conversation::new();

        let err = conversation.submit_turn(&client, "salut").await.unwrap_err();
        assert!(err.is_auth());
        assert!(conversation.is_empty());
    }
}
