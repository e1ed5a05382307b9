use chat_client::api::HttpChatApi;
use chat_client::config::ClientConfig;
use chat_client::store::FileStore;
use chat_client::view::ChatView;
use chat_client::ChatSession;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Transcript on stdout; logs go to stderr.
struct TerminalView {
    input_enabled: AtomicBool,
    quota_timer: Mutex<Option<String>>,
}

impl TerminalView {
    fn new() -> Self {
        Self {
            input_enabled: AtomicBool::new(true),
            quota_timer: Mutex::new(None),
        }
    }

    fn quota_timer(&self) -> Option<String> {
        self.quota_timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled.load(Ordering::SeqCst)
    }
}

impl ChatView for TerminalView {
    fn show_user_message(&self, text: &str) {
        println!("you> {}", text);
    }

    fn show_bot_message(&self, text: &str) {
        println!("bot> {}", text);
    }

    fn show_error(&self, message: &str) {
        println!("[error] {}", message);
    }

    fn show_quota_notice(&self, message: &str) {
        println!("[quota] {}", message);
    }

    fn show_typing(&self) {
        print!("bot is typing...\r");
        let _ = std::io::stdout().flush();
    }

    fn hide_typing(&self) {
        print!("                \r");
        let _ = std::io::stdout().flush();
    }

    fn set_input_enabled(&self, enabled: bool) {
        self.input_enabled.store(enabled, Ordering::SeqCst);
    }

    fn show_retry_countdown(&self, seconds_left: u64) {
        print!("[quota] retry available in {:>3}s\r", seconds_left);
        let _ = std::io::stdout().flush();
    }

    fn clear_retry_countdown(&self) {
        println!("                                  ");
    }

    fn show_quota_timer(&self, remaining: &str) {
        let mut timer = self
            .quota_timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if timer.is_none() {
            println!("[quota] daily quota resets in {}", remaining);
        }
        *timer = Some(remaining.to_string());
    }

    fn hide_quota_timer(&self) {
        self.quota_timer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
    }
}

/// One line of terminal input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Quota,
    Endpoint(&'a str),
    Unknown(&'a str),
    Empty,
    Message(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if !line.starts_with('/') {
            return Command::Message(line);
        }

        let (name, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(name, arg)| (name, arg.trim()));
        match name {
            "/quit" => Command::Quit,
            "/quota" => Command::Quota,
            "/endpoint" => Command::Endpoint(arg),
            _ => Command::Unknown(name),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = ClientConfig::load()?;
    let store = Arc::new(FileStore::open(&config.store_path)?);
    let transport = Arc::new(HttpChatApi::new(config.request_timeout())?);
    let view = Arc::new(TerminalView::new());

    let session = ChatSession::new(transport, view.clone(), store, config.api_url.clone());

    println!("Connected to {}", session.endpoint());
    println!("Commands: /endpoint <url>, /quota, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Quit => break,
            Command::Quota => match view.quota_timer() {
                Some(remaining) => println!("[quota] daily quota resets in {}", remaining),
                None => println!("[quota] no active quota window"),
            },
            Command::Endpoint(url) => match session.set_endpoint(url) {
                Ok(()) => println!("Endpoint set to {}", session.endpoint()),
                Err(e) => println!("[error] {}", e),
            },
            Command::Unknown(name) => println!("[error] unknown command {}", name),
            Command::Empty => {}
            Command::Message(text) => {
                if !view.input_enabled() {
                    println!("[quota] please wait for the countdown to finish");
                    continue;
                }
                session.send_message(text).await;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse(" /quota "), Command::Quota);
        assert_eq!(
            Command::parse("/endpoint   http://localhost:4000 "),
            Command::Endpoint("http://localhost:4000")
        );
        assert_eq!(Command::parse("/endpoint"), Command::Endpoint(""));
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("hello there"), Command::Message("hello there"));
    }

    #[test]
    fn test_glued_endpoint_is_not_a_command() {
        assert_eq!(
            Command::parse("/endpointhttp://evil.test"),
            Command::Unknown("/endpointhttp://evil.test")
        );
    }
}
