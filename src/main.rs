// ── Banter Terminal Client ─────────────────────────────────────────────────
// The stand-in for the excluded login/DOM glue: takes an already-authenticated
// identity from the command line, runs one chat session, and renders the log
// to stdout. `/who` prints the roster, `/quit` closes the session.

use banter::{
    ChatError, ChatMessage, ChatResult, ChatSession, Identity, LogEntry, Renderer, SessionState,
    WsTransport,
};
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "banter", version, about = "Terminal client for a banter chat server")]
struct Args {
    /// Chat server endpoint (ws:// or wss://)
    #[arg(long, env = "BANTER_SERVER", default_value = "ws://127.0.0.1:3939/ws")]
    server: String,

    /// Username to join as
    #[arg(long, env = "BANTER_USERNAME")]
    username: String,

    /// Session token from the login flow, if the server requires one
    #[arg(long, env = "BANTER_TOKEN")]
    token: Option<String>,
}

// ── Terminal renderer ──────────────────────────────────────────────────────

struct TerminalRenderer {
    own_username: String,
}

impl TerminalRenderer {
    fn print_message(&self, message: &ChatMessage) {
        let when = message.timestamp.with_timezone(&Local).format("%H:%M:%S");
        let marker = if message.user == self.own_username { " (you)" } else { "" };
        println!("[{when}] {}{marker}: {}", message.user, message.message);
    }
}

impl Renderer for TerminalRenderer {
    fn entry(&mut self, entry: &LogEntry) {
        match entry {
            LogEntry::Message(m) => self.print_message(m),
            LogEntry::System(line) => println!("* {line}"),
            LogEntry::Error(line) => println!("! {line}"),
        }
    }

    fn history(&mut self, entries: &[LogEntry]) {
        println!("--- {} message(s) of history ---", entries.len());
        for entry in entries {
            self.entry(entry);
        }
    }

    fn roster(&mut self, users: &[String]) {
        println!("* {} online: {}", users.len(), users.join(", "));
    }
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ChatResult<()> {
    env_logger::init();
    let args = Args::parse();

    let identity = Identity {
        username: args.username.clone(),
        session_token: args.token.clone(),
    };
    let transport = Arc::new(WsTransport::new(args.token));
    let renderer = TerminalRenderer { own_username: args.username.clone() };
    let session = ChatSession::new(transport, Box::new(renderer));

    session.start(identity, &args.server).await?;
    println!("* Joining {} as {} (/who lists users, /quit exits)", args.server, args.username);

    let mut state_rx = session.state_watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Ok(Some(line)) = line else {
                    // stdin closed
                    session.close().await;
                    break;
                };
                match line.trim() {
                    "/quit" => {
                        session.close().await;
                        break;
                    }
                    "/who" => {
                        let roster = session.roster();
                        println!("* {} online: {}", roster.len(), roster.join(", "));
                    }
                    text => match session.submit_message(text).await {
                        Ok(()) => {}
                        Err(ChatError::NotConnected) => {
                            println!("! Not connected yet, message not sent");
                        }
                        Err(e) => println!("! Send failed: {e}"),
                    },
                }
            }
            changed = state_rx.changed() => {
                if changed.is_err() || *state_rx.borrow() == SessionState::Closed {
                    println!("* Session closed");
                    break;
                }
            }
        }
    }

    Ok(())
}
