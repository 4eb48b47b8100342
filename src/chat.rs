use anyhow::Result;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};

use aicounsel_core::{ChatRole, ChatSession, Turn};

pub fn print_turn(turn: &Turn) {
    match turn.role {
        ChatRole::User => println!("{} {}", "あなた:".bold().cyan(), turn.text),
        ChatRole::Assistant => println!("{} {}", "AI:".bold().magenta(), turn.text),
        ChatRole::System => println!("{}", turn.text.dimmed()),
    }
}

/// Line-oriented chat loop over stdin.
pub async fn run(mut session: ChatSession, voice: bool) -> Result<()> {
    let restored = session.restore().await;
    for turn in session.turns() {
        print_turn(turn);
    }
    if restored > 0 {
        println!("{}", "─".repeat(30).dimmed());
    }
    println!("{}", "話しかけてください (/quit で終了, /replay で再生)".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_save = None;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/replay" => {
                match session.speech() {
                    Some(speech) => {
                        if let Err(e) = speech.replay().await {
                            println!("{}", e.to_string().yellow());
                        }
                    }
                    None => println!("{}", "Voice mode is off".yellow()),
                }
                continue;
            }
            _ => {}
        }

        println!("{}", "...".dimmed());
        let exchange = if voice {
            session.send_voice(input).await?
        } else {
            session.send(input).await?
        };

        if let Some(e) = &exchange.failure {
            tracing::info!(error = %e, "Reply replaced with fallback");
        }
        print_turn(&Turn::assistant(exchange.reply));
        pending_save = Some(exchange.save);
    }

    // Let the last save land before the runtime shuts down
    if let Some(save) = pending_save {
        if let Err(e) = save.await {
            tracing::warn!(error = %e, "Log save task did not finish");
        }
    }
    Ok(())
}
