//! Interactive chat command.
//!
//! Lines typed on stdin are sent as chat messages; server messages are
//! printed as `[user]: message`. `exit` or `quit` leaves the chat, Ctrl+C
//! aborts it.

use std::io;
use std::thread::JoinHandle;

use anyhow::{Context, Result};
use console::style;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use courier_core::chat::CloseReason;
use courier_types::chat::{is_sentinel, ChatMessage};

use crate::client::RemoteClient;

/// Chat as the logged-in user until either side ends the session.
///
/// With `reclaim_input`, a stdin reader still blocked when the server ends
/// the chat is waited for, so the next prompt gets the terminal back.
pub async fn chat(client: &RemoteClient, json: bool, reclaim_input: bool) -> Result<()> {
    let user = client
        .credentials()
        .map(|c| c.client_id.clone())
        .context("not logged in; run `courier login` first")?;

    if !json {
        println!();
        println!(
            "  {} Chatting as {}. Type {} or {} to leave.",
            style("💬").bold(),
            style(&user).cyan(),
            style("exit").bold(),
            style("quit").bold()
        );
        println!();
    }

    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let reader = spawn_line_reader(|buf| io::stdin().read_line(buf), line_tx);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ChatMessage>();
    let printer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            print_message(&message, json);
        }
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = client
        .chat(UnboundedReceiverStream::new(line_rx), out_tx, cancel)
        .await;
    ctrl_c.abort();
    let _ = printer.await;

    if reclaim_input && !reader.is_finished() {
        if !json {
            println!("  {}", style("Press Enter to continue.").dim());
        }
        if tokio::task::spawn_blocking(move || reader.join()).await.is_err() {
            tracing::warn!("chat input reader did not shut down cleanly");
        }
    }
    let summary = result?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        let how = match summary.close_reason {
            CloseReason::PeerHalfClosed | CloseReason::Sentinel => "Chat ended",
            CloseReason::PeerDisconnected => "Server disconnected",
            CloseReason::Cancelled => "Chat cancelled",
            CloseReason::TransportError => "Chat failed",
        };
        println!();
        println!(
            "  {} ({} sent, {} received)",
            style(how).dim(),
            summary.sent,
            summary.received
        );
    }
    Ok(())
}

fn print_message(message: &ChatMessage, json: bool) {
    if json {
        match serde_json::to_string(message) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to encode chat message"),
        }
    } else {
        println!("[{}]: {}", style(&message.user).cyan(), message.message);
    }
}

/// Forward lines from `read_line` on a plain OS thread.
///
/// Stops at end of input, after a sentinel line, or once the chat has gone
/// away. A line read after the chat ended is dropped.
fn spawn_line_reader<R>(mut read_line: R, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: FnMut(&mut String) -> io::Result<usize> + Send + 'static,
{
    std::thread::spawn(move || {
        let mut line = String::new();
        while !tx.is_closed() {
            line.clear();
            match read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let text = line.trim_end_matches(['\r', '\n']).to_string();
            let last = is_sentinel(&text);
            if tx.send(text).is_err() || last {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, Cursor};
    use std::sync::{Arc, Mutex};

    type SharedInput = Arc<Mutex<Cursor<Vec<u8>>>>;

    fn input(text: &str) -> SharedInput {
        Arc::new(Mutex::new(Cursor::new(text.as_bytes().to_vec())))
    }

    fn reader_over(input: &SharedInput, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()> {
        let input = Arc::clone(input);
        spawn_line_reader(move |buf| input.lock().unwrap().read_line(buf), tx)
    }

    fn unread(input: &SharedInput) -> String {
        let mut rest = String::new();
        input.lock().unwrap().read_line(&mut rest).unwrap();
        rest
    }

    #[test]
    fn reader_stops_after_sentinel() {
        let stdin = input("hello\r\nquit\nback at the menu\n");
        let (tx, mut rx) = mpsc::unbounded_channel();
        reader_over(&stdin, tx).join().unwrap();

        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, ["hello", "quit"]);
        assert_eq!(unread(&stdin), "back at the menu\n");
    }

    #[test]
    fn reader_leaves_input_alone_once_chat_is_gone() {
        let stdin = input("1\n");
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        reader_over(&stdin, tx).join().unwrap();
        assert_eq!(unread(&stdin), "1\n");
    }

    #[test]
    fn reader_stops_at_end_of_input() {
        let stdin = input("only line");
        let (tx, mut rx) = mpsc::unbounded_channel();
        reader_over(&stdin, tx).join().unwrap();
        assert_eq!(rx.try_recv().unwrap(), "only line");
        assert!(rx.try_recv().is_err());
    }
}
