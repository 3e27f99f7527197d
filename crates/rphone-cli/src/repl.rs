//! A line-oriented shell over [`CallEngine`], the interactive surface this
//! demo host exposes while `--new-identity`/`--show-identity` aren't in
//! play. Every command maps onto exactly one public `CallEngine` method;
//! this module owns no call-control logic of its own.

use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};

use rphone_engine::CallEngine;
use rphone_identity::NodeId;

const HELP: &str = "\
commands:
  call <node_id> [display name...]   start an outgoing call
  accept                              accept the ringing incoming call
  reject                              reject the ringing incoming call
  hangup                              end the current call
  sas-match                           confirm the spoken SAS code matches
  sas-mismatch                        the SAS code did not match; hang up
  peers                               list known peers
  status                              show the current call phase
  help                                show this text
  quit                                exit
";

pub async fn run(engine: CallEngine) -> anyhow::Result<()> {
    println!("{HELP}");
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, char::is_whitespace);
        let cmd = parts.next().unwrap_or("");
        let rest = parts.next().unwrap_or("").trim();

        match cmd {
            "call" => handle_call(&engine, rest).await,
            "accept" => report(engine.accept_incoming().await),
            "reject" => report(engine.reject_incoming().await),
            "hangup" => report(engine.hangup().await),
            "sas-match" => report(engine.acknowledge_sas_match().await),
            "sas-mismatch" => report(engine.hangup().await),
            "peers" => print_peers(&engine),
            "status" => println!("phase: {:?}", engine.phase().await),
            "help" => println!("{HELP}"),
            "quit" | "exit" => break,
            other => println!("unknown command {other:?}; try `help`"),
        }
    }

    Ok(())
}

async fn handle_call(engine: &CallEngine, rest: &str) {
    let mut parts = rest.splitn(2, char::is_whitespace);
    let Some(id_str) = parts.next().filter(|s| !s.is_empty()) else {
        println!("usage: call <node_id> [display name...]");
        return;
    };
    let remote_id = match NodeId::from_str(id_str) {
        Ok(id) => id,
        Err(e) => {
            println!("invalid node_id: {e}");
            return;
        }
    };
    let display_name = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
    match engine.start_outgoing(remote_id, display_name).await {
        Ok(call_id) => println!("calling {remote_id} (call {call_id})"),
        Err(e) => println!("call failed: {e}"),
    }
}

fn print_peers(engine: &CallEngine) {
    let peers = engine.directory().snapshot();
    if peers.is_empty() {
        println!("(no peers announced yet)");
        return;
    }
    for peer in peers {
        let flags = match (peer.verified, peer.blocked) {
            (true, true) => " [verified, blocked]",
            (true, false) => " [verified]",
            (false, true) => " [blocked]",
            (false, false) => "",
        };
        println!("{} {}{}", peer.node_id, peer.display_name, flags);
    }
}

fn report<T>(result: Result<T, rphone_engine::EngineError>) {
    if let Err(e) = result {
        println!("error: {e}");
    }
}
