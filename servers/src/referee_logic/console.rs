//! Operator console: line commands on stdin and the periodic status line.

use lib_referee::core::display::headline;
use lib_referee::core::{OfficiatingCommand, Referee, Side};
use std::io::BufRead;
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

pub const HELP: &str = "\
commands:
  reset                  fresh match, both health values restored
  arm <secs>             arm the countdown with <secs> of lead time
  arm2m | arm30 | arm5   arm with a 120s / 30s / 5s lead
  draw                   declare a draw
  redcard <red|blue>     the carded side loses
  yellow <red|blue>      yellow card warning
  resethp <red|blue>     order a health reset for one side
  name <red|blue> <text> rename a team
  status                 print the current match status
  help                   this text
  quit                   shut the console down";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Officiate(OfficiatingCommand),
    Status,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim().to_ascii_lowercase().as_str() {
            "status" | "s" => Ok(ConsoleCommand::Status),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "exit" | "q" => Ok(ConsoleCommand::Quit),
            _ => line.parse().map(ConsoleCommand::Officiate),
        }
    }
}

/// Headline plus one line per side.
pub fn status_report(referee: &Referee) -> String {
    let record = referee.snapshot();
    let mut out = headline(&record);
    for side in Side::ALL {
        out.push('\n');
        out.push_str(&referee.team_status(side).line());
    }
    out
}

/// Applies one console line. Returns false once the operator asked to quit.
pub fn execute(referee: &Referee, line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    match line.parse::<ConsoleCommand>() {
        Ok(ConsoleCommand::Officiate(cmd)) => {
            log::info!("Console command: {:?}", cmd);
            match referee.apply(cmd) {
                Ok(()) => println!("{}", headline(&referee.snapshot())),
                Err(e) => {
                    log::warn!("{}", e);
                    println!("{}", e);
                }
            }
        }
        Ok(ConsoleCommand::Status) => println!("{}", status_report(referee)),
        Ok(ConsoleCommand::Help) => println!("{}", HELP),
        Ok(ConsoleCommand::Quit) => return false,
        Err(e) => println!("{} (type 'help')", e),
    }
    true
}

/// Forwards stdin lines from a plain OS thread. A blocking read there never
/// holds up runtime shutdown; the thread simply dies with the process.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("console-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        log::error!("Console read failed: {}", e);
                        return;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        log::error!("Cannot start console reader: {}", e);
    }
    rx
}

/// Applies console lines until `quit`, end of input or shutdown.
/// `quit` fires the shared shutdown channel.
pub async fn run_console(
    referee: Referee,
    mut lines: mpsc::Receiver<String>,
    mut shutdown: broadcast::Receiver<()>,
    shutdown_tx: broadcast::Sender<()>,
) {
    println!("{}", HELP);

    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            line = lines.recv() => match line {
                Some(line) => {
                    if !execute(&referee, &line) {
                        log::info!("Quit requested from console.");
                        let _ = shutdown_tx.send(());
                        return;
                    }
                }
                None => {
                    log::info!("Console input closed; continuing without it.");
                    return;
                }
            }
        }
    }
}

pub async fn run_status_line(referee: Referee, every: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.recv() => return,
            _ = ticker.tick() => {
                for line in status_report(&referee).lines() {
                    log::info!("{}", line);
                }
            }
        }
    }
}
