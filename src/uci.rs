//! The universal-chess-interface text loop. One command per line in,
//! `info`/`bestmove`/`readyok` lines out. Searches run on their own
//! thread so `stop` and `ponderhit` stay responsive; malformed input is
//! rejected with a single warning and the prior state is kept.

use crate::book::{BookSettings, OpeningBook};
use crate::movegen::{self, Move};
use crate::position::Position;
use crate::search::Engine;
use crate::search::driver::{SearchClock, SearchInfo, SearchLimits};
use crate::tablebase::{Tablebase, TbSettings};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

pub const ENGINE_NAME: &str = "Meridian";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

struct ActiveSearch {
    clock: Arc<SearchClock>,
    handle: JoinHandle<()>,
}

pub struct UciSession {
    engine: Engine,
    active: Option<ActiveSearch>,
    book_settings: BookSettings,
    book: Option<Box<dyn OpeningBook>>,
    tb_settings: TbSettings,
    tablebase: Option<Box<dyn Tablebase>>,
}

impl UciSession {
    pub fn new() -> Self {
        UciSession {
            engine: Engine::new(),
            active: None,
            book_settings: BookSettings::default(),
            book: None,
            tb_settings: TbSettings::default(),
            tablebase: None,
        }
    }

    /// Installs an opening-book collaborator.
    pub fn set_book(&mut self, book: Box<dyn OpeningBook>) {
        self.book = Some(book);
    }

    /// Installs a tablebase collaborator.
    pub fn set_tablebase(&mut self, tb: Box<dyn Tablebase>) {
        self.tablebase = Some(tb);
    }

    /// Reads commands until `quit` or end of input.
    pub fn run(&mut self) {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => break,
            }
            if !self.handle_line(line.trim()) {
                break;
            }
        }
        self.stop_search();
    }

    /// Handles one command line; returns false on `quit`.
    pub fn handle_line(&mut self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "uci" => self.cmd_uci(),
            "isready" => println!("readyok"),
            "ucinewgame" => {
                self.stop_search();
                self.engine.new_game();
            }
            "position" => self.cmd_position(&parts),
            "go" => self.cmd_go(&parts),
            "stop" => self.stop_search(),
            "ponderhit" => {
                if let Some(active) = &self.active {
                    active.clock.ponderhit();
                }
            }
            "setoption" => self.cmd_setoption(&parts),
            "d" | "display" => println!("{}", self.engine.pos),
            "quit" => return false,
            _ => warn!(command = parts[0], "ignoring unknown command"),
        }
        true
    }

    fn cmd_uci(&self) {
        println!("id name {} {}", ENGINE_NAME, ENGINE_VERSION);
        println!("id author the {} authors", ENGINE_NAME);
        println!("option name Hash type spin default 64 min 1 max 4096");
        println!("option name Clear Hash type button");
        println!("option name Threads type spin default 1 min 1 max 64");
        println!("option name Ponder type check default false");
        println!("option name OwnBook type check default false");
        println!("option name Book File type string default book.bin");
        println!("option name Nullmove type check default true");
        println!("option name GaviotaTbPath type string default ");
        println!("option name GaviotaTbCache type spin default 32 min 1 max 1024");
        println!("option name GaviotaTbScheme type string default cp4");
        println!("option name TB Pieces installed type spin default 3 min 3 max 5");
        println!("option name TB Restart type button");
        println!("option name TB probing depth type spin default 0 min 0 max 5");
        println!("uciok");
    }

    fn cmd_position(&mut self, parts: &[&str]) {
        if self.active.is_some() {
            warn!("position ignored while a search is running");
            return;
        }
        match parse_position(parts) {
            Ok(pos) => self.engine.pos = pos,
            Err(err) => warn!(%err, "rejecting position command"),
        }
    }

    fn cmd_setoption(&mut self, parts: &[&str]) {
        if self.active.is_some() {
            warn!("setoption ignored while a search is running");
            return;
        }
        let Some((name, value)) = parse_setoption(parts) else {
            warn!("malformed setoption");
            return;
        };
        self.apply_option(&name, &value);
    }

    /// Shared entry for `setoption` and init-file pairs.
    pub fn apply_option(&mut self, name: &str, value: &str) {
        let truthy = matches!(value, "true" | "1" | "on");
        match name {
            "Hash" => {
                if let Ok(mb) = value.parse::<usize>() {
                    self.engine.set_hash_size(mb);
                } else {
                    warn!(value, "bad Hash value");
                }
            }
            "Clear Hash" => self.engine.clear_hash(),
            "Threads" => {
                if let Ok(n) = value.parse::<usize>() {
                    self.engine.params.set_threads(n);
                } else {
                    warn!(value, "bad Threads value");
                }
            }
            "Ponder" => self.engine.params.ponder = truthy,
            "Nullmove" => self.engine.params.null_move = truthy,
            "OwnBook" => self.book_settings.enabled = truthy,
            "Book File" => self.book_settings.path = value.to_string(),
            "GaviotaTbPath" => self.tb_settings.path = value.to_string(),
            "GaviotaTbCache" => {
                self.tb_settings.cache_mb = value.parse().unwrap_or(self.tb_settings.cache_mb);
            }
            "GaviotaTbScheme" => self.tb_settings.scheme = value.to_string(),
            "TB Pieces installed" => {
                self.tb_settings.pieces = value.parse().unwrap_or(self.tb_settings.pieces);
            }
            "TB probing depth" => {
                self.tb_settings.probe_depth =
                    value.parse().unwrap_or(self.tb_settings.probe_depth);
            }
            "TB Restart" => {} // consumed by the tablebase collaborator
            _ => warn!(name, "unknown option"),
        }
    }

    fn cmd_go(&mut self, parts: &[&str]) {
        if self.active.is_some() {
            warn!("go ignored: search already running");
            return;
        }

        // Book first: a known position answers without searching.
        if self.book_settings.enabled {
            if let Some(book) = &self.book {
                if let Some(mv) = book.probe(&self.engine.pos) {
                    println!("bestmove {}", mv.to_uci());
                    return;
                }
            }
        }
        if let Some(tb) = &self.tablebase {
            if let Some(crate::tablebase::TbProbe::BestMove(mv)) = tb.probe(&self.engine.pos) {
                println!("bestmove {}", mv.to_uci());
                return;
            }
        }

        let limits = parse_go(parts);
        let budget = limits.allocate_time(self.engine.pos.side_to_move);
        let pondering = limits.ponder && self.engine.params.ponder;
        let clock = Arc::new(SearchClock::new(budget, pondering));

        let mut engine = self.engine.clone();
        let thread_clock = Arc::clone(&clock);
        let handle = std::thread::spawn(move || {
            let report = engine.search(&limits, &thread_clock, &mut print_info);
            match report.best {
                Some(best) => match report.ponder {
                    Some(ponder) => {
                        println!("bestmove {} ponder {}", best.to_uci(), ponder.to_uci())
                    }
                    None => println!("bestmove {}", best.to_uci()),
                },
                None => println!("bestmove 0000"),
            }
        });

        self.active = Some(ActiveSearch { clock, handle });
    }

    /// Stops any running search and waits for its `bestmove`.
    pub fn stop_search(&mut self) {
        if let Some(active) = self.active.take() {
            active.clock.request_stop();
            let _ = active.handle.join();
        }
    }

    /// True while a search thread is alive. Reaps a finished thread.
    pub fn search_running(&mut self) -> bool {
        if let Some(active) = &self.active {
            if active.handle.is_finished() {
                let _ = self.active.take().map(|a| a.handle.join());
                return false;
            }
            return true;
        }
        false
    }
}

impl Default for UciSession {
    fn default() -> Self {
        Self::new()
    }
}

fn print_info(info: &SearchInfo) {
    let score = match info.mate_in {
        Some(n) => format!("mate {}", n),
        None => format!("cp {}", info.score),
    };
    let pv: Vec<String> = info.pv.iter().map(|m| m.to_uci()).collect();
    println!(
        "info depth {} score {} nodes {} time {} pv {}",
        info.depth,
        score,
        info.nodes,
        info.time_ms,
        pv.join(" ")
    );
}

/// `position (startpos | fen <fen>) [moves m1 m2 ...]` into a fresh
/// position; the caller's state is untouched on error.
pub fn parse_position(parts: &[&str]) -> Result<Position, String> {
    let mut pos = match parts.get(1) {
        Some(&"startpos") => Position::startpos(),
        Some(&"fen") => {
            let end = parts
                .iter()
                .position(|&p| p == "moves")
                .unwrap_or(parts.len());
            let fen = parts[2..end].join(" ");
            Position::from_str(&fen)?
        }
        _ => return Err("position needs startpos or fen".to_string()),
    };

    if let Some(idx) = parts.iter().position(|&p| p == "moves") {
        for token in &parts[idx + 1..] {
            let mv = parse_uci_move(&mut pos, token)
                .ok_or_else(|| format!("illegal move in position command: {}", token))?;
            let (_, _legal) = pos.make(mv);
            debug_assert!(_legal, "generate_legal produced an illegal move");
        }
    }
    Ok(pos)
}

/// Resolves wire text (`e2e4`, `a7a8q`) against the legal moves.
pub fn parse_uci_move(pos: &mut Position, text: &str) -> Option<Move> {
    if !text.is_ascii() || text.len() < 4 || text.len() > 5 {
        return None;
    }
    let from: crate::square::Square = text[0..2].parse().ok()?;
    let to: crate::square::Square = text[2..4].parse().ok()?;
    let promo = match text.as_bytes().get(4) {
        Some(b'q') => Some(crate::position::Piece::Queen),
        Some(b'r') => Some(crate::position::Piece::Rook),
        Some(b'b') => Some(crate::position::Piece::Bishop),
        Some(b'n') => Some(crate::position::Piece::Knight),
        Some(_) => return None,
        None => None,
    };

    let mut moves = Vec::new();
    movegen::generate_legal(pos, &mut moves);
    moves
        .into_iter()
        .find(|m| m.from == from && m.to == to && m.promotion == promo)
}

fn parse_go(parts: &[&str]) -> SearchLimits {
    let mut limits = SearchLimits::default();
    let mut i = 1;
    while i < parts.len() {
        let arg = |i: usize| parts.get(i + 1).and_then(|v| v.parse::<u64>().ok());
        match parts[i] {
            "depth" => {
                limits.depth = arg(i).map(|d| d as i32);
                i += 2;
            }
            "movetime" => {
                limits.movetime = arg(i);
                i += 2;
            }
            "wtime" => {
                limits.wtime = arg(i);
                i += 2;
            }
            "btime" => {
                limits.btime = arg(i);
                i += 2;
            }
            "winc" => {
                limits.winc = arg(i).unwrap_or(0);
                i += 2;
            }
            "binc" => {
                limits.binc = arg(i).unwrap_or(0);
                i += 2;
            }
            "movestogo" => {
                limits.movestogo = arg(i);
                i += 2;
            }
            "infinite" => {
                limits.infinite = true;
                i += 1;
            }
            "ponder" => {
                limits.ponder = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    limits
}

fn parse_setoption(parts: &[&str]) -> Option<(String, String)> {
    let name_idx = parts.iter().position(|&p| p == "name")? + 1;
    let value_idx = parts.iter().position(|&p| p == "value");
    let name_end = value_idx.unwrap_or(parts.len());
    if name_idx >= name_end {
        return None;
    }
    let name = parts[name_idx..name_end].join(" ");
    let value = match value_idx {
        Some(v) => parts[v + 1..].join(" "),
        None => String::new(),
    };
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_startpos_with_moves() {
        let pos =
            parse_position(&["position", "startpos", "moves", "e2e4", "e7e5", "g1f3"]).unwrap();
        assert_eq!(
            pos.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2"
        );
    }

    #[test]
    fn position_fen_round_trip() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let mut args = vec!["position", "fen"];
        args.extend(fen.split_whitespace());
        let pos = parse_position(&args).unwrap();
        assert_eq!(pos.to_fen(), fen);
    }

    #[test]
    fn bad_position_is_rejected() {
        assert!(parse_position(&["position", "fen", "garbage"]).is_err());
        assert!(parse_position(&["position", "startpos", "moves", "e2e5"]).is_err());
        assert!(parse_position(&["position"]).is_err());
    }

    #[test]
    fn promotion_moves_parse() {
        let mut pos = Position::from_str("8/P6k/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let mv = parse_uci_move(&mut pos, "a7a8q").unwrap();
        assert!(mv.is_promotion());
        assert_eq!(mv.promotion, Some(crate::position::Piece::Queen));
        assert!(parse_uci_move(&mut pos, "a7a8x").is_none());
    }

    #[test]
    fn go_arguments_parse() {
        let limits = parse_go(&[
            "go", "wtime", "30000", "btime", "20000", "winc", "100", "binc", "200",
            "movestogo", "12", "depth", "9",
        ]);
        assert_eq!(limits.wtime, Some(30_000));
        assert_eq!(limits.btime, Some(20_000));
        assert_eq!(limits.winc, 100);
        assert_eq!(limits.binc, 200);
        assert_eq!(limits.movestogo, Some(12));
        assert_eq!(limits.depth, Some(9));
        assert!(!limits.infinite);

        let limits = parse_go(&["go", "infinite"]);
        assert!(limits.infinite);
        let limits = parse_go(&["go", "ponder", "movetime", "500"]);
        assert!(limits.ponder);
        assert_eq!(limits.movetime, Some(500));
    }

    #[test]
    fn setoption_with_spaced_names() {
        assert_eq!(
            parse_setoption(&["setoption", "name", "Clear", "Hash"]),
            Some(("Clear Hash".to_string(), String::new()))
        );
        assert_eq!(
            parse_setoption(&["setoption", "name", "Hash", "value", "128"]),
            Some(("Hash".to_string(), "128".to_string()))
        );
        assert_eq!(
            parse_setoption(&[
                "setoption", "name", "TB", "Pieces", "installed", "value", "5"
            ]),
            Some(("TB Pieces installed".to_string(), "5".to_string()))
        );
        assert_eq!(parse_setoption(&["setoption", "value", "5"]), None);
    }

    #[test]
    fn session_applies_options() {
        let mut session = UciSession::new();
        session.apply_option("Threads", "8");
        assert_eq!(session.engine.params.threads, 8);
        session.apply_option("Threads", "100000");
        assert_eq!(session.engine.params.threads, 64);
        session.apply_option("Nullmove", "false");
        assert!(!session.engine.params.null_move);
        session.apply_option("Ponder", "true");
        assert!(session.engine.params.ponder);
        session.apply_option("OwnBook", "true");
        assert!(session.book_settings.enabled);
        session.apply_option("Book File", "lines.bin");
        assert_eq!(session.book_settings.path, "lines.bin");
        session.apply_option("TB Pieces installed", "5");
        assert_eq!(session.tb_settings.pieces, 5);
    }
}
