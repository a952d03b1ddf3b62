use std::fmt::Write;

use courtside_sync::{Match, Snapshot};

/// One line per match in collection order, then the LIVE count.
pub fn scoreboard(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for m in snapshot.matches() {
        let _ = writeln!(out, "{}", match_line(m));
    }
    let _ = write!(
        out,
        "{} live / {} tracked",
        snapshot.live_count(),
        snapshot.len()
    );
    out
}

pub fn match_line(m: &Match) -> String {
    let mut line = format!(
        "{} {:>2} : {:<2} {}  [{}] set {}",
        m.team_a_name, m.score_a, m.score_b, m.team_b_name, m.status, m.current_set
    );
    if m.is_live() {
        if let (Some(a), Some(b)) = (m.rotation_a, m.rotation_b) {
            let _ = write!(line, "  rot {a}/{b}");
        }
    }
    line
}
