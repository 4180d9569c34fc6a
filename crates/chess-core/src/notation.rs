//! Move notation helpers: turns whatever a board UI displays into legal moves.
//!
//! Move lists scraped from a page come in several dialects: plain UCI
//! (`e2e4`), SAN (`Nf3`, `exd8=Q+`), figurine SAN (`♘f3`) and SAN prefixed
//! with move numbers (`12.`, `12...`). Everything is normalized to SAN or UCI
//! before it is resolved against a position.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Move, Position};

use crate::NotationError;

static UCI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-h][1-8][a-h][1-8][qrbnQRBN]?$").unwrap());

static SAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[NBRQK]?[a-h]?[1-8]?x?[a-h][1-8](?:=?[NBRQ])?|O-O(?:-O)?)[+#]?$").unwrap()
});

static MOVE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.+\s*").unwrap());

/// Figurine glyphs (both colors) and the SAN letter they stand for.
const FIGURINES: [(char, char); 10] = [
    ('♔', 'K'),
    ('♕', 'Q'),
    ('♖', 'R'),
    ('♗', 'B'),
    ('♘', 'N'),
    ('♚', 'K'),
    ('♛', 'Q'),
    ('♜', 'R'),
    ('♝', 'B'),
    ('♞', 'N'),
];

/// Returns true if `text` looks like a UCI move (`e2e4`, `e7e8q`).
pub fn is_uci(text: &str) -> bool {
    UCI_RE.is_match(text)
}

/// Returns true if `text` normalizes to something shaped like SAN or UCI.
/// Used to drop result banners and clock text that share the move list.
pub fn is_move_text(text: &str) -> bool {
    let norm = normalize(text);
    is_uci(&norm) || SAN_RE.is_match(&norm)
}

/// Normalize displayed move text to plain SAN or UCI.
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim();
    let without_number = MOVE_NUMBER_RE.replace(trimmed, "");

    let mut out: String = without_number
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            FIGURINES
                .iter()
                .find(|(glyph, _)| *glyph == c)
                .map(|(_, letter)| *letter)
                .unwrap_or(c)
        })
        .collect();

    while out.ends_with('!') || out.ends_with('?') {
        out.pop();
    }

    match out.as_str() {
        "0-0" | "0-0+" | "0-0#" => out.replacen("0-0", "O-O", 1),
        "0-0-0" | "0-0-0+" | "0-0-0#" => out.replacen("0-0-0", "O-O-O", 1),
        _ => out,
    }
}

/// Resolve displayed move text against `pos`.
///
/// UCI is tried first, then SAN. The result is always a legal move.
pub fn parse_display(pos: &Chess, text: &str) -> Result<Move, NotationError> {
    let norm = normalize(text);
    if norm.is_empty() {
        return Err(NotationError::Empty);
    }

    if is_uci(&norm) {
        return parse_uci(pos, &norm);
    }

    let san: SanPlus = norm
        .parse()
        .map_err(|_| NotationError::Unparseable(text.to_string()))?;
    san.san
        .to_move(pos)
        .map_err(|e| NotationError::Illegal(format!("{norm}: {e}")))
}

/// Resolve a UCI move against `pos`.
pub fn parse_uci(pos: &Chess, text: &str) -> Result<Move, NotationError> {
    let uci: UciMove = text
        .to_ascii_lowercase()
        .parse()
        .map_err(|_| NotationError::Unparseable(text.to_string()))?;
    uci.to_move(pos)
        .map_err(|e| NotationError::Illegal(format!("{text}: {e}")))
}

/// UCI text for a legal move, with standard (king-to-destination) castling.
pub fn to_uci(mv: &Move) -> String {
    mv.to_uci(CastlingMode::Standard).to_string()
}

/// Convert a display move to UCI and play it on `pos`.
pub fn play_display(pos: &mut Chess, text: &str) -> Result<String, NotationError> {
    let mv = parse_display(pos, text)?;
    let uci = to_uci(&mv);
    pos.play_unchecked(mv);
    Ok(uci)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_numbers_and_figurines() {
        assert_eq!(normalize("12. ♘f3"), "Nf3");
        assert_eq!(normalize("7... ♞xe4!?"), "Nxe4");
        assert_eq!(normalize(" e4 "), "e4");
        assert_eq!(normalize("0-0-0+"), "O-O-O+");
        assert_eq!(normalize("0-0"), "O-O");
    }

    #[test]
    fn test_is_move_text() {
        assert!(is_move_text("e4"));
        assert!(is_move_text("exd8=Q+"));
        assert!(is_move_text("14. ♞xe4"));
        assert!(is_move_text("0-0-0"));
        assert!(is_move_text("g1f3"));
        assert!(!is_move_text("Game aborted"));
        assert!(!is_move_text("1-0"));
        assert!(!is_move_text(""));
    }

    #[test]
    fn test_is_uci() {
        assert!(is_uci("e2e4"));
        assert!(is_uci("e7e8q"));
        assert!(!is_uci("e4"));
        assert!(!is_uci("Nf3"));
        assert!(!is_uci("e2e9"));
    }

    #[test]
    fn test_parse_display_accepts_san_and_uci() {
        let mut pos = Chess::default();
        assert_eq!(play_display(&mut pos, "e4").unwrap(), "e2e4");
        assert_eq!(play_display(&mut pos, "e7e5").unwrap(), "e7e5");
        assert_eq!(play_display(&mut pos, "♘f3").unwrap(), "g1f3");
        assert_eq!(play_display(&mut pos, "2... Nc6").unwrap(), "b8c6");
    }

    #[test]
    fn test_castling_uses_king_destination() {
        let mut pos = Chess::default();
        for m in ["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5"] {
            play_display(&mut pos, m).unwrap();
        }
        assert_eq!(play_display(&mut pos, "O-O").unwrap(), "e1g1");
    }

    #[test]
    fn test_illegal_and_garbage_are_distinguished() {
        let pos = Chess::default();
        assert!(matches!(
            parse_display(&pos, "e2e5"),
            Err(NotationError::Illegal(_))
        ));
        assert!(matches!(
            parse_display(&pos, "Qh5"),
            Err(NotationError::Illegal(_))
        ));
        assert!(matches!(
            parse_display(&pos, "hello"),
            Err(NotationError::Unparseable(_))
        ));
        assert!(matches!(parse_display(&pos, "  "), Err(NotationError::Empty)));
    }
}
